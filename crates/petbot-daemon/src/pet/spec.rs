use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::{dice::Dice, error::PetError};

pub const DEFAULT_SPECIES: &str = "default";
pub const NICK_PLACEHOLDER: &str = "<nick>";

/// Fatigue budget for species without an explicit `species_energy` entry.
pub const DEFAULT_ENERGY: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Greeting,
    Happy,
    Eat,
    Beg,
    Sleep,
    Wake,
    Play,
    PlayWith,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::Greeting,
        ActionKind::Happy,
        ActionKind::Eat,
        ActionKind::Beg,
        ActionKind::Sleep,
        ActionKind::Wake,
        ActionKind::Play,
        ActionKind::PlayWith,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ActionKind::Greeting => "greeting_actions",
            ActionKind::Happy => "happy_actions",
            ActionKind::Eat => "eat_actions",
            ActionKind::Beg => "beg_actions",
            ActionKind::Sleep => "sleep_actions",
            ActionKind::Wake => "wake_actions",
            ActionKind::Play => "play_actions",
            ActionKind::PlayWith => "play_with_actions",
        }
    }

    /// Accepts the full key (`eat_actions`) or its short form (`eat`).
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| {
            let full = kind.key();
            full == key || full.strip_suffix("_actions") == Some(key.as_str())
        })
    }
}

/// Category name to ordered template list for one species.
pub type Templates = BTreeMap<String, Vec<String>>;

/// The action text table loaded from `pet.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTable {
    pub pet_types: BTreeMap<String, Templates>,
    #[serde(default = "ActionTable::default_energy_multiplier")]
    pub energy_multiplier: f64,
    #[serde(default = "ActionTable::default_max_hunger")]
    pub max_hunger: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub species_energy: BTreeMap<String, i64>,
}

impl ActionTable {
    fn default_energy_multiplier() -> f64 {
        1.0
    }
    fn default_max_hunger() -> i64 {
        360
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pet actions {:?}", path))?;
        let table: Self =
            serde_json::from_str(&raw).with_context(|| format!("invalid pet actions: {:?}", path))?;
        if !table.pet_types.contains_key(DEFAULT_SPECIES) {
            bail!("pet actions {:?} have no `{}` pet type", path, DEFAULT_SPECIES);
        }
        if table.max_hunger < 1 {
            bail!("pet actions {:?}: max_hunger must be positive", path);
        }
        Ok(table)
    }

    /// Loads `path`, falling back to the built-in table when the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("No pet actions at {:?}, using built-in set", path);
            return Ok(Self::demo());
        }
        Self::from_file(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
        fs::write(path, json).with_context(|| format!("failed to write {:?}", path))?;
        tracing::info!("Saved pet actions to {:?}", path);
        Ok(())
    }

    /// Species entry first, then `default`. Empty lists count as missing.
    pub fn templates(&self, species: &str, category: &str) -> Option<&[String]> {
        let lookup = |key: &str| {
            self.pet_types
                .get(key)
                .and_then(|t| t.get(category))
                .filter(|list| !list.is_empty())
                .map(Vec::as_slice)
        };
        lookup(species).or_else(|| lookup(DEFAULT_SPECIES))
    }

    /// Picks a template uniformly and fills in `nick`. Empty when nothing is defined.
    pub fn choose(&self, species: &str, kind: ActionKind, nick: &str, dice: &mut dyn Dice) -> String {
        match self.templates(species, kind.key()) {
            Some(list) => render(&list[dice.pick(list.len())], nick),
            None => String::new(),
        }
    }

    pub fn energy_threshold(&self, species: &str) -> i64 {
        let base = self
            .species_energy
            .get(species)
            .copied()
            .unwrap_or(DEFAULT_ENERGY);
        ((base as f64 * self.energy_multiplier).floor() as i64).max(1)
    }

    pub fn species_names(&self) -> impl Iterator<Item = &str> {
        self.pet_types.keys().map(String::as_str)
    }

    pub fn has_species(&self, species: &str) -> bool {
        self.pet_types.contains_key(species)
    }

    pub fn add_species(&mut self, species: &str) -> Result<(), PetError> {
        if self.pet_types.contains_key(species) {
            return Err(PetError::usage(format!("Pet type {species} already exists")));
        }
        self.pet_types.insert(species.to_string(), Templates::new());
        Ok(())
    }

    pub fn remove_species(&mut self, species: &str) -> Result<(), PetError> {
        if species == DEFAULT_SPECIES {
            return Err(PetError::usage("The default pet type cannot be removed"));
        }
        self.pet_types
            .remove(species)
            .map(|_| ())
            .ok_or_else(|| PetError::UnknownSpecies(species.to_string()))
    }

    pub fn categories(&self, species: &str) -> Result<&Templates, PetError> {
        self.pet_types
            .get(species)
            .ok_or_else(|| PetError::UnknownSpecies(species.to_string()))
    }

    /// Appends `text` and returns its index within the category.
    pub fn add_template(&mut self, species: &str, category: &str, text: &str) -> Result<usize, PetError> {
        let templates = self
            .pet_types
            .get_mut(species)
            .ok_or_else(|| PetError::UnknownSpecies(species.to_string()))?;
        let list = templates.entry(category.to_string()).or_default();
        list.push(text.to_string());
        Ok(list.len() - 1)
    }

    /// Removes one template; the category goes away once it is empty.
    pub fn remove_template(&mut self, species: &str, category: &str, index: usize) -> Result<String, PetError> {
        let templates = self
            .pet_types
            .get_mut(species)
            .ok_or_else(|| PetError::UnknownSpecies(species.to_string()))?;
        let unknown = || PetError::UnknownCategory {
            species: species.to_string(),
            category: category.to_string(),
        };
        let list = templates.get_mut(category).ok_or_else(unknown)?;
        if index >= list.len() {
            return Err(PetError::usage(format!(
                "{species} {category} has {} entries, no index {index}",
                list.len()
            )));
        }
        let removed = list.remove(index);
        if list.is_empty() {
            templates.remove(category);
        }
        Ok(removed)
    }

    pub fn demo() -> Self {
        let mut default = Templates::new();
        let mut put = |kind: ActionKind, lines: &[&str]| {
            default.insert(
                kind.key().to_string(),
                lines.iter().map(|l| l.to_string()).collect(),
            );
        };
        put(ActionKind::Greeting, &["looks up at <nick>", "trots over to <nick>"]);
        put(ActionKind::Happy, &["leans into <nick>'s hand", "wiggles happily at <nick>"]);
        put(ActionKind::Eat, &["happily munches the food <nick> brought"]);
        put(ActionKind::Beg, &["stares at <nick> and then at the empty bowl"]);
        put(ActionKind::Sleep, &["curls up and falls asleep"]);
        put(ActionKind::Wake, &["wakes up and stretches"]);
        put(ActionKind::Play, &["chases its own tail"]);
        put(ActionKind::PlayWith, &["pounces on <nick>"]);

        Self {
            pet_types: BTreeMap::from([(DEFAULT_SPECIES.to_string(), default)]),
            energy_multiplier: Self::default_energy_multiplier(),
            max_hunger: Self::default_max_hunger(),
            species_energy: BTreeMap::new(),
        }
    }
}

pub fn render(template: &str, nick: &str) -> String {
    template.replace(NICK_PLACEHOLDER, nick)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::dice::ScriptedDice;

    fn table() -> ActionTable {
        let mut table = ActionTable::demo();
        table.pet_types.insert(
            "dog".into(),
            Templates::from([(
                "greeting_actions".into(),
                vec!["wags at <nick>".into(), "barks at <nick> and <nick>".into()],
            )]),
        );
        table
    }

    #[test]
    fn test_species_lookup_wins_over_default() {
        let table = table();
        let list = table.templates("dog", "greeting_actions").unwrap();
        assert_eq!(list[0], "wags at <nick>");
    }

    #[test]
    fn test_missing_category_falls_back_to_default() {
        let table = table();
        let list = table.templates("dog", "eat_actions").unwrap();
        assert_eq!(list, table.templates(DEFAULT_SPECIES, "eat_actions").unwrap());
        assert!(table.templates("dragon", "sleep_actions").is_some());
    }

    #[test]
    fn test_missing_everywhere_is_empty() {
        let table = table();
        let mut dice = ScriptedDice::default();
        assert!(table.templates("dog", "dance_actions").is_none());
        let mut empty = table.clone();
        empty.pet_types.get_mut(DEFAULT_SPECIES).unwrap().remove("beg_actions");
        assert_eq!(empty.choose("dog", ActionKind::Beg, "carol", &mut dice), "");
    }

    #[test]
    fn test_choose_replaces_every_placeholder() {
        let table = table();
        let mut dice = ScriptedDice::new([1]);
        let text = table.choose("dog", ActionKind::Greeting, "carol", &mut dice);
        assert_eq!(text, "barks at carol and carol");
    }

    #[test]
    fn test_action_kind_from_key() {
        assert_eq!(ActionKind::from_key("eat_actions"), Some(ActionKind::Eat));
        assert_eq!(ActionKind::from_key("Play_With"), Some(ActionKind::PlayWith));
        assert_eq!(ActionKind::from_key("dance"), None);
    }

    #[test]
    fn test_energy_threshold_scales() {
        let mut table = table();
        table.energy_multiplier = 2.0;
        table.species_energy.insert("dog".into(), 4);
        assert_eq!(table.energy_threshold("dog"), 8);
        assert_eq!(table.energy_threshold("cat"), 30);
        table.energy_multiplier = 0.0;
        assert_eq!(table.energy_threshold("dog"), 1);
    }

    #[test]
    fn test_add_then_remove_restores_category() {
        let mut table = table();
        let before = table.clone();
        let index = table.add_template("dog", "greeting_actions", "sniffs <nick>").unwrap();
        assert_eq!(index, 2);
        table.remove_template("dog", "greeting_actions", index).unwrap();
        assert_eq!(table, before);

        let index = table.add_template("dog", "eat_actions", "gulps").unwrap();
        table.remove_template("dog", "eat_actions", index).unwrap();
        assert!(!table.pet_types["dog"].contains_key("eat_actions"));
        assert_eq!(table, before);
    }

    #[test]
    fn test_remove_template_rejects_bad_index() {
        let mut table = table();
        let err = table.remove_template("dog", "greeting_actions", 9).unwrap_err();
        assert!(matches!(err, PetError::InvalidArgument(_)));
        let err = table.remove_template("dog", "wake_actions", 0).unwrap_err();
        assert!(matches!(err, PetError::UnknownCategory { .. }));
    }

    #[test]
    fn test_species_admin() {
        let mut table = table();
        table.add_species("cat").unwrap();
        assert!(table.add_species("cat").is_err());
        assert!(table.remove_species(DEFAULT_SPECIES).is_err());
        table.remove_species("cat").unwrap();
        assert!(matches!(
            table.remove_species("cat"),
            Err(PetError::UnknownSpecies(_))
        ));
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pet.json");
        let mut table = table();
        table.add_template("dog", "play_actions", "fetches a stick").unwrap();
        table.save(&path).unwrap();

        let mut reloaded = ActionTable::from_file(&path).unwrap();
        assert_eq!(reloaded, table);

        reloaded.remove_template("dog", "play_actions", 0).unwrap();
        reloaded.save(&path).unwrap();
        assert_eq!(ActionTable::from_file(&path).unwrap(), self::table());
    }

    #[test]
    fn test_shipped_table_parses() {
        let table: ActionTable = serde_json::from_str(include_str!("../../../../data/pet.json")).unwrap();
        assert!(table.has_species(DEFAULT_SPECIES));
        assert_eq!(table.energy_threshold("dog"), 20);
        for kind in ActionKind::ALL {
            assert!(table.templates("dragon", kind.key()).is_some(), "{kind:?}");
        }
    }

    #[test]
    fn test_from_file_requires_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pet.json");
        fs::write(&path, r#"{"pet_types": {"dog": {}}, "energy_multiplier": 1, "max_hunger": 5}"#).unwrap();
        assert!(ActionTable::from_file(&path).is_err());
    }
}
