//! The live pet collection: creation and removal (kept consistent with the
//! store), routing of chat and membership events, and the periodic tick.

pub mod presence;

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::{
    bridge::{Outgoing, format_action, is_meaningful_departure},
    pet::{Dice, Pet, PetError, Surroundings, spec::ActionTable},
    storage::{COLUMN_WIDTH, PetRecord, SharedStore},
};

pub use presence::Presence;

pub struct Registry {
    pets: BTreeMap<String, Pet>,
    actions: ActionTable,
    presence: Presence,
    store: SharedStore,
    dice: Box<dyn Dice>,
    bot_nick: String,
}

impl Registry {
    pub fn new(
        actions: ActionTable,
        store: SharedStore,
        dice: Box<dyn Dice>,
        bot_nick: impl Into<String>,
    ) -> Self {
        Self {
            pets: BTreeMap::new(),
            actions,
            presence: Presence::default(),
            store,
            dice,
            bot_nick: bot_nick.into(),
        }
    }

    /// Replaces the in-memory pets with what the store holds.
    pub async fn load(&mut self) -> Result<usize> {
        let records = self.store.load_all().await?;
        self.pets = records
            .into_iter()
            .map(|record| (record.pet_name.clone(), record.into_pet()))
            .collect();
        info!("Loaded {} pets", self.pets.len());
        Ok(self.pets.len())
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionTable {
        &mut self.actions
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn bot_nick(&self) -> &str {
        &self.bot_nick
    }

    pub fn set_bot_nick(&mut self, nick: impl Into<String>) {
        self.bot_nick = nick.into();
    }

    pub fn get(&self, name: &str) -> Option<&Pet> {
        self.pets.get(name)
    }

    /// `(name, species)` in name order. Call again to restart.
    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.pets
            .values()
            .map(|pet| (pet.name.as_str(), pet.species.as_str()))
    }

    pub async fn create(
        &mut self,
        name: &str,
        owner: &str,
        species: &str,
        channel: Option<&str>,
    ) -> Result<&Pet, PetError> {
        validate_name(name)?;
        let columns = [
            ("Owner nick", Some(owner)),
            ("Species", Some(species)),
            ("Channel", channel),
        ];
        for (what, value) in columns {
            if value.is_some_and(|v| v.chars().count() > COLUMN_WIDTH) {
                return Err(PetError::usage(format!(
                    "{what} is longer than {COLUMN_WIDTH} characters"
                )));
            }
        }
        if self.pets.contains_key(name) {
            return Err(PetError::DuplicateName(name.to_string()));
        }

        let pet = Pet::new(name, owner, species, channel.map(str::to_string));
        let record = PetRecord::from(&pet);
        self.pets.insert(name.to_string(), pet);

        if let Err(err) = self.store.insert(&record).await {
            warn!(?err, pet = name, "Failed to persist new pet, rolling back");
            self.pets.remove(name);
            return Err(PetError::Storage(err));
        }

        info!(pet = name, owner = %record.owner_name, species, "Created pet");
        self.pets
            .get(name)
            .ok_or_else(|| PetError::NotFound(name.to_string()))
    }

    pub async fn remove(
        &mut self,
        name: &str,
        requester: &str,
        is_admin: bool,
    ) -> Result<Pet, PetError> {
        let pet = self
            .pets
            .get(name)
            .ok_or_else(|| PetError::NotFound(name.to_string()))?;
        if !pet.is_owned_by(requester) && !is_admin {
            return Err(PetError::NotOwner(name.to_string()));
        }

        let Some(pet) = self.pets.remove(name) else {
            return Err(PetError::NotFound(name.to_string()));
        };
        if let Err(err) = self.store.delete(name).await {
            warn!(?err, pet = name, "Failed to delete stored pet, restoring");
            self.pets.insert(name.to_string(), pet);
            return Err(PetError::Storage(err));
        }

        info!(pet = name, by = requester, "Removed pet");
        Ok(pet)
    }

    pub fn feed(&mut self, name: &str, nick: &str, origin: &str) -> Result<Option<Outgoing>, PetError> {
        self.interact(name, origin, |pet, actions, dice| pet.feed(actions, nick, dice))
    }

    /// Petting, rubbing, scratching, booping.
    pub fn love_on(&mut self, name: &str, nick: &str, origin: &str) -> Result<Option<Outgoing>, PetError> {
        self.interact(name, origin, |pet, actions, dice| pet.love_on(actions, nick, dice))
    }

    pub fn play_with(&mut self, name: &str, nick: &str, origin: &str) -> Result<Option<Outgoing>, PetError> {
        self.interact(name, origin, |pet, actions, dice| pet.play_with(actions, nick, dice))
    }

    pub fn beckon(&mut self, name: &str, nick: &str, origin: &str) -> Result<Option<Outgoing>, PetError> {
        self.interact(name, origin, |pet, actions, dice| pet.beckon(actions, nick, dice))
    }

    /// Runs one chat-triggered operation. The line goes to the pet's own
    /// channel, or back to `origin` for pets without one.
    fn interact<F>(&mut self, name: &str, origin: &str, op: F) -> Result<Option<Outgoing>, PetError>
    where
        F: FnOnce(&mut Pet, &ActionTable, &mut dyn Dice) -> String,
    {
        let pet = self
            .pets
            .get_mut(name)
            .ok_or_else(|| PetError::NotFound(name.to_string()))?;
        let text = op(pet, &self.actions, self.dice.as_mut());
        if text.is_empty() {
            return Ok(None);
        }
        let target = pet.channel.as_deref().unwrap_or(origin);
        Ok(Some(Outgoing::to(target, format_action(&pet.name, &text))))
    }

    /// Someone joined `channel`. Pets of that owner living there wake up or
    /// say hello.
    pub fn on_owner_arrival(&mut self, nick: &str, channel: &str) -> Vec<Outgoing> {
        if nick.eq_ignore_ascii_case(&self.bot_nick) {
            // fresh NAMES follow our own join
            self.presence.clear_channel(channel);
            self.presence.join(channel, nick);
            return Vec::new();
        }
        self.presence.join(channel, nick);

        let mut out = Vec::new();
        for pet in self.pets.values_mut() {
            let Some(home) = pet.channel.clone() else {
                continue;
            };
            if !pet.is_owned_by(nick) || !home.eq_ignore_ascii_case(channel) {
                continue;
            }
            let text = if pet.sleeping {
                pet.wake(&self.actions, self.dice.as_mut(), true)
            } else {
                pet.wake(&self.actions, self.dice.as_mut(), false);
                Some(pet.beckon(&self.actions, nick, self.dice.as_mut()))
            };
            if let Some(text) = text.filter(|t| !t.is_empty()) {
                out.push(Outgoing::to(&home, format_action(&pet.name, &text)));
            }
        }
        out
    }

    /// `channel` is `None` for a quit, which counts for every channel.
    pub fn on_owner_departure(
        &mut self,
        nick: &str,
        channel: Option<&str>,
        reason: Option<&str>,
    ) -> Vec<Outgoing> {
        if !is_meaningful_departure(reason) {
            debug!(nick, "ignoring host change");
            return Vec::new();
        }
        if nick.eq_ignore_ascii_case(&self.bot_nick) {
            if let Some(channel) = channel {
                self.presence.clear_channel(channel);
            }
            return Vec::new();
        }
        match channel {
            Some(channel) => self.presence.part(channel, nick),
            None => {
                self.presence.quit(nick);
            }
        }

        let mut out = Vec::new();
        for pet in self.pets.values_mut() {
            if !pet.is_owned_by(nick) {
                continue;
            }
            let home = pet.channel.clone();
            // Pets without a channel have nowhere to wait for their owner.
            let left_home = match (channel, home.as_deref()) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(left), Some(home)) => left.eq_ignore_ascii_case(home),
            };
            if !left_home {
                continue;
            }
            let text = pet.sleep_until_owner_returns(&self.actions, self.dice.as_mut(), true);
            if let (Some(home), Some(text)) = (home, text) {
                out.push(Outgoing::to(home, format_action(&pet.name, &text)));
            }
        }
        out
    }

    pub fn on_names(&mut self, channel: &str, nicks: &[String]) {
        for nick in nicks {
            self.presence.join(channel, nick);
        }
    }

    pub fn on_nick_change(&mut self, old: &str, new: &str) {
        if old.eq_ignore_ascii_case(&self.bot_nick) {
            self.bot_nick = new.to_string();
        }
        self.presence.rename(old, new);
    }

    /// Silently lines pets up with who is actually in `channel`, once its
    /// member list is complete after connecting.
    pub fn sync_presence(&mut self, channel: &str) {
        for pet in self.pets.values_mut() {
            let home_matches = pet
                .channel
                .as_deref()
                .is_some_and(|home| home.eq_ignore_ascii_case(channel));
            if !home_matches {
                continue;
            }
            if self.presence.is_present(channel, &pet.owner) {
                pet.wake(&self.actions, self.dice.as_mut(), false);
            } else {
                pet.sleep_until_owner_returns(&self.actions, self.dice.as_mut(), false);
            }
            debug!(pet = %pet.name, state = ?pet.sleep_state(), "synced with channel");
        }
    }

    /// One scheduler cycle over every pet, in name order.
    pub fn tick(&mut self) -> Vec<Outgoing> {
        let names: Vec<String> = self.pets.keys().cloned().collect();
        let mut out = Vec::new();
        for name in names {
            let around = self.surroundings(&name);
            let Some(pet) = self.pets.get_mut(&name) else {
                continue;
            };
            let lines = pet.tick(&self.actions, self.dice.as_mut(), &around);
            match pet.channel.as_deref() {
                Some(channel) => out.extend(
                    lines
                        .iter()
                        .map(|line| Outgoing::to(channel, format_action(&pet.name, line))),
                ),
                None if !lines.is_empty() => {
                    debug!(pet = %name, count = lines.len(), "no channel, dropping lines")
                }
                None => {}
            }
        }
        out
    }

    fn surroundings(&self, name: &str) -> Surroundings {
        let Some(pet) = self.pets.get(name) else {
            return Surroundings::default();
        };
        let Some(channel) = pet.channel.as_deref() else {
            return Surroundings {
                owner_present: true,
                ..Surroundings::default()
            };
        };
        Surroundings {
            owner_present: self.presence.is_present(channel, &pet.owner),
            companions: self
                .pets
                .values()
                .filter(|other| other.name != pet.name)
                .filter(|other| {
                    other
                        .channel
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(channel))
                })
                .map(|other| other.name.clone())
                .collect(),
            members: self.presence.members(channel, &self.bot_nick),
        }
    }
}

fn validate_name(name: &str) -> Result<(), PetError> {
    let valid = !name.is_empty()
        && name.chars().count() <= COLUMN_WIDTH
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PetError::usage(format!(
            "Pet names are up to {COLUMN_WIDTH} letters, digits or underscores"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        bridge::ITALIC,
        pet::{ScriptedDice, SleepState, spec::Templates},
        storage::{MemoryStore, PetStore},
    };

    fn actions() -> ActionTable {
        let mut table = ActionTable::demo();
        table.max_hunger = 5;
        table.pet_types.insert(
            "dog".into(),
            Templates::from([
                ("greeting_actions".into(), vec!["wags at <nick>".into()]),
                ("beg_actions".into(), vec!["whines at <nick>".into()]),
                ("sleep_actions".into(), vec!["flops over".into()]),
                ("wake_actions".into(), vec!["yawns at <nick>".into()]),
            ]),
        );
        table
    }

    fn registry_with(store: Arc<MemoryStore>, dice: ScriptedDice) -> Registry {
        Registry::new(actions(), store, Box::new(dice), "petbot")
    }

    async fn with_fido() -> (Registry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let mut registry = registry_with(store.clone(), ScriptedDice::default());
        registry.create("Fido", "alice", "dog", Some("#test")).await.unwrap();
        (registry, store)
    }

    #[tokio::test]
    async fn test_create_persists() {
        let (registry, store) = with_fido().await;
        let pet = registry.get("Fido").unwrap();
        assert_eq!(pet.owner, "alice");
        assert_eq!(store.records()[0].pet_name, "Fido");
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let (mut registry, store) = with_fido().await;
        let err = registry.create("Fido", "bob", "cat", None).await.unwrap_err();
        assert!(matches!(err, PetError::DuplicateName(_)));
        assert_eq!(err.to_string(), "Pet by that name already exists");
        assert_eq!(registry.get("Fido").unwrap().owner, "alice");
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_name_rejected() {
        let (mut registry, _) = with_fido().await;
        assert!(matches!(
            registry.create("two words", "bob", "cat", None).await,
            Err(PetError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_over_wide_columns_rejected_and_reload_matches() {
        let (mut registry, store) = with_fido().await;
        let err = registry
            .create("Rex", "bob", "dog", Some("#a-channel-name-far-too-long"))
            .await
            .unwrap_err();
        assert!(matches!(err, PetError::InvalidArgument(_)));
        let long_owner = "n".repeat(COLUMN_WIDTH + 1);
        assert!(registry.create("Rex", &long_owner, "dog", None).await.is_err());
        assert!(registry.get("Rex").is_none());

        let owner = "o".repeat(COLUMN_WIDTH);
        registry.create("Rex", &owner, "dog", Some("#pets")).await.unwrap();
        let mut reloaded = registry_with(store.clone(), ScriptedDice::default());
        reloaded.load().await.unwrap();
        let live: Vec<_> = registry
            .list()
            .map(|(name, _)| PetRecord::from(registry.get(name).unwrap()))
            .collect();
        let stored: Vec<_> = reloaded
            .list()
            .map(|(name, _)| PetRecord::from(reloaded.get(name).unwrap()))
            .collect();
        assert_eq!(live, stored);
    }

    #[tokio::test]
    async fn test_create_rolls_back_on_store_failure() {
        let store = Arc::new(MemoryStore::default());
        store.set_fail_writes(true);
        let mut registry = registry_with(store.clone(), ScriptedDice::default());
        let err = registry.create("Fido", "alice", "dog", None).await.unwrap_err();
        assert!(matches!(err, PetError::Storage(_)));
        assert!(registry.get("Fido").is_none());
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_remove_by_non_owner_rejected() {
        let (mut registry, store) = with_fido().await;
        let err = registry.remove("Fido", "bob", false).await.unwrap_err();
        assert_eq!(err.to_string(), "Fido is not one of your pets");
        assert!(registry.get("Fido").is_some());
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_by_owner_and_admin() {
        let (mut registry, store) = with_fido().await;
        registry.remove("Fido", "ALICE", false).await.unwrap();
        assert_eq!(registry.list().count(), 0);
        assert!(store.records().is_empty());

        registry.create("Rex", "alice", "dog", None).await.unwrap();
        registry.remove("Rex", "root", true).await.unwrap();
        assert!(matches!(
            registry.remove("Rex", "alice", false).await,
            Err(PetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_restores_on_store_failure() {
        let (mut registry, store) = with_fido().await;
        store.set_fail_writes(true);
        assert!(registry.remove("Fido", "alice", false).await.is_err());
        assert!(registry.get("Fido").is_some());
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_load_resets_volatile_state() {
        let store = Arc::new(MemoryStore::with_records([PetRecord {
            pet_name: "Fido".into(),
            owner_name: "alice".into(),
            pet_type: "dog".into(),
            channel: Some("#test".into()),
        }]));
        let mut registry = registry_with(store.clone(), ScriptedDice::default());
        assert_eq!(registry.load().await.unwrap(), 1);
        assert_eq!(registry.get("Fido").unwrap().hunger, 0);
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_name_ordered_and_restartable() {
        let (mut registry, _) = with_fido().await;
        registry.create("Bella", "bob", "cat", None).await.unwrap();
        let first: Vec<_> = registry.list().collect();
        let second: Vec<_> = registry.list().collect();
        assert_eq!(first, vec![("Bella", "cat"), ("Fido", "dog")]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_beckon_goes_to_pet_channel() {
        let (mut registry, _) = with_fido().await;
        let out = registry.beckon("Fido", "carol", "#elsewhere").unwrap().unwrap();
        assert_eq!(out.target, "#test");
        assert_eq!(out.text, format!("{ITALIC}*Fido wags at carol*{ITALIC}"));
        assert!(matches!(
            registry.beckon("Nobody", "carol", "#test"),
            Err(PetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_feed_rejection_and_success() {
        let (mut registry, _) = with_fido().await;
        let out = registry.feed("Fido", "carol", "#test").unwrap().unwrap();
        assert_eq!(out.text, "\x1D*Fido sniffs at their food and walks away*\x1D");

        registry.pets.get_mut("Fido").unwrap().hunger = 4;
        let out = registry.feed("Fido", "carol", "#test").unwrap().unwrap();
        assert!(out.text.contains("carol"));
        assert_eq!(registry.get("Fido").unwrap().hunger, 0);
    }

    #[tokio::test]
    async fn test_tick_begs_in_pet_channel() {
        let (mut registry, _) = with_fido().await;
        registry.presence.join("#test", "alice");
        registry.pets.get_mut("Fido").unwrap().play_counter = 1_000;
        let mut lines = Vec::new();
        for _ in 0..5 {
            lines.extend(registry.tick());
        }
        assert!(lines.is_empty());
        let pet = registry.get("Fido").unwrap();
        assert_eq!(pet.hunger, 5);
        assert!(pet.begging);
        assert_eq!(pet.beg_delay, 0);

        let lines = registry.tick();
        assert_eq!(lines, vec![Outgoing::to("#test", "\x1D*Fido whines at alice*\x1D")]);
        assert_eq!(registry.get("Fido").unwrap().hunger, 5);
    }

    #[tokio::test]
    async fn test_tick_without_channel_is_silent() {
        let store = Arc::new(MemoryStore::default());
        let mut registry = registry_with(store, ScriptedDice::default());
        registry.create("Ghost", "alice", "dog", None).await.unwrap();
        for _ in 0..50 {
            assert!(registry.tick().is_empty());
        }
    }

    #[tokio::test]
    async fn test_quit_leaves_channelless_pet_awake() {
        let store = Arc::new(MemoryStore::default());
        let mut registry = registry_with(store, ScriptedDice::default());
        registry.create("Ghost", "alice", "dog", None).await.unwrap();
        assert!(registry.on_owner_departure("alice", None, Some("bye")).is_empty());
        let ghost = registry.get("Ghost").unwrap();
        assert_eq!(ghost.sleep_state(), SleepState::Awake);
        assert!(!ghost.wait_for_owner);
        for _ in 0..3 {
            registry.tick();
        }
        assert!(registry.get("Ghost").unwrap().hunger > 0);
    }

    #[tokio::test]
    async fn test_departure_and_arrival() {
        let (mut registry, _) = with_fido().await;
        registry.on_names("#test", &["alice".into(), "petbot".into()]);

        let out = registry.on_owner_departure("Alice", Some("#test"), Some("bye"));
        assert_eq!(
            out,
            vec![Outgoing::to(
                "#test",
                "\x1D*Fido flops over, waiting for alice to return*\x1D"
            )]
        );
        assert_eq!(registry.get("Fido").unwrap().sleep_state(), SleepState::Asleep);
        for _ in 0..100 {
            registry.tick();
        }
        assert_eq!(registry.get("Fido").unwrap().sleep_state(), SleepState::Asleep);

        let out = registry.on_owner_arrival("alice", "#test");
        assert_eq!(out, vec![Outgoing::to("#test", "\x1D*Fido yawns at alice*\x1D")]);
        assert_eq!(registry.get("Fido").unwrap().sleep_state(), SleepState::Awake);

        let out = registry.on_owner_arrival("alice", "#test");
        assert_eq!(out, vec![Outgoing::to("#test", "\x1D*Fido wags at alice*\x1D")]);
    }

    #[tokio::test]
    async fn test_host_change_is_ignored() {
        let (mut registry, _) = with_fido().await;
        registry.on_names("#test", &["alice".into()]);
        assert!(registry.on_owner_departure("alice", None, Some("Changing host")).is_empty());
        assert_eq!(registry.get("Fido").unwrap().sleep_state(), SleepState::Awake);
        assert!(registry.presence().is_present("#test", "alice"));
    }

    #[tokio::test]
    async fn test_departure_from_other_channel_does_not_sleep() {
        let (mut registry, _) = with_fido().await;
        assert!(registry.on_owner_departure("alice", Some("#other"), None).is_empty());
        assert_eq!(registry.get("Fido").unwrap().sleep_state(), SleepState::Awake);
    }

    #[tokio::test]
    async fn test_presence_sync_is_silent() {
        let (mut registry, _) = with_fido().await;
        registry.create("Rex", "bob", "dog", Some("#test")).await.unwrap();
        registry.on_names("#test", &["@alice".into()]);
        registry.sync_presence("#test");
        assert_eq!(registry.get("Fido").unwrap().sleep_state(), SleepState::Awake);
        let rex = registry.get("Rex").unwrap();
        assert_eq!(rex.sleep_state(), SleepState::Asleep);
        assert!(rex.wait_for_owner);
    }

    #[tokio::test]
    async fn test_bot_join_is_not_an_arrival() {
        let (mut registry, _) = with_fido().await;
        registry.on_names("#test", &["dave".into()]);
        assert!(registry.on_owner_arrival("PetBot", "#test").is_empty());
        assert!(!registry.presence().is_present("#test", "dave"));
    }

    #[tokio::test]
    async fn test_surroundings_lists_companions_and_members() {
        let (mut registry, _) = with_fido().await;
        registry.create("Rex", "bob", "dog", Some("#TEST")).await.unwrap();
        registry.create("Far", "bob", "dog", Some("#far")).await.unwrap();
        registry.on_names("#test", &["alice".into(), "petbot".into(), "carol".into()]);
        let around = registry.surroundings("Fido");
        assert!(around.owner_present);
        assert_eq!(around.companions, vec!["Rex".to_string()]);
        assert_eq!(around.members, vec!["alice".to_string(), "carol".to_string()]);
    }
}
