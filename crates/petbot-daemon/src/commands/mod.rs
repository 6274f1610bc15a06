//! Structured `<command> <args>` surface: the pet owner commands, the
//! chat-equivalent interactions, and the admin commands over the action table.

use std::mem;

use tracing::info;

use crate::{
    bridge::Outgoing,
    config::PetsConfig,
    pet::{ActionKind, PetError},
    registry::Registry,
};

const ADDPET: &str = "addpet <name> <species> - creates a new pet";
const REMOVEPET: &str = "removepet <name> - removes a pet that belongs to you";
const PETSTATUS: &str = "petstatus <name>";
const FEED: &str = "feed <name>";
const PETPET: &str = "petpet <name>";
const PLAY: &str = "play <name>";
const BECKON: &str = "beckon <name>";
const ADDPETTYPE: &str = "addpettype <species>";
const REMPETTYPE: &str = "rempettype <species>";
const PETACTIONS: &str = "petactions <species> [category]";
const ADDPETACTION: &str = "addpetaction <species> <category> \"<text with <nick>>\"";
const REMPETACTION: &str = "rempetaction <species> <category> <index>";

/// Who issued a command and where the answer goes.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub nick: &'a str,
    /// Channel the command was issued in; `None` for private messages.
    pub channel: Option<&'a str>,
    /// Where plain replies are sent: the channel, or the nick for a query.
    pub reply_to: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AddPet { name: String, species: String },
    RemovePet { name: String },
    ListPets,
    PetStatus { name: String },
    Feed { name: String },
    PetPet { name: String },
    Play { name: String },
    Beckon { name: String },
    PetTypes,
    AddPetType { species: String },
    RemPetType { species: String },
    PetActions { species: String, category: Option<ActionKind> },
    AddPetAction { species: String, category: ActionKind, text: String },
    RemPetAction { species: String, category: ActionKind, index: usize },
    SavePetConfig,
}

impl Command {
    /// `None` when `line` is not one of ours; `Some(Err)` carries a usage message.
    pub fn parse(line: &str) -> Option<Result<Self, PetError>> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let args = split_args(rest);
        let usage = |text: &str| PetError::usage(format!("Usage: {text}"));

        let command = match name.to_ascii_lowercase().as_str() {
            "addpet" | "apet" => match args.as_slice() {
                [name, species, ..] => Ok(Self::AddPet {
                    name: name.clone(),
                    species: species.clone(),
                }),
                _ => Err(usage(ADDPET)),
            },
            "removepet" | "rempet" | "rpet" => {
                single(&args).map(|name| Self::RemovePet { name }).ok_or_else(|| usage(REMOVEPET))
            }
            "listpets" | "lpet" | "lpets" => Ok(Self::ListPets),
            "petstatus" => single(&args).map(|name| Self::PetStatus { name }).ok_or_else(|| usage(PETSTATUS)),
            "feed" => single(&args).map(|name| Self::Feed { name }).ok_or_else(|| usage(FEED)),
            "petpet" => single(&args).map(|name| Self::PetPet { name }).ok_or_else(|| usage(PETPET)),
            "play" => single(&args).map(|name| Self::Play { name }).ok_or_else(|| usage(PLAY)),
            "beckon" => single(&args).map(|name| Self::Beckon { name }).ok_or_else(|| usage(BECKON)),
            "pettypes" => Ok(Self::PetTypes),
            "addpettype" => single(&args)
                .map(|species| Self::AddPetType { species })
                .ok_or_else(|| usage(ADDPETTYPE)),
            "rempettype" => single(&args)
                .map(|species| Self::RemPetType { species })
                .ok_or_else(|| usage(REMPETTYPE)),
            "petactions" => match args.as_slice() {
                [species] => Ok(Self::PetActions {
                    species: species.clone(),
                    category: None,
                }),
                [species, category, ..] => category_arg(category).map(|category| Self::PetActions {
                    species: species.clone(),
                    category: Some(category),
                }),
                _ => Err(usage(PETACTIONS)),
            },
            "addpetaction" => match args.as_slice() {
                [species, category, text @ ..] if !text.is_empty() => {
                    category_arg(category).map(|category| Self::AddPetAction {
                        species: species.clone(),
                        category,
                        text: text.join(" "),
                    })
                }
                _ => Err(usage(ADDPETACTION)),
            },
            "rempetaction" => match args.as_slice() {
                [species, category, index] => index
                    .parse::<usize>()
                    .map_err(|_| usage(REMPETACTION))
                    .and_then(|index| {
                        category_arg(category).map(|category| Self::RemPetAction {
                            species: species.clone(),
                            category,
                            index,
                        })
                    }),
                _ => Err(usage(REMPETACTION)),
            },
            "savepetconfig" => Ok(Self::SavePetConfig),
            _ => return None,
        };
        Some(command)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::PetTypes
                | Self::AddPetType { .. }
                | Self::RemPetType { .. }
                | Self::PetActions { .. }
                | Self::AddPetAction { .. }
                | Self::RemPetAction { .. }
                | Self::SavePetConfig
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AddPet { .. } => "addpet",
            Self::RemovePet { .. } => "removepet",
            Self::ListPets => "listpets",
            Self::PetStatus { .. } => "petstatus",
            Self::Feed { .. } => "feed",
            Self::PetPet { .. } => "petpet",
            Self::Play { .. } => "play",
            Self::Beckon { .. } => "beckon",
            Self::PetTypes => "pettypes",
            Self::AddPetType { .. } => "addpettype",
            Self::RemPetType { .. } => "rempettype",
            Self::PetActions { .. } => "petactions",
            Self::AddPetAction { .. } => "addpetaction",
            Self::RemPetAction { .. } => "rempetaction",
            Self::SavePetConfig => "savepetconfig",
        }
    }

    pub async fn execute(
        self,
        registry: &mut Registry,
        invocation: &Invocation<'_>,
        config: &PetsConfig,
    ) -> Result<Vec<Outgoing>, PetError> {
        let nick = invocation.nick;
        let origin = invocation.reply_to;
        let is_admin = config.is_admin(nick);
        if self.requires_admin() && !is_admin {
            return Err(PetError::PermissionDenied(self.name().to_string()));
        }
        let reply = |text: String| -> Result<Vec<Outgoing>, PetError> {
            Ok(vec![Outgoing::to(origin, text)])
        };

        match self {
            Self::AddPet { name, species } => {
                let pet = registry.create(&name, nick, &species, invocation.channel).await?;
                reply(format!("Added new {} {}", pet.species, pet.name))
            }
            Self::RemovePet { name } => {
                registry.remove(&name, nick, is_admin).await?;
                reply(format!("Deleted pet {name}"))
            }
            Self::ListPets => {
                let pets: Vec<String> = registry
                    .list()
                    .map(|(name, species)| format!("{name} ({species})"))
                    .collect();
                if pets.is_empty() {
                    reply("No pets yet".to_string())
                } else {
                    reply(format!("Pets: {}", pets.join(", ")))
                }
            }
            Self::PetStatus { name } => {
                let pet = registry
                    .get(&name)
                    .ok_or_else(|| PetError::NotFound(name.clone()))?;
                reply(pet.describe(registry.actions()))
            }
            Self::Feed { name } => Ok(registry.feed(&name, nick, origin)?.into_iter().collect()),
            Self::PetPet { name } => Ok(registry.love_on(&name, nick, origin)?.into_iter().collect()),
            Self::Play { name } => Ok(registry.play_with(&name, nick, origin)?.into_iter().collect()),
            Self::Beckon { name } => Ok(registry.beckon(&name, nick, origin)?.into_iter().collect()),
            Self::PetTypes => {
                let species: Vec<&str> = registry.actions().species_names().collect();
                reply(format!("Pet types: {}", species.join(", ")))
            }
            Self::AddPetType { species } => {
                registry.actions_mut().add_species(&species)?;
                info!(species = %species, by = nick, "Added pet type");
                reply(format!("Added pet type {species}"))
            }
            Self::RemPetType { species } => {
                registry.actions_mut().remove_species(&species)?;
                info!(species = %species, by = nick, "Removed pet type");
                reply(format!("Removed pet type {species}"))
            }
            Self::PetActions { species, category } => {
                let templates = registry.actions().categories(&species)?;
                let Some(kind) = category else {
                    if templates.is_empty() {
                        return reply(format!("{species} has no actions yet"));
                    }
                    let summary: Vec<String> = templates
                        .iter()
                        .map(|(category, list)| format!("{category} ({})", list.len()))
                        .collect();
                    return reply(format!("{species}: {}", summary.join(", ")));
                };
                let list = templates
                    .get(kind.key())
                    .ok_or_else(|| PetError::UnknownCategory {
                        species: species.clone(),
                        category: kind.key().to_string(),
                    })?;
                let entries: Vec<String> = list
                    .iter()
                    .enumerate()
                    .map(|(index, text)| format!("{index}) {text}"))
                    .collect();
                reply(format!("{species} {}: {}", kind.key(), entries.join(" | ")))
            }
            Self::AddPetAction { species, category, text } => {
                let index = registry.actions_mut().add_template(&species, category.key(), &text)?;
                reply(format!("Added {} #{index} for {species}", category.key()))
            }
            Self::RemPetAction { species, category, index } => {
                let removed = registry
                    .actions_mut()
                    .remove_template(&species, category.key(), index)?;
                reply(format!("Removed \"{removed}\" from {species} {}", category.key()))
            }
            Self::SavePetConfig => {
                registry.actions().save(&config.actions_path)?;
                reply(format!("Saved pet actions to {}", config.actions_path.display()))
            }
        }
    }
}

/// Whitespace-separated arguments; a double-quoted run is one argument with
/// the quotes stripped.
pub fn split_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    args.push(mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        args.push(current);
    }
    args
}

fn single(args: &[String]) -> Option<String> {
    args.first().cloned()
}

fn category_arg(category: &str) -> Result<ActionKind, PetError> {
    ActionKind::from_key(category).ok_or_else(|| {
        let known: Vec<&str> = ActionKind::ALL.iter().map(|kind| kind.key()).collect();
        PetError::usage(format!("Unknown category {category}, expected one of {}", known.join(", ")))
    })
}
