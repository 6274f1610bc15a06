use tracing::{debug, error, warn};

use crate::{
    bridge::{HostEvent, Outgoing, is_channel},
    cat::CatPlugin,
    commands::{Command, Invocation},
    config::PetsConfig,
    pet::{Dice, PetError},
    registry::Registry,
    triggers::{self, TriggerKind, TriggerMatch},
};

/// Routes host events to commands, chat triggers, the cat and the registry.
pub struct PetBot {
    registry: Registry,
    cat: Option<CatPlugin>,
    cat_dice: Box<dyn Dice>,
    config: PetsConfig,
    command_prefix: String,
}

impl PetBot {
    pub fn new(
        registry: Registry,
        cat: Option<CatPlugin>,
        cat_dice: Box<dyn Dice>,
        config: PetsConfig,
        command_prefix: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            cat,
            cat_dice,
            config,
            command_prefix: command_prefix.into(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub async fn handle(&mut self, event: HostEvent) -> Vec<Outgoing> {
        match event {
            HostEvent::Chat {
                nick,
                channel,
                text,
            } => self.on_chat(&nick, channel.as_deref(), &text).await,
            HostEvent::Action {
                nick,
                channel,
                text,
            } => {
                let reply_to = channel.as_deref().unwrap_or(&nick);
                let hits = triggers::match_action(&text);
                self.on_trigger(&hits, &nick, reply_to)
            }
            HostEvent::Join { nick, channel } => self.registry.on_owner_arrival(&nick, &channel),
            HostEvent::Part {
                nick,
                channel,
                reason,
            } => self
                .registry
                .on_owner_departure(&nick, Some(&channel), reason.as_deref()),
            HostEvent::Quit { nick, reason } => {
                self.registry.on_owner_departure(&nick, None, reason.as_deref())
            }
            HostEvent::NickChange { old, new } => {
                self.registry.on_nick_change(&old, &new);
                Vec::new()
            }
            HostEvent::Names { channel, nicks } => {
                self.registry.on_names(&channel, &nicks);
                Vec::new()
            }
            HostEvent::NamesEnd { channel } => {
                self.registry.sync_presence(&channel);
                Vec::new()
            }
        }
    }

    pub fn tick(&mut self) -> Vec<Outgoing> {
        self.registry.tick()
    }

    async fn on_chat(&mut self, nick: &str, channel: Option<&str>, text: &str) -> Vec<Outgoing> {
        let reply_to = channel.unwrap_or(nick);

        // queries take commands with or without the prefix
        let command_line = match text.strip_prefix(self.command_prefix.as_str()) {
            Some(line) => Some(line),
            None if channel.is_none() => Some(text),
            None => None,
        };
        if let Some(parsed) = command_line.and_then(Command::parse) {
            let invocation = Invocation {
                nick,
                channel: channel.filter(|c| is_channel(c)),
                reply_to,
            };
            let result = match parsed {
                Ok(command) => {
                    debug!(command = command.name(), nick, "running command");
                    command
                        .execute(&mut self.registry, &invocation, &self.config)
                        .await
                }
                Err(err) => Err(err),
            };
            return result.unwrap_or_else(|err| vec![Outgoing::to(reply_to, rejection(&err))]);
        }

        let hits = triggers::match_chat(text);
        let mut out = self.on_trigger(&hits, nick, reply_to);
        if let Some(cat) = &self.cat
            && let Some(reply) = cat.respond(nick, text, self.cat_dice.as_mut())
        {
            out.push(Outgoing::to(reply_to, reply).delayed(self.config.response_delay()));
        }
        out
    }

    /// Acts on the first candidate that names an existing pet.
    fn on_trigger(&mut self, hits: &[TriggerMatch], nick: &str, origin: &str) -> Vec<Outgoing> {
        let Some(hit) = hits.iter().find(|hit| self.registry.get(&hit.target).is_some()) else {
            return Vec::new();
        };
        let name = hit.target.as_str();
        let result = match hit.kind {
            TriggerKind::Beckon => self.registry.beckon(name, nick, origin),
            TriggerKind::Affection => self.registry.love_on(name, nick, origin),
            TriggerKind::Feed => self.registry.feed(name, nick, origin),
            TriggerKind::Play => self.registry.play_with(name, nick, origin),
        };
        match result {
            Ok(line) => line
                .into_iter()
                .map(|line| line.delayed(self.config.response_delay()))
                .collect(),
            Err(PetError::NotFound(_)) => Vec::new(),
            Err(err) => {
                warn!(?err, pet = name, "chat trigger failed");
                Vec::new()
            }
        }
    }
}

/// Text shown to the user for a failed command.
fn rejection(err: &PetError) -> String {
    match err {
        PetError::Storage(cause) => {
            error!(?cause, "pet storage failed");
            "Could not save that right now, try again later".to_string()
        }
        other => other.to_string(),
    }
}
