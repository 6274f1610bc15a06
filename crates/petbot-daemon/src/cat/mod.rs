//! The bot's own cat persona: meows back at greetings and does something
//! cat-like when called over.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::{
    bridge::ctcp_action,
    config::CatConfig,
    pet::{Dice, spec::render},
};

pub const GREETING_REPLY: &str = ":3 meow!";

const BUILTIN_ACTIONS: &[&str] = &[
    "rubs against <nick>'s legs",
    "purrs at <nick>",
    "ignores <nick> and licks a paw",
];

pub struct CatPlugin {
    greeting: Regex,
    beckon: Regex,
    actions: Vec<String>,
}

impl CatPlugin {
    /// `None` when the plugin is switched off.
    pub fn load(config: &CatConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let actions = if config.actions_path.exists() {
            read_actions(&config.actions_path)?
        } else {
            warn!("No cat actions at {:?}, using built-in set", config.actions_path);
            BUILTIN_ACTIONS.iter().map(|s| s.to_string()).collect()
        };
        info!("Loaded {} cat actions", actions.len());
        Self::new(&config.names, actions).map(Some)
    }

    pub fn new(names: &[String], actions: Vec<String>) -> Result<Self> {
        let names = names
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let greeting = Regex::new(&format!(r"(?i)(?:hello|hi) (?:{names})"))
            .context("invalid cat greeting pattern")?;
        let beckon = Regex::new(&format!(
            r"(?i)(?:come here|here|hey) (?:{names})|(?:{names}),? (?:come here|here)"
        ))
        .context("invalid cat beckon pattern")?;
        Ok(Self {
            greeting,
            beckon,
            actions,
        })
    }

    /// Reply to a chat line from `nick`, if it is addressed to the cat.
    pub fn respond(&self, nick: &str, text: &str, dice: &mut dyn Dice) -> Option<String> {
        if self.greeting.is_match(text) {
            return Some(GREETING_REPLY.to_string());
        }
        if self.beckon.is_match(text) && !self.actions.is_empty() {
            let action = &self.actions[dice.pick(self.actions.len())];
            return Some(ctcp_action(&render(action, nick)));
        }
        None
    }
}

fn read_actions(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cat actions {:?}", path))?;
    Ok(parse_actions(&raw))
}

/// One action per line. `//` lines are comments.
pub fn parse_actions(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.starts_with("//"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
