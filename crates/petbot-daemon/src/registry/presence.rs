use std::collections::BTreeMap;

/// Who is currently in each channel the bot sits in. Keys are lowercased;
/// values keep the nick as last seen on the wire.
#[derive(Debug, Default, Clone)]
pub struct Presence {
    channels: BTreeMap<String, BTreeMap<String, String>>,
}

/// Strips NAMES mode prefixes such as `@` and `+`.
pub fn strip_mode_prefix(nick: &str) -> &str {
    nick.trim_start_matches(['@', '+', '%', '~', '&'])
}

impl Presence {
    pub fn join(&mut self, channel: &str, nick: &str) {
        let nick = strip_mode_prefix(nick);
        if nick.is_empty() {
            return;
        }
        self.channels
            .entry(channel.to_lowercase())
            .or_default()
            .insert(nick.to_lowercase(), nick.to_string());
    }

    pub fn part(&mut self, channel: &str, nick: &str) {
        if let Some(members) = self.channels.get_mut(&channel.to_lowercase()) {
            members.remove(&nick.to_lowercase());
        }
    }

    /// Removes `nick` everywhere and returns the channels it was in.
    pub fn quit(&mut self, nick: &str) -> Vec<String> {
        let key = nick.to_lowercase();
        self.channels
            .iter_mut()
            .filter_map(|(channel, members)| members.remove(&key).map(|_| channel.clone()))
            .collect()
    }

    pub fn rename(&mut self, old: &str, new: &str) {
        let old_key = old.to_lowercase();
        for members in self.channels.values_mut() {
            if members.remove(&old_key).is_some() {
                members.insert(new.to_lowercase(), new.to_string());
            }
        }
    }

    /// Forgets a channel entirely, used when the bot itself leaves it.
    pub fn clear_channel(&mut self, channel: &str) {
        self.channels.remove(&channel.to_lowercase());
    }

    pub fn is_present(&self, channel: &str, nick: &str) -> bool {
        self.channels
            .get(&channel.to_lowercase())
            .is_some_and(|members| members.contains_key(&nick.to_lowercase()))
    }

    /// Members of `channel` in name order, minus `exclude`.
    pub fn members(&self, channel: &str, exclude: &str) -> Vec<String> {
        let exclude = exclude.to_lowercase();
        self.channels
            .get(&channel.to_lowercase())
            .map(|members| {
                members
                    .iter()
                    .filter(|(key, _)| **key != exclude)
                    .map(|(_, nick)| nick.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}
