use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub irc: IrcConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pets: PetsConfig,
    #[serde(default)]
    pub cat: CatConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        if let Ok(path) = env::var("PETBOT_CONFIG") {
            return Self::from_path(Path::new(&path));
        }

        let project_root = env::var("PETBOT_ROOT").unwrap_or_else(|_| ".".to_string());
        let default_path = Path::new(&project_root).join("config/petbot.toml");
        if default_path.exists() {
            return Self::from_path(&default_path);
        }

        let example_path = Path::new(&project_root).join("config/petbot.example.toml");
        if example_path.exists() {
            tracing::warn!("Using example configuration at {:?}", example_path);
            return Self::from_path(&example_path);
        }

        Ok(Self::default())
    }

    fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::from_toml(&contents).with_context(|| format!("invalid config: {:?}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IrcConfig {
    #[serde(default = "IrcConfig::default_server")]
    pub server: String,
    #[serde(default = "IrcConfig::default_port")]
    pub port: u16,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default = "IrcConfig::default_nickname")]
    pub nickname: String,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "IrcConfig::default_command_prefix")]
    pub command_prefix: String,
}

impl IrcConfig {
    fn default_server() -> String {
        "irc.libera.chat".into()
    }
    fn default_port() -> u16 {
        6667
    }
    fn default_nickname() -> String {
        "petbot".into()
    }
    fn default_command_prefix() -> String {
        ".".into()
    }
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            server: Self::default_server(),
            port: Self::default_port(),
            use_tls: false,
            nickname: Self::default_nickname(),
            channels: Vec::new(),
            command_prefix: Self::default_command_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_url")]
    pub url: String,
    #[serde(default = "StorageConfig::default_auth_token_env")]
    pub auth_token_env: String,
}

impl StorageConfig {
    fn default_url() -> String {
        "file:petbot.db".into()
    }
    fn default_auth_token_env() -> String {
        "TURSO_AUTH_TOKEN".into()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            auth_token_env: Self::default_auth_token_env(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PetsConfig {
    #[serde(default = "PetsConfig::default_actions_path")]
    pub actions_path: PathBuf,
    #[serde(default = "PetsConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub response_delay_ms: u64,
    #[serde(default)]
    pub admins: Vec<String>,
}

impl PetsConfig {
    fn default_actions_path() -> PathBuf {
        PathBuf::from("data/pet.json")
    }
    fn default_tick_interval_ms() -> u64 {
        60_000
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Pacing for replies to chat triggers; `None` sends immediately.
    pub fn response_delay(&self) -> Option<Duration> {
        (self.response_delay_ms > 0).then(|| Duration::from_millis(self.response_delay_ms))
    }

    pub fn is_admin(&self, nick: &str) -> bool {
        self.admins.iter().any(|admin| admin.eq_ignore_ascii_case(nick))
    }
}

impl Default for PetsConfig {
    fn default() -> Self {
        Self {
            actions_path: Self::default_actions_path(),
            tick_interval_ms: Self::default_tick_interval_ms(),
            response_delay_ms: 0,
            admins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatConfig {
    #[serde(default = "CatConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default = "CatConfig::default_actions_path")]
    pub actions_path: PathBuf,
    #[serde(default = "CatConfig::default_names")]
    pub names: Vec<String>,
}

impl CatConfig {
    fn default_enabled() -> bool {
        true
    }
    fn default_actions_path() -> PathBuf {
        PathBuf::from("data/cat_actions.txt")
    }
    fn default_names() -> Vec<String> {
        vec!["catbot".into(), "kitty".into()]
    }
}

impl Default for CatConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            actions_path: Self::default_actions_path(),
            names: Self::default_names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.irc.port, 6667);
        assert_eq!(config.irc.command_prefix, ".");
        assert_eq!(config.pets.tick_interval(), Duration::from_secs(60));
        assert!(config.pets.response_delay().is_none());
        assert_eq!(config.cat.names, vec!["catbot", "kitty"]);
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r##"
            [irc]
            nickname = "fidobot"
            channels = ["#pets"]

            [pets]
            tick_interval_ms = 10000
            response_delay_ms = 1500
            admins = ["Alice"]
            "##,
        )
        .unwrap();
        assert_eq!(config.irc.nickname, "fidobot");
        assert_eq!(config.irc.server, "irc.libera.chat");
        assert_eq!(config.pets.response_delay(), Some(Duration::from_millis(1500)));
        assert!(config.pets.is_admin("alice"));
        assert!(!config.pets.is_admin("bob"));
        assert_eq!(config.storage.url, "file:petbot.db");
    }

    #[test]
    fn test_example_config_parses() {
        let config = AppConfig::from_toml(include_str!("../../../../config/petbot.example.toml")).unwrap();
        assert!(config.irc.use_tls);
        assert_eq!(config.pets.actions_path, PathBuf::from("data/pet.json"));
    }
}
