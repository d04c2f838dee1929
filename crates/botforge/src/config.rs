//! Host configuration.
//!
//! One TOML file, one table per concern. Every field has a default and
//! every table is `#[serde(default)]`, so a file only needs the keys it
//! changes:
//!
//! ```toml
//! data_dir = "data"
//!
//! [cache]
//! interval_secs = 30
//!
//! [welcome]
//! enabled = false
//! ```

use std::path::{Path, PathBuf};

use botforge_cache::FlushConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Errors from reading or writing the host config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Everything the host reads at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Root of the document cache. Documents live at
    /// `<data_dir>/<namespace>/<key>.json`.
    pub data_dir: PathBuf,
    pub cache: FlushConfig,
    pub presence: PresenceConfig,
    pub welcome: WelcomeConfig,
    pub console: ConsoleConfig,
    pub shutdown: ShutdownConfig,
    pub logging: LoggingConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache: FlushConfig::default(),
            presence: PresenceConfig::default(),
            welcome: WelcomeConfig::default(),
            console: ConsoleConfig::default(),
            shutdown: ShutdownConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// How the initial roster is fetched when the launcher doesn't offer one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Command whose first output parameter is the `", "`-separated list
    /// of online players.
    pub roster_query: String,
    /// Pause between failed roster queries.
    pub roster_retry_delay_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            roster_query: "/testfor @a".to_string(),
            roster_retry_delay_ms: 1_000,
        }
    }
}

/// The broadcast sent once the host is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeConfig {
    pub enabled: bool,
    /// Delay after plugin init before the first line goes out.
    pub delay_ms: u64,
    pub banner: String,
    pub hint: String,
    /// Sent after the broadcast to mark the bot entity.
    pub tag_command: String,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 500,
            banner: "botforge is online".to_string(),
            hint: "Plugins loaded, have fun!".to_string(),
            tag_command: "/tag @s add robot".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Read operator commands from stdin once the host is ready.
    pub enabled: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Reason shown to players when the bot kicks itself on exit.
    pub kick_message: String,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            kick_message: "botforge shutting down".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads the config at `path`.
    ///
    /// If the file doesn't exist, the default config is written there and
    /// returned.
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                let write_err = |source| ConfigError::Write {
                    path: path.to_path_buf(),
                    source,
                };
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
                }
                tokio::fs::write(path, config.to_toml_string()?)
                    .await
                    .map_err(write_err)?;
                info!(path = %path.display(), "created default config");
                Ok(config)
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.cache.interval_secs, 60);
        assert_eq!(cfg.presence.roster_query, "/testfor @a");
        assert_eq!(cfg.welcome.delay_ms, 500);
        assert_eq!(cfg.welcome.tag_command, "/tag @s add robot");
        assert!(cfg.console.enabled);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_from_toml_str_partial_file_keeps_defaults() {
        let cfg = HostConfig::from_toml_str(
            r#"
data_dir = "/srv/bot"

[cache]
interval_secs = 15

[welcome]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/srv/bot"));
        assert_eq!(cfg.cache.interval_secs, 15);
        assert_eq!(cfg.cache.initial_jitter_ms, FlushConfig::default().initial_jitter_ms);
        assert!(!cfg.welcome.enabled);
        assert_eq!(cfg.welcome.delay_ms, 500);
        assert_eq!(cfg.presence, PresenceConfig::default());
    }

    #[test]
    fn test_from_toml_str_wrong_type_is_parse_error() {
        let err = HostConfig::from_toml_str("[console]\nenabled = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_to_toml_string_reparses_to_same_config() {
        let mut cfg = HostConfig::default();
        cfg.logging.json = true;
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(HostConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[tokio::test]
    async fn test_load_or_create_missing_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("botforge.toml");

        let cfg = HostConfig::load_or_create(&path).await.unwrap();
        assert_eq!(cfg, HostConfig::default());
        assert!(path.exists());

        let again = HostConfig::load_or_create(&path).await.unwrap();
        assert_eq!(again, cfg);
    }

    #[tokio::test]
    async fn test_load_or_create_existing_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("botforge.toml");
        tokio::fs::write(&path, "[logging]\nlevel = \"debug\"\n").await.unwrap();

        let cfg = HostConfig::load_or_create(&path).await.unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert!(!cfg.logging.json);
    }
}
