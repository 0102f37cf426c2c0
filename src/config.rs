use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::lavalink::{hooks::RECONNECT_INTERVAL, NodeOptions};

const MAX_VOLUME: u16 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub prefix: String,
    pub scripts_path: PathBuf,

    // Lavalink
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,
    pub lavalink_secure: bool,
    pub lavalink_debug: bool,
    pub lavalink_logging: bool,
    pub retry_amount: u32,

    // Playback
    pub default_volume: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            prefix: std::env::var("BOT_PREFIX").unwrap_or(defaults.prefix),
            scripts_path: std::env::var("SCRIPTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.scripts_path),

            // Lavalink
            lavalink_host: std::env::var("LAVALINK_HOST").unwrap_or(defaults.lavalink_host),
            lavalink_port: std::env::var("LAVALINK_PORT")
                .unwrap_or_else(|_| "2333".to_string())
                .parse()
                .context("LAVALINK_PORT")?,
            lavalink_password: std::env::var("LAVALINK_PASSWORD").unwrap_or(defaults.lavalink_password),
            lavalink_secure: std::env::var("LAVALINK_SECURE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("LAVALINK_SECURE")?,
            lavalink_debug: std::env::var("LAVALINK_DEBUG")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("LAVALINK_DEBUG")?,
            lavalink_logging: std::env::var("LAVALINK_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("LAVALINK_LOGGING")?,
            retry_amount: std::env::var("LAVALINK_RETRY_AMOUNT")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("LAVALINK_RETRY_AMOUNT")?,

            // Playback
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("DEFAULT_VOLUME")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks that would otherwise only show up once the node is contacted.
    pub fn validate(&self) -> Result<()> {
        if self.lavalink_host.trim().is_empty() {
            anyhow::bail!("Lavalink host cannot be empty");
        }

        if self.lavalink_port == 0 {
            anyhow::bail!("Lavalink port must be greater than 0");
        }

        if self.retry_amount == 0 {
            anyhow::bail!("Retry amount must be greater than 0");
        }

        if self.default_volume > MAX_VOLUME {
            anyhow::bail!(
                "Default volume must be between 0 and {}, got: {}",
                MAX_VOLUME,
                self.default_volume
            );
        }

        if self.prefix.is_empty() {
            anyhow::bail!("Command prefix cannot be empty");
        }

        Ok(())
    }

    pub fn node_options(&self) -> NodeOptions {
        NodeOptions {
            host: self.lavalink_host.clone(),
            port: self.lavalink_port,
            password: self.lavalink_password.clone(),
            secure: self.lavalink_secure,
            retry_amount: self.retry_amount,
            logging: self.lavalink_logging,
            ..NodeOptions::default()
        }
    }

    /// Returns a summary of the current configuration for logging, without the token or
    /// the node password.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Bot: prefix \"{}\", scripts {}\n  \
            Lavalink: {}:{} (secure={}, debug={}, logging={})\n  \
            Reconnect: {} attempts, every {}\n  \
            Playback: {}% default volume",
            self.prefix,
            self.scripts_path.display(),
            self.lavalink_host,
            self.lavalink_port,
            self.lavalink_secure,
            self.lavalink_debug,
            self.lavalink_logging,
            self.retry_amount,
            humantime::format_duration(RECONNECT_INTERVAL),
            self.default_volume
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            prefix: "!".to_string(),
            scripts_path: "scripts.toml".into(),

            // Lavalink defaults
            lavalink_host: "localhost".to_string(),
            lavalink_port: 2333,
            lavalink_password: "youshallnotpass".to_string(),
            lavalink_secure: false,
            lavalink_debug: false,
            lavalink_logging: true,
            retry_amount: 7,

            default_volume: 100,
        }
    }
}

/// A prefix command: `<prefix><name> <message>` runs `code`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandScript {
    pub name: String,
    pub code: String,
}

/// A custom event: `code` runs whenever the node emits `event`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventScript {
    pub event: String,
    /// Channel for the output; the player's text channel when absent.
    #[serde(default)]
    pub channel: Option<String>,
    pub name: String,
    pub code: String,
}

/// Contents of the scripts file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptsFile {
    #[serde(default)]
    pub commands: Vec<CommandScript>,
    #[serde(default)]
    pub events: Vec<EventScript>,
}

impl ScriptsFile {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .with_context(|| format!("Failed to load scripts from {}", path.display()))
    }

    /// Parses TOML text directly.
    pub fn from_toml(text: &str) -> Result<Self> {
        ::config::Config::builder()
            .add_source(::config::File::from_str(text, ::config::FileFormat::Toml))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .context("Failed to parse scripts")
    }

    pub fn command(&self, name: &str) -> Option<&CommandScript> {
        self.commands.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            lavalink_port: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            default_volume: 1001,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            retry_amount: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            lavalink_host: " ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_node_options_and_summary() {
        let config = Config {
            discord_token: "secret-token".to_string(),
            lavalink_host: "lava.example".to_string(),
            lavalink_secure: true,
            retry_amount: 3,
            ..Config::default()
        };

        let options = config.node_options();
        assert_eq!(options.address(), "lava.example:2333");
        assert!(options.secure);
        assert_eq!(options.retry_amount, 3);

        let summary = config.summary();
        assert!(!summary.contains("secret-token"));
        assert!(!summary.contains("youshallnotpass"));
        assert!(summary.contains("lava.example:2333"));
        assert!(summary.contains("3 attempts, every 15s"));
    }

    #[test]
    fn test_scripts_file_parsing() {
        let scripts = ScriptsFile::from_toml(
            r#"
            [[commands]]
            name = "play"
            code = "$joinVoice $playTrack[$message]"

            [[events]]
            event = "trackStart"
            channel = "123456789012345678"
            name = "announce"
            code = "Started $trackInfo[title]"

            [[events]]
            event = "queueEnd"
            name = "bye"
            code = "Queue finished"
            "#,
        )
        .unwrap();

        assert_eq!(scripts.command("PLAY").map(|c| c.code.as_str()), Some("$joinVoice $playTrack[$message]"));
        assert_eq!(scripts.events.len(), 2);
        assert_eq!(scripts.events[0].channel.as_deref(), Some("123456789012345678"));
        assert_eq!(scripts.events[1].channel, None);
    }
}
