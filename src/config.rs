use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::error::{BotError, Result};

/// Largest pyramid the bot will ever draw.
pub const MAX_PYRAMID_SIZE: usize = 5;

/// Event name that enables the follow poller.
pub const FOLLOWS_EVENT: &str = "follows";

/// Placeholder substituted with follower names in `follow_message`.
pub const FOLLOW_PLACEHOLDER: &str = "{}";

const ENV_PREFIX: &str = "PYRAMIDBOT_";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub irc: IrcConfig,
    #[serde(default = "default_commands_config")]
    pub commands: CommandsConfig,
    #[serde(default = "default_events_config")]
    pub events: EventsConfig,
    #[serde(default = "default_api_config")]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IrcConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bot_name: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub channel: String,
    /// How many times to reconnect after the server closes the socket.
    #[serde(default)]
    pub reconnect_attempts: u32,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl IrcConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommandsConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_valid_commands")]
    pub valid: HashSet<String>,
    #[serde(default = "default_pyramid_symbol")]
    pub pyramid_symbol: String,
    /// Clamped into `1..=MAX_PYRAMID_SIZE` by `finalize`.
    #[serde(default = "default_pyramid_size")]
    pub pyramid_size: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventsConfig {
    #[serde(default)]
    pub valid: HashSet<String>,
    #[serde(default = "default_follow_message")]
    pub follow_message: String,
    /// Cron expression (with seconds) driving the follow poller.
    #[serde(default = "default_poll_schedule")]
    pub poll_schedule: String,
    /// Number of most recent follows requested per poll.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl EventsConfig {
    pub fn follows_enabled(&self) -> bool {
        self.valid.contains(FOLLOWS_EVENT)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_api_accept")]
    pub accept: String,
    /// Skips the `users?login=` lookup when set.
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "irc.chat.twitch.tv".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_valid_commands() -> HashSet<String> {
    HashSet::from(["pyramid".to_string()])
}

fn default_pyramid_symbol() -> String {
    "*".to_string()
}

fn default_pyramid_size() -> i64 {
    3
}

fn default_follow_message() -> String {
    "/me Thank you {} for the follow!".to_string()
}

fn default_poll_schedule() -> String {
    "*/10 * * * * *".to_string()
}

fn default_page_size() -> u32 {
    1
}

fn default_api_url() -> String {
    "https://api.twitch.tv/kraken/".to_string()
}

fn default_api_accept() -> String {
    "application/vnd.twitchtv.v5+json".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_commands_config() -> CommandsConfig {
    CommandsConfig {
        prefix: default_prefix(),
        valid: default_valid_commands(),
        pyramid_symbol: default_pyramid_symbol(),
        pyramid_size: default_pyramid_size(),
    }
}

fn default_events_config() -> EventsConfig {
    EventsConfig {
        valid: HashSet::new(),
        follow_message: default_follow_message(),
        poll_schedule: default_poll_schedule(),
        page_size: default_page_size(),
    }
}

fn default_api_config() -> ApiConfig {
    ApiConfig {
        url: default_api_url(),
        client_id: String::new(),
        accept: default_api_accept(),
        channel_id: None,
        timeout_secs: default_timeout_secs(),
    }
}

/// Clamp a requested pyramid size into `1..=MAX_PYRAMID_SIZE`.
pub fn clamp_pyramid_size(size: i64) -> usize {
    size.clamp(1, MAX_PYRAMID_SIZE as i64) as usize
}

impl Config {
    /// Read the TOML file, apply `PYRAMIDBOT_*` environment overrides,
    /// then normalise and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BotError::Config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::parse(&content)?;
        config.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())?;
        config.finalize()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BotError::Config(format!("failed to parse config file: {}", e)))
    }

    /// Override file values with whatever `lookup` returns for each
    /// recognised key (looked up without the `PYRAMIDBOT_` prefix).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.irc.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.irc.port = port
                .trim()
                .parse()
                .map_err(|_| BotError::Config(format!("invalid port override: {}", port)))?;
        }
        if let Some(bot_name) = lookup("BOT_NAME") {
            self.irc.bot_name = bot_name;
        }
        if let Some(token) = lookup("TOKEN") {
            self.irc.token = token;
        }
        if let Some(channel) = lookup("CHANNEL") {
            self.irc.channel = channel;
        }
        if let Some(client_id) = lookup("CLIENT_ID") {
            self.api.client_id = client_id;
        }
        if let Some(url) = lookup("API_URL") {
            self.api.url = url;
        }
        Ok(())
    }

    /// Normalise user-facing values and reject unusable settings.
    pub fn finalize(&mut self) -> Result<()> {
        self.irc.bot_name = self.irc.bot_name.trim().to_lowercase();
        self.irc.channel = self
            .irc
            .channel
            .trim()
            .trim_start_matches('#')
            .to_lowercase();
        self.irc.token = self.irc.token.trim().to_string();
        if !self.irc.token.is_empty() && !self.irc.token.starts_with("oauth:") {
            self.irc.token = format!("oauth:{}", self.irc.token);
        }

        if !self.api.url.ends_with('/') {
            self.api.url.push('/');
        }

        let clamped = clamp_pyramid_size(self.commands.pyramid_size) as i64;
        if clamped != self.commands.pyramid_size {
            warn!(
                "pyramid_size {} is out of range, using {}",
                self.commands.pyramid_size, clamped
            );
            self.commands.pyramid_size = clamped;
        }
        self.events.page_size = self.events.page_size.clamp(1, 100);

        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.irc.host.trim().is_empty() {
            return Err(BotError::Config("irc.host is required".into()));
        }
        if self.irc.port == 0 {
            return Err(BotError::Config("irc.port must be non-zero".into()));
        }
        if self.irc.bot_name.is_empty() {
            return Err(BotError::Config("irc.bot_name is required".into()));
        }
        if self.irc.token.is_empty() {
            return Err(BotError::Config("irc.token is required".into()));
        }
        if self.irc.channel.is_empty() {
            return Err(BotError::Config("irc.channel is required".into()));
        }
        if self.commands.prefix.is_empty() {
            return Err(BotError::Config("commands.prefix must not be empty".into()));
        }
        if self.commands.pyramid_symbol.trim().is_empty() {
            return Err(BotError::Config(
                "commands.pyramid_symbol must not be empty".into(),
            ));
        }

        let placeholders = self.events.follow_message.matches(FOLLOW_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(BotError::Config(format!(
                "events.follow_message must contain exactly one {} placeholder, found {}",
                FOLLOW_PLACEHOLDER, placeholders
            )));
        }

        if self.events.follows_enabled() {
            if self.api.client_id.trim().is_empty() {
                return Err(BotError::Config(
                    "api.client_id is required when the follows event is enabled".into(),
                ));
            }
            if self.events.poll_schedule.trim().is_empty() {
                return Err(BotError::Config("events.poll_schedule is required".into()));
            }
        }

        Ok(())
    }

    /// Render `follow_message` for one or more follower names.
    pub fn format_follow_message(&self, names: &str) -> String {
        self.events
            .follow_message
            .replacen(FOLLOW_PLACEHOLDER, names, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const MINIMAL: &str = r##"
[irc]
bot_name = "PyramidBot"
token = "abc123"
channel = "#SomeChannel"
"##;

    fn finalized(content: &str) -> Result<Config> {
        let mut config = Config::parse(content)?;
        config.finalize()?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = finalized(MINIMAL).unwrap();
        assert_eq!(config.irc.host, "irc.chat.twitch.tv");
        assert_eq!(config.irc.port, 6667);
        assert_eq!(config.irc.reconnect_attempts, 0);
        assert_eq!(config.commands.prefix, "!");
        assert!(config.commands.valid.contains("pyramid"));
        assert_eq!(config.commands.pyramid_symbol, "*");
        assert_eq!(config.commands.pyramid_size, 3);
        assert!(!config.events.follows_enabled());
        assert_eq!(config.api.url, "https://api.twitch.tv/kraken/");
    }

    #[test]
    fn test_channel_and_token_normalised() {
        let config = finalized(MINIMAL).unwrap();
        assert_eq!(config.irc.channel, "somechannel");
        assert_eq!(config.irc.bot_name, "pyramidbot");
        assert_eq!(config.irc.token, "oauth:abc123");
    }

    #[test]
    fn test_pyramid_size_clamped() {
        let content = format!("{}\n[commands]\npyramid_size = 42\n", MINIMAL);
        assert_eq!(finalized(&content).unwrap().commands.pyramid_size, 5);

        let content = format!("{}\n[commands]\npyramid_size = 0\n", MINIMAL);
        assert_eq!(finalized(&content).unwrap().commands.pyramid_size, 1);

        let content = format!("{}\n[commands]\npyramid_size = -2\n", MINIMAL);
        assert_eq!(finalized(&content).unwrap().commands.pyramid_size, 1);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let content = "[irc]\nbot_name = \"bot\"\nchannel = \"chan\"\n";
        let err = finalized(content).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
        assert!(err.to_string().contains("irc.token"));
    }

    #[test]
    fn test_missing_irc_section_is_config_error() {
        let err = Config::parse("[commands]\nprefix = \"?\"\n").unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn test_follows_requires_client_id() {
        let content = format!("{}\n[events]\nvalid = [\"follows\"]\n", MINIMAL);
        let err = finalized(&content).unwrap_err();
        assert!(err.to_string().contains("client_id"));

        let content = format!(
            "{}\n[events]\nvalid = [\"follows\"]\n[api]\nclient_id = \"cid\"\n",
            MINIMAL
        );
        assert!(finalized(&content).unwrap().events.follows_enabled());
    }

    #[test]
    fn test_follow_message_needs_one_placeholder() {
        let content = format!("{}\n[events]\nfollow_message = \"hello\"\n", MINIMAL);
        assert!(finalized(&content).is_err());

        let content = format!("{}\n[events]\nfollow_message = \"{{}} and {{}}\"\n", MINIMAL);
        assert!(finalized(&content).is_err());
    }

    #[test]
    fn test_format_follow_message() {
        let config = finalized(MINIMAL).unwrap();
        assert_eq!(
            config.format_follow_message("alice"),
            "/me Thank you alice for the follow!"
        );
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let mut config = Config::parse("[irc]\nbot_name = \"bot\"\n").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("TOKEN", "oauth:secret"),
            ("CHANNEL", "overridden"),
            ("PORT", "6697"),
            ("API_URL", "http://localhost:8080"),
        ]);
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        config.finalize().unwrap();

        assert_eq!(config.irc.token, "oauth:secret");
        assert_eq!(config.irc.channel, "overridden");
        assert_eq!(config.irc.port, 6697);
        assert_eq!(config.api.url, "http://localhost:8080/");
    }

    #[test]
    fn test_invalid_port_override_rejected() {
        let mut config = Config::parse(MINIMAL).unwrap();
        let err = config
            .apply_overrides(|key| (key == "PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.irc.address(), format!("irc.chat.twitch.tv:{}", config.irc.port));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Config::load(Path::new("/nonexistent/pyramidbot.toml")).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }
}
