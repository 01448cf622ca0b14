use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::message::parser::ParserConfig;
use crate::message::{is_control_sender, CONTROL_SENDERS};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub parser: ParserSettings,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Where the chat bus lives and how patient to be with it.
#[derive(Debug, Deserialize, Clone)]
pub struct BusConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Unset means a quiet bus is never treated as a failure.
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
    /// Idle time before TCP keepalive checks begin. Catches a bus host
    /// that vanished without closing the connection.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Sender label attached to replies. Unset means an empty sender.
    /// `<...>` labels are bus commands and are rejected.
    #[serde(default)]
    pub reply_sender: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParserSettings {
    #[serde(default = "default_mention_names")]
    pub mention_names: Vec<String>,
    #[serde(default = "default_true")]
    pub remove_punctuation: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconnectConfig {
    /// Fixed delay between a lost session and the next connect attempt.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RuleConfig {
    Exact {
        phrase: String,
        reply: String,
        #[serde(default = "default_true")]
        targeted: bool,
    },
    Loose {
        candidates: Vec<String>,
        reply: String,
        #[serde(default)]
        targeted: bool,
    },
    Intercept {
        candidates: Vec<String>,
    },
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8011
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_keepalive_secs() -> u64 {
    60
}

fn default_max_frame_bytes() -> usize {
    1024 * 1024
}

fn default_mention_names() -> Vec<String> {
    vec!["holly".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_backoff_secs() -> u64 {
    30
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: None,
            keepalive_secs: default_keepalive_secs(),
            max_frame_bytes: default_max_frame_bytes(),
            reply_sender: None,
        }
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            mention_names: default_mention_names(),
            remove_punctuation: default_true(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff_secs(),
        }
    }
}

impl BusConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

impl ParserSettings {
    pub fn to_parser_config(&self) -> ParserConfig {
        ParserConfig::new(&self.mention_names, self.remove_punctuation)
    }
}

impl ReconnectConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.bus.host.trim().is_empty() {
            bail!("[bus] host must not be empty");
        }
        if self.bus.connect_timeout_secs == 0 {
            bail!("[bus] connect_timeout_secs must be at least 1");
        }
        if self.bus.read_timeout_secs == Some(0) {
            bail!("[bus] read_timeout_secs must be at least 1 when set");
        }
        if self.bus.keepalive_secs == 0 {
            bail!("[bus] keepalive_secs must be at least 1");
        }
        if let Some(sender) = self.bus.reply_sender.as_deref() {
            if is_control_sender(sender) {
                bail!(
                    "[bus] reply_sender {:?} is reserved for bus commands ({})",
                    sender,
                    CONTROL_SENDERS.join(", ")
                );
            }
        }
        if self.reconnect.backoff_secs == 0 {
            bail!("[reconnect] backoff_secs must be at least 1");
        }
        for (i, rule) in self.rules.iter().enumerate() {
            let candidates = match rule {
                RuleConfig::Loose { candidates, .. } | RuleConfig::Intercept { candidates } => {
                    candidates
                }
                RuleConfig::Exact { .. } => continue,
            };
            if candidates.is_empty() {
                bail!("rule #{} has no candidates", i + 1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.bus.address(), "127.0.0.1:8011");
        assert_eq!(config.bus.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.bus.read_timeout(), None);
        assert_eq!(config.bus.keepalive(), Duration::from_secs(60));
        assert_eq!(config.bus.max_frame_bytes, 1024 * 1024);
        assert_eq!(config.bus.reply_sender, None);
        assert_eq!(config.reconnect.backoff(), Duration::from_secs(30));
        assert_eq!(config.parser.mention_names, ["holly"]);
        assert!(config.parser.remove_punctuation);
        assert_eq!(config.parser.to_parser_config(), ParserConfig::default());
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
[bus]
host = "10.0.0.5"
port = 9000
read_timeout_secs = 300
keepalive_secs = 15
reply_sender = "Holly"

[parser]
mention_names = ["holly", "@h"]
remove_punctuation = false

[reconnect]
backoff_secs = 5

[[rules]]
kind = "intercept"
candidates = ["xyzzy", "Xyzzy"]

[[rules]]
kind = "exact"
phrase = "ping"
reply = "pong"

[[rules]]
kind = "loose"
candidates = ["good morning"]
reply = "morning!"
"#,
        )
        .unwrap();

        assert_eq!(config.bus.address(), "10.0.0.5:9000");
        assert_eq!(config.bus.read_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.bus.keepalive(), Duration::from_secs(15));
        assert_eq!(config.bus.reply_sender.as_deref(), Some("Holly"));
        assert!(!config.parser.remove_punctuation);
        assert_eq!(config.reconnect.backoff(), Duration::from_secs(5));
        assert_eq!(
            config.rules,
            vec![
                RuleConfig::Intercept {
                    candidates: vec!["xyzzy".to_string(), "Xyzzy".to_string()],
                },
                RuleConfig::Exact {
                    phrase: "ping".to_string(),
                    reply: "pong".to_string(),
                    targeted: true,
                },
                RuleConfig::Loose {
                    candidates: vec!["good morning".to_string()],
                    reply: "morning!".to_string(),
                    targeted: false,
                },
            ]
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::parse("[reconnect]\nbackoff_secs = 0").is_err());
        assert!(Config::parse("[bus]\nread_timeout_secs = 0").is_err());
        assert!(Config::parse("[bus]\nhost = \" \"").is_err());
        assert!(Config::parse("[bus]\nkeepalive_secs = 0").is_err());
        assert!(Config::parse("[bus]\nreply_sender = \"<restart>\"").is_err());
        assert!(Config::parse("[bus]\nreply_sender = \"<refresh>\"").is_err());
        assert!(Config::parse("[bus]\nreply_sender = \" <file>\"").is_err());
        assert!(Config::parse("[[rules]]\nkind = \"intercept\"\ncandidates = []").is_err());
        assert!(Config::parse("[[rules]]\nkind = \"shout\"\nreply = \"HI\"").is_err());
    }

    #[test]
    fn test_reply_sender_error_names_reserved_labels() {
        let err = Config::parse("[bus]\nreply_sender = \"<html>\"").unwrap_err();
        let text = format!("{:#}", err);
        assert!(text.contains("reserved for bus commands"), "{text}");
        assert!(text.contains("<screenshot>"), "{text}");
        assert!(Config::parse("[bus]\nreply_sender = \"Holly\"").is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
