// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::infra::errors::ParleyError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub call_provider: CallProviderConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub billing: BillingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Shared secret the auth gateway presents as a bearer token. `None`
    /// disables the check (local development).
    pub gateway_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8321,
            gateway_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: None }
    }
}

impl DatabaseConfig {
    /// Resolved database path: configured value, else `~/.local/share/parley/parley.db`.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(ref p) = self.path {
            return p.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("parley").join("parley.db"))
            .unwrap_or_else(|| PathBuf::from("parley.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Signs webhook payloads and user tokens. Overridable via
    /// PARLEY_CALL_API_SECRET.
    pub api_secret: String,
}

impl Default for CallProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://video.stream-io-api.com".into(),
            api_key: String::new(),
            api_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Credential for the real-time conversational AI endpoint. Overridable
    /// via PARLEY_REALTIME_API_KEY. Missing key fails agent connect, never
    /// meeting creation.
    pub api_key: String,
    pub voice: String,
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        // Turn-detection tuning: keep the agent from talking over participants.
        Self {
            api_key: String::new(),
            voice: "alloy".into(),
            vad_threshold: 0.5,
            vad_prefix_padding_ms: 300,
            vad_silence_duration_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chat.stream-io-api.com".into(),
            api_key: String::new(),
            api_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// How many prior channel messages go into a post-meeting reply context.
    pub chat_context_messages: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-4.1-mini".into(),
            chat_context_messages: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Subscription provider endpoint; empty = everyone is a free account.
    pub base_url: String,
    pub api_key: String,
    pub agent_cost_per_minute: f64,
    pub max_free_meetings: i64,
    pub max_free_agents: i64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            agent_cost_per_minute: 0.10,
            max_free_meetings: 3,
            max_free_agents: 3,
        }
    }
}

impl Config {
    /// Load from the default location (`~/.config/parley/config.toml`),
    /// falling back to defaults if the file does not exist.
    pub fn load() -> Result<Self, ParleyError> {
        let path = dirs::config_dir()
            .map(|d| d.join("parley").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"));
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default().with_env_overrides())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ParleyError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| ParleyError::Config(format!("{}: {e}", path.display())))?;
        Ok(config.with_env_overrides())
    }

    /// Secrets can come from the environment instead of the config file.
    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("PARLEY_CALL_API_KEY") {
            self.call_provider.api_key = v;
        }
        if let Ok(v) = std::env::var("PARLEY_CALL_API_SECRET") {
            self.call_provider.api_secret = v;
        }
        if let Ok(v) = std::env::var("PARLEY_REALTIME_API_KEY") {
            self.realtime.api_key = v;
        }
        if let Ok(v) = std::env::var("PARLEY_CHAT_API_KEY") {
            self.chat.api_key = v;
        }
        if let Ok(v) = std::env::var("PARLEY_CHAT_API_SECRET") {
            self.chat.api_secret = v;
        }
        if let Ok(v) = std::env::var("PARLEY_MODEL_API_KEY") {
            self.model.api_key = v;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8321);
        assert_eq!(config.realtime.voice, "alloy");
        assert!((config.billing.agent_cost_per_minute - 0.10).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            bind = "0.0.0.0"
            port = 9000

            [realtime]
            api_key = "sk-test"
            voice = "verse"
            vad_threshold = 0.6
            vad_prefix_padding_ms = 250
            vad_silence_duration_ms = 400
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.realtime.voice, "verse");
        assert_eq!(config.billing.max_free_meetings, 3);
    }
}
