use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_STREAM_TTL_SECS: u64 = 60;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful and expertly trained programmer bot from GreenGamesStudio. Your goal is to assist users with their coding questions. When they provide an image, it is likely a screenshot of their code, a script, or an error message. Analyze it carefully along with their text prompt to provide accurate, concise, and helpful solutions or explanations. Format code blocks appropriately.";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

/// Settings for the upstream model relay, read from the environment.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Absent keys are tolerated at startup; every relay request then fails.
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub system_instruction: String,
    pub max_image_bytes: usize,
    pub stream_ttl: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            stream_ttl: Duration::from_secs(DEFAULT_STREAM_TTL_SECS),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let max_image_bytes = match non_empty("MAX_IMAGE_BYTES") {
            Some(raw) => parse_positive("MAX_IMAGE_BYTES", &raw)? as usize,
            None => defaults.max_image_bytes,
        };
        let stream_ttl = match non_empty("STREAM_TTL_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("STREAM_TTL_SECS", &raw)?),
            None => defaults.stream_ttl,
        };

        Ok(Self {
            api_key: non_empty("API_KEY").or_else(|| non_empty("GEMINI_API_KEY")),
            model: non_empty("GEMINI_MODEL").unwrap_or(defaults.model),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            system_instruction: non_empty("SYSTEM_INSTRUCTION")
                .unwrap_or(defaults.system_instruction),
            max_image_bytes,
            stream_ttl,
        })
    }

    /// Upper bound for a relay request body: the base64-inflated image plus room for history.
    pub fn max_body_bytes(&self) -> usize {
        self.max_image_bytes / 3 * 4 + 4 * 1024 * 1024
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        }),
    }
}
