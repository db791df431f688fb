use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Injected configuration for one scrape run. All knobs have defaults
/// matching the production deployment; a TOML file may override any subset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScraperConfig {
    /// Listing endpoint for the subreddit being scraped.
    pub subreddit_url: String,
    /// Descriptive client-identifying header sent with every request.
    pub user_agent: String,
    /// Keyword patterns, matched case-insensitively as independent
    /// alternatives.
    pub patterns: Vec<String>,
    /// Retry ceiling per fetch, including the first attempt.
    pub max_retries: u32,
    /// Backoff before the second attempt; doubles per retry.
    pub initial_backoff_secs: f64,
    /// Fixed pacing delay between successive post-detail fetches.
    pub inter_post_delay_secs: f64,
    pub request_timeout_secs: u64,
    pub database_url: String,
    pub export_path: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            subreddit_url: "https://www.reddit.com/r/changemyview/.json".to_string(),
            user_agent: "script:redsift-keyword-extractor:v1.0".to_string(),
            patterns: vec![r"\bisrael\b".to_string(), r"\bjew\b".to_string()],
            max_retries: 5,
            initial_backoff_secs: 10.0,
            inter_post_delay_secs: 2.0,
            request_timeout_secs: 10,
            database_url: "sqlite://redsift.db".to_string(),
            export_path: "redsift-export.jsonl".to_string(),
        }
    }
}

impl ScraperConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ScraperConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.patterns.is_empty() {
            return Err(invalid("patterns", "at least one pattern is required"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "must be at least 1"));
        }
        if !(self.initial_backoff_secs > 0.0) || !self.initial_backoff_secs.is_finite() {
            return Err(invalid(
                "initial_backoff_secs",
                "must be a positive finite number",
            ));
        }
        if !(self.inter_post_delay_secs >= 0.0) || !self.inter_post_delay_secs.is_finite() {
            return Err(invalid(
                "inter_post_delay_secs",
                "must be a non-negative finite number",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
