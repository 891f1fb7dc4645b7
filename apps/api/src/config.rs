use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::orchestrator::AnalysisSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Per-call LLM timeout in seconds.
    pub llm_timeout_secs: u64,
    /// Largest edit distance at which a misspelled output field is renamed.
    pub max_field_edit_distance: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: optional_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            llm_timeout_secs: optional_env("LLM_TIMEOUT_SECS", 90)?,
            max_field_edit_distance: optional_env("MAX_FIELD_EDIT_DISTANCE", 2)?,
        })
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            llm_timeout: Duration::from_secs(self.llm_timeout_secs),
            max_field_edit_distance: self.max_field_edit_distance,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or_default(key, std::env::var(key).ok(), default)
}

fn parse_or_default<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{value}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_value_uses_default() {
        let port: u16 = parse_or_default("PORT", None, 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_value_is_parsed() {
        let secs: u64 = parse_or_default("LLM_TIMEOUT_SECS", Some(" 30 ".to_string()), 90).unwrap();
        assert_eq!(secs, 30);
    }

    #[test]
    fn test_invalid_value_names_the_variable() {
        let err = parse_or_default::<u16>("PORT", Some("eighty".to_string()), 8080).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_analysis_settings_follow_config() {
        let config = Config {
            anthropic_api_key: "test-key".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            llm_timeout_secs: 45,
            max_field_edit_distance: 1,
        };
        let settings = config.analysis_settings();
        assert_eq!(settings.llm_timeout, Duration::from_secs(45));
        assert_eq!(settings.max_field_edit_distance, 1);
    }
}
