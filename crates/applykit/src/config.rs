//! Environment-driven configuration
//!
//! Read once at startup by the server and CLI binaries. CLI flags
//! override individual fields where they exist.

use crate::error::{ApplyError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration shared by both front ends.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat-completions API root, e.g. `https://api.openai.com/v1`
    pub llm_base_url: String,
    /// Bearer token for the LLM service
    pub llm_api_key: String,
    /// Model identifier
    pub llm_model: String,
    /// Per-call LLM timeout
    pub llm_timeout: Duration,
    /// Page fetch deadline
    pub scrape_timeout: Duration,
    /// Prepared page content cap in characters
    pub max_content_chars: usize,
    /// TTL for cached scrapes and LLM responses
    pub cache_ttl: Duration,
    /// Whether caching is enabled at all
    pub use_cache: bool,
    /// Where results land on disk
    pub output_dir: PathBuf,
}

impl Config {
    /// Load from the environment (`.env` honored). Only the API key is
    /// required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let llm_api_key = std::env::var("APPLYKIT_LLM_API_KEY")
            .map_err(|_| ApplyError::Config("APPLYKIT_LLM_API_KEY not set".into()))?;

        Ok(Self {
            llm_base_url: env_or("APPLYKIT_LLM_BASE_URL", "https://api.openai.com/v1"),
            llm_api_key,
            llm_model: env_or("APPLYKIT_LLM_MODEL", "gpt-4o-mini"),
            llm_timeout: Duration::from_secs(env_parse("APPLYKIT_LLM_TIMEOUT_SECS", 120)?),
            scrape_timeout: Duration::from_secs(env_parse("APPLYKIT_SCRAPE_TIMEOUT_SECS", 30)?),
            max_content_chars: env_parse("APPLYKIT_MAX_CONTENT_CHARS", 10_000)?,
            cache_ttl: Duration::from_secs(env_parse("APPLYKIT_CACHE_TTL_SECS", 3_600)?),
            use_cache: true,
            output_dir: PathBuf::from(env_or("APPLYKIT_OUTPUT_DIR", "output")),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ApplyError::Config(format!("invalid value for {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_default_and_override() {
        assert_eq!(env_parse::<u64>("APPLYKIT_TEST_UNSET_VAR", 42).unwrap(), 42);

        std::env::set_var("APPLYKIT_TEST_PARSE_VAR", "7");
        assert_eq!(env_parse::<u64>("APPLYKIT_TEST_PARSE_VAR", 42).unwrap(), 7);

        std::env::set_var("APPLYKIT_TEST_PARSE_VAR", "not a number");
        assert!(env_parse::<u64>("APPLYKIT_TEST_PARSE_VAR", 42).is_err());
        std::env::remove_var("APPLYKIT_TEST_PARSE_VAR");
    }
}
