//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};

use crate::gemini::DEFAULT_BASE_URL;
use crate::session::DEFAULT_PROMPT;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub bind_addr: SocketAddr,
    pub gemini_base_url: String,
    pub default_prompt: String,
}

impl Config {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. A missing or blank API key is fatal.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = non_blank("GEMINI_API_KEY")
            .or_else(|| non_blank("API_KEY"))
            .ok_or_else(|| anyhow!("GEMINI_API_KEY must be set in the environment or .env file"))?;

        let addr = non_blank("CAPTIONER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .with_context(|| format!("invalid CAPTIONER_ADDR: {addr}"))?;

        Ok(Self {
            api_key: api_key.trim().to_string(),
            bind_addr,
            gemini_base_url: non_blank("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_prompt: non_blank("CAPTIONER_PROMPT")
                .unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_key_refuses_to_start() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert!(Config::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")])).is_err());
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.gemini_base_url, DEFAULT_BASE_URL);
        assert_eq!(config.default_prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn api_key_fallback_and_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("API_KEY", "fallback"),
            ("CAPTIONER_ADDR", "127.0.0.1:8080"),
            ("GEMINI_BASE_URL", "http://localhost:9999"),
            ("CAPTIONER_PROMPT", "Write alt text"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "fallback");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.gemini_base_url, "http://localhost:9999");
        assert_eq!(config.default_prompt, "Write alt text");
    }

    #[test]
    fn bad_address_is_an_error() {
        let err = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("CAPTIONER_ADDR", "not-an-addr"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CAPTIONER_ADDR"));
    }
}
