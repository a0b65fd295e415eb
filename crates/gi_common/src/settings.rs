//! Daemon settings.
//!
//! Flat TOML file with serde defaults; a missing file yields the defaults so
//! the daemon runs out of the box. Provider credentials come from the file
//! or the GI_API_KEY environment variable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which external AI backend to call, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Rule-based replies only, no outbound calls.
    #[default]
    Disabled,
    /// Any OpenAI-compatible chat completion endpoint.
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Disabled => "disabled",
            ProviderKind::OpenAi => "openai",
        }
    }
}

/// External AI provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Outbound request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    /// The external path runs only when a backend is selected and a key is
    /// present (or the endpoint is local and needs none).
    pub fn is_enabled(&self) -> bool {
        self.kind != ProviderKind::Disabled && self.api_key.is_some()
    }
}

/// Rate-limit thresholds per action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_consult_limit")]
    pub consult_limit: usize,
    #[serde(default = "default_consult_window_secs")]
    pub consult_window_secs: u64,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_search_window_secs")]
    pub search_window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            consult_limit: default_consult_limit(),
            consult_window_secs: default_consult_window_secs(),
            search_limit: default_search_limit(),
            search_window_secs: default_search_window_secs(),
        }
    }
}

/// Top-level daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub rate_limits: RateLimitSettings,
    /// TTL for the consultation response cache, seconds. 0 disables it.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Nonce lifetime, seconds.
    #[serde(default = "default_nonce_ttl_secs")]
    pub nonce_ttl_secs: u64,
    /// Optional path to a JSON grant seed file for the in-memory store.
    #[serde(default)]
    pub grants_file: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            provider: ProviderSettings::default(),
            rate_limits: RateLimitSettings::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            nonce_ttl_secs: default_nonce_ttl_secs(),
            grants_file: None,
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:7867".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_consult_limit() -> usize {
    30
}

fn default_consult_window_secs() -> u64 {
    60
}

fn default_search_limit() -> usize {
    50
}

fn default_search_window_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    256
}

fn default_nonce_ttl_secs() -> u64 {
    43200
}

impl Settings {
    /// Load from a TOML file, falling back to defaults when the file is
    /// missing. A malformed file is an error; silently ignoring it would
    /// hide rate-limit misconfiguration.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut settings = if path.exists() {
            let raw = fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            Settings::default()
        };

        if settings.provider.api_key.is_none() {
            if let Ok(key) = std::env::var("GI_API_KEY") {
                if !key.is_empty() {
                    settings.provider.api_key = Some(key);
                }
            }
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.rate_limits.consult_limit, 30);
        assert_eq!(s.rate_limits.consult_window_secs, 60);
        assert_eq!(s.provider.timeout_secs, 30);
        assert_eq!(s.provider.kind, ProviderKind::Disabled);
        assert!(!s.provider.is_enabled());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(s.bind_addr, "127.0.0.1:7867");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "bind_addr = \"0.0.0.0:9000\"\n[provider]\nkind = \"openai\"\napi_key = \"sk-test\"\n",
        )
        .unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.bind_addr, "0.0.0.0:9000");
        assert!(s.provider.is_enabled());
        assert_eq!(s.rate_limits.search_limit, 50);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "bind_addr = [not toml").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
