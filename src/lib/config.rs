use anyhow::Context;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

pub const DEFAULT_MODEL_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8787";

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match non_blank(lookup, key) {
        None => Ok(default),
        Some(text) => text
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("fails to parse `{key}` from `{text}`")),
    }
}

/// Chat-completion provider settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_MODEL_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ModelConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(env_lookup)
    }
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let base_url = non_blank(&lookup, "CALCNEST_MODEL_URL")
            .unwrap_or_else(|| DEFAULT_MODEL_URL.to_string());
        Ok(Self {
            api_key: non_blank(&lookup, "OPENAI_API_KEY"),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: non_blank(&lookup, "CALCNEST_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: parsed(&lookup, "CALCNEST_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            max_tokens: parsed(&lookup, "CALCNEST_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub listen: SocketAddr,
    pub model: ModelConfig,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(env_lookup)
    }
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let default_listen: SocketAddr = DEFAULT_LISTEN
            .parse()
            .with_context(|| "fails to parse the default listen address")?;
        Ok(Self {
            listen: parsed(&lookup, "CALCNEST_LISTEN", default_listen)?,
            model: ModelConfig::from_lookup(&lookup)?,
        })
    }
}

/// A remote generation endpoint, for clients that do not call the model themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub url: String,
    /// Sent both as bearer token and as `apikey` header.
    pub key: Option<String>,
}

impl EndpointConfig {
    /// `None` when no endpoint is configured.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(env_lookup)
    }
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        Some(Self {
            url: non_blank(&lookup, "CALCNEST_ENDPOINT")?,
            key: non_blank(&lookup, "CALCNEST_ENDPOINT_KEY"),
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
    fn model_defaults() {
        let config = ModelConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ModelConfig::default());
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 1000);
    }
    #[test]
    fn model_overrides() {
        let config = ModelConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("CALCNEST_MODEL_URL", "http://127.0.0.1:9000/v1/"),
            ("CALCNEST_TEMPERATURE", "0.7"),
            ("CALCNEST_MAX_TOKENS", "50"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url, "http://127.0.0.1:9000/v1");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 50);
    }
    #[test]
    fn blank_key_is_absent() {
        let config = ModelConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert_eq!(config.api_key, None);
    }
    #[test]
    fn malformed_numbers_are_errors() {
        let error = ModelConfig::from_lookup(lookup(&[("CALCNEST_MAX_TOKENS", "lots")])).unwrap_err();
        assert!(format!("{error:#}").contains("CALCNEST_MAX_TOKENS"));
        assert!(ServiceConfig::from_lookup(lookup(&[("CALCNEST_LISTEN", "nowhere")])).is_err());
    }
    #[test]
    fn service_listen_address() {
        let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.listen.to_string(), DEFAULT_LISTEN);
        let config = ServiceConfig::from_lookup(lookup(&[("CALCNEST_LISTEN", "0.0.0.0:80")])).unwrap();
        assert_eq!(config.listen.port(), 80);
    }
    #[test]
    fn endpoint_is_optional() {
        assert_eq!(EndpointConfig::from_lookup(lookup(&[])), None);
        let endpoint = EndpointConfig::from_lookup(lookup(&[
            ("CALCNEST_ENDPOINT", "https://example.test/functions/v1/generate-calculator"),
            ("CALCNEST_ENDPOINT_KEY", "anon"),
        ]))
        .unwrap();
        assert_eq!(endpoint.key.as_deref(), Some("anon"));
    }
}
