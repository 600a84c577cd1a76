use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IngressMode {
    #[default]
    Polling,
    Webhook,
}

impl std::fmt::Display for IngressMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngressMode::Polling => write!(f, "polling"),
            IngressMode::Webhook => write!(f, "webhook"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    #[serde(default = "default_ingress_config")]
    pub ingress: IngressConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the provider's canonical URL.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return &self.base_url;
        }
        "https://api.openai.com/v1"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngressConfig {
    #[serde(default)]
    pub mode: IngressMode,
    /// Externally reachable URL Telegram calls back on; required in webhook mode.
    #[serde(default)]
    pub webhook_base_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_port() -> u16 {
    10000
}

fn default_ingress_config() -> IngressConfig {
    IngressConfig {
        mode: IngressMode::default(),
        webhook_base_url: String::new(),
        port: default_port(),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Secrets may come from the environment instead of the config file.
    fn apply_env_overrides(&mut self) {
        if self.telegram.bot_token.is_empty() {
            if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
                self.telegram.bot_token = token;
            }
        }
        if self.llm.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                self.llm.api_key = key;
            }
        }
    }

    /// Missing required values are fatal at startup, naming what is missing.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            bail!("telegram.bot_token is missing (set it in the config file or TELEGRAM_BOT_TOKEN)");
        }
        if self.llm.api_key.is_empty() {
            bail!("llm.api_key is missing (set it in the config file or OPENAI_API_KEY)");
        }
        if self.ingress.mode == IngressMode::Webhook && self.ingress.webhook_base_url.is_empty() {
            bail!("ingress.webhook_base_url is required when ingress.mode = \"webhook\"");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Config {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse(
            r#"
            [telegram]
            bot_token = "123:abc"

            [llm]
            api_key = "sk-test"
            "#,
        );

        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.llm.request_timeout_secs, 30);
        assert_eq!(config.llm.effective_base_url(), "https://api.openai.com/v1");
        assert_eq!(config.ingress.mode, IngressMode::Polling);
        assert_eq!(config.ingress.port, 10000);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_bot_token_is_fatal() {
        let config = parse(
            r#"
            [telegram]

            [llm]
            api_key = "sk-test"
            "#,
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("telegram.bot_token"));
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let config = parse(
            r#"
            [telegram]
            bot_token = "123:abc"

            [llm]
            "#,
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("llm.api_key"));
    }

    #[test]
    fn test_webhook_mode_requires_base_url() {
        let config = parse(
            r#"
            [telegram]
            bot_token = "123:abc"

            [llm]
            api_key = "sk-test"

            [ingress]
            mode = "webhook"
            "#,
        );

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ingress.webhook_base_url"));
    }

    #[test]
    fn test_webhook_mode_with_base_url_is_valid() {
        let config = parse(
            r#"
            [telegram]
            bot_token = "123:abc"

            [llm]
            api_key = "sk-test"
            model = "gpt-4"

            [ingress]
            mode = "webhook"
            webhook_base_url = "https://relay.example.com"
            port = 8443
            "#,
        );

        assert_eq!(config.ingress.mode, IngressMode::Webhook);
        assert_eq!(config.ingress.port, 8443);
        assert_eq!(config.llm.model, "gpt-4");
        config.validate().unwrap();
    }
}
