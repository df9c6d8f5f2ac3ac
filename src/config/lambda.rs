use crate::config::{DEFAULT_MODEL, DEFAULT_MODEL_ENDPOINT, DEFAULT_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS};
use crate::core::identification::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::env;
use std::time::Duration;

/// 無伺服器環境的設定，全部來自環境變數
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub model_endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_output_tokens: u32,
    pub timeout_seconds: u64,
}

impl LambdaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Self {
            model_endpoint: lookup("MEDICINE_FINDER_MODEL_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_MODEL_ENDPOINT.to_string()),
            model: lookup("MEDICINE_FINDER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: lookup("AI_GATEWAY_API_KEY").filter(|key| !key.trim().is_empty()),
            max_output_tokens: lookup("MAX_OUTPUT_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            timeout_seconds: lookup("REQUEST_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

impl ConfigProvider for LambdaConfig {
    fn model_endpoint(&self) -> &str {
        &self.model_endpoint
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("MEDICINE_FINDER_MODEL_ENDPOINT", &self.model_endpoint)?;
        validation::validate_non_empty_string("MEDICINE_FINDER_MODEL", &self.model)?;
        validation::validate_positive_number("MAX_OUTPUT_TOKENS", self.max_output_tokens as u64, 1)?;
        validation::validate_range("REQUEST_TIMEOUT_SECONDS", self.timeout_seconds, 1, MAX_TIMEOUT_SECONDS)?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}
