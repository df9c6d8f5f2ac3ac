use crate::config::{DEFAULT_BIND, DEFAULT_MODEL, DEFAULT_MODEL_ENDPOINT, DEFAULT_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS};
use crate::core::identification::DEFAULT_MAX_OUTPUT_TOKENS;
use crate::core::ConfigProvider;
use crate::utils::error::{FinderError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub name: String,
    pub api_key: Option<String>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbose: bool,
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_MODEL_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            name: default_model(),
            api_key: None,
            max_output_tokens: default_max_output_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(FinderError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| FinderError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${AI_GATEWAY_API_KEY})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn bind_address(&self) -> &str {
        &self.server.bind
    }

    pub fn verbose(&self) -> bool {
        self.logging.verbose
    }
}

impl ConfigProvider for TomlConfig {
    fn model_endpoint(&self) -> &str {
        &self.model.endpoint
    }

    fn model(&self) -> &str {
        &self.model.name
    }

    fn api_key(&self) -> Option<&str> {
        // 未替換成功的 ${VAR} 視為未設定
        self.model
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty() && !env_var_pattern().is_match(key))
    }

    fn max_output_tokens(&self) -> u32 {
        self.model.max_output_tokens
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.model.timeout_seconds)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_socket_addr("server.bind", &self.server.bind)?;
        validation::validate_url("model.endpoint", &self.model.endpoint)?;
        validation::validate_non_empty_string("model.name", &self.model.name)?;
        validation::validate_positive_number(
            "model.max_output_tokens",
            self.model.max_output_tokens as u64,
            1,
        )?;
        validation::validate_range(
            "model.timeout_seconds",
            self.model.timeout_seconds,
            1,
            MAX_TIMEOUT_SECONDS,
        )?;
        Ok(())
    }
}
