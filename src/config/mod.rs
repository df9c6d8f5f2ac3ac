pub mod lambda;
pub mod toml_config;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MODEL_ENDPOINT: &str = "https://ai-gateway.vercel.sh/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-5";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const MAX_TIMEOUT_SECONDS: u64 = 300;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

#[cfg(feature = "cli")]
mod cli {
    use super::*;
    use crate::core::identification::DEFAULT_MAX_OUTPUT_TOKENS;
    use crate::core::ConfigProvider;
    use crate::utils::error::Result;
    use crate::utils::validation::{self, Validate};
    use clap::Parser;
    use std::time::Duration;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "medicine-finder")]
    #[command(about = "Identify healthcare products and compare retailer offers")]
    pub struct CliConfig {
        #[arg(long, env = "MEDICINE_FINDER_BIND", default_value = DEFAULT_BIND)]
        pub bind: String,

        #[arg(long, env = "MEDICINE_FINDER_MODEL_ENDPOINT", default_value = DEFAULT_MODEL_ENDPOINT)]
        pub model_endpoint: String,

        #[arg(long, env = "MEDICINE_FINDER_MODEL", default_value = DEFAULT_MODEL)]
        pub model: String,

        #[arg(long, env = "AI_GATEWAY_API_KEY", hide_env_values = true)]
        pub api_key: Option<String>,

        #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_TOKENS)]
        pub max_output_tokens: u32,

        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
        pub timeout_seconds: u64,

        /// Path to a TOML configuration file (overrides the flags above)
        #[arg(short, long)]
        pub config: Option<String>,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,
    }

    impl ConfigProvider for CliConfig {
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

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validation::validate_socket_addr("bind", &self.bind)?;
            validation::validate_url("model_endpoint", &self.model_endpoint)?;
            validation::validate_non_empty_string("model", &self.model)?;
            validation::validate_positive_number("max_output_tokens", self.max_output_tokens as u64, 1)?;
            validation::validate_range("timeout_seconds", self.timeout_seconds, 1, MAX_TIMEOUT_SECONDS)?;
            Ok(())
        }
    }

}
