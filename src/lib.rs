pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

use std::sync::Arc;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::config::{lambda::LambdaConfig, toml_config::TomlConfig};
pub use crate::core::conversation::{ChatSession, Conversation};
pub use crate::core::identification::IdentificationService;
pub use crate::core::ranker::{AvailabilityFilter, RankView, SortKey};
pub use crate::core::symptoms::{SymptomAnalysis, SymptomAnalyzer};
pub use crate::domain::model::{IdentificationResult, IdentifyRequest, Provenance};
pub use crate::utils::error::{FinderError, Result};

use crate::adapters::openai::OpenAiGenerator;
use crate::domain::ports::{ConfigProvider, StructuredGenerator};

/// 依設定建立辨識服務（OpenAI 相容閘道 + 示範資料備援）
pub fn build_service<C: ConfigProvider + ?Sized>(config: &C) -> Result<Arc<IdentificationService>> {
    if config.api_key().is_none() {
        tracing::warn!("⚠️ No API key configured; identification will serve sample data");
    }

    let generator = OpenAiGenerator::from_config(config)?;
    tracing::info!(
        "🤖 Model: {} via {}",
        config.model(),
        config.model_endpoint()
    );

    Ok(Arc::new(IdentificationService::with_max_output_tokens(
        Arc::new(generator),
        config.max_output_tokens(),
    )))
}

/// 依設定建立症狀分析器；沒有 API key 時只用關鍵字對照表
pub fn build_symptom_analyzer<C: ConfigProvider + ?Sized>(config: &C) -> Result<Arc<SymptomAnalyzer>> {
    let generator: Option<Arc<dyn StructuredGenerator>> = match config.api_key() {
        Some(key) if !key.trim().is_empty() => {
            let generator: Arc<dyn StructuredGenerator> = Arc::new(OpenAiGenerator::from_config(config)?);
            Some(generator)
        }
        _ => None,
    };
    Ok(Arc::new(SymptomAnalyzer::new(generator)))
}
