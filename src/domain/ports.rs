use crate::domain::model::{IdentificationResult, IdentifyRequest};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait ConfigProvider: Send + Sync {
    fn model_endpoint(&self) -> &str;
    fn model(&self) -> &str;
    fn api_key(&self) -> Option<&str>;
    fn max_output_tokens(&self) -> u32;
    fn request_timeout(&self) -> Duration;
}

/// 多模態訊息的一個片段
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// data URI 或可公開存取的圖片 URL
    Image(String),
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub parts: Vec<ContentPart>,
    pub schema_name: &'static str,
    pub schema: serde_json::Value,
    pub max_output_tokens: u32,
}

/// 受 JSON schema 約束的結構化生成能力
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value>;
}

/// 對話層看到的辨識服務：可以是行程內的服務，也可以是遠端 HTTP 端點
#[async_trait]
pub trait ProductIdentifier: Send + Sync {
    async fn identify(&self, request: &IdentifyRequest) -> Result<IdentificationResult>;
}

#[async_trait]
impl<T: ProductIdentifier + ?Sized> ProductIdentifier for std::sync::Arc<T> {
    async fn identify(&self, request: &IdentifyRequest) -> Result<IdentificationResult> {
        (**self).identify(request).await
    }
}
