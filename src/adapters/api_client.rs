use crate::adapters::http::{IDENTIFY_PATH, PROVENANCE_HEADER};
use crate::domain::model::{IdentificationResult, IdentifyRequest, Provenance};
use crate::domain::ports::ProductIdentifier;
use crate::utils::error::{FinderError, Result};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use reqwest::Client;

/// `POST /api/identify-product` 的用戶端，對話層透過它取得辨識結果
pub struct IdentifyClient {
    client: Client,
    url: String,
}

impl IdentifyClient {
    /// `base_url` 例如 `http://127.0.0.1:3000`
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            url: format!("{}{}", base_url.trim_end_matches('/'), IDENTIFY_PATH),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProductIdentifier for IdentifyClient {
    async fn identify(&self, request: &IdentifyRequest) -> Result<IdentificationResult> {
        tracing::debug!("Posting identify request to: {}", self.url);
        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        tracing::debug!("Identify endpoint status: {}", status);
        if !status.is_success() {
            return Err(FinderError::UnexpectedFailure {
                message: format!("identify endpoint returned {}", status),
            });
        }

        let provenance = response
            .headers()
            .get(PROVENANCE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<Provenance>().ok());
        if provenance == Some(Provenance::Fallback) {
            tracing::info!("ℹ️ Endpoint served sample data");
        }

        // 端點回傳的資料也要符合產品與零售商的限制
        let result: IdentificationResult = response.json().await?;
        result.validate()?;
        Ok(result)
    }
}
