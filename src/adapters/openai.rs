// 相容 OpenAI 的 `POST {endpoint}/chat/completions`，以 json_schema 要求結構化輸出

use crate::domain::ports::{ConfigProvider, ContentPart, GenerationRequest, StructuredGenerator};
use crate::utils::error::{FinderError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat<'a>,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ChatContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatContent {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    r#type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    pub fn from_config<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        Self::new(
            config.model_endpoint(),
            config.model(),
            config.api_key().map(str::to_string),
            config.request_timeout(),
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    fn convert_parts(parts: &[ContentPart]) -> Vec<ChatContent> {
        parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => ChatContent::Text { text: text.clone() },
                ContentPart::Image(url) => ChatContent::ImageUrl {
                    image_url: ImageUrl { url: url.clone() },
                },
            })
            .collect()
    }
}

#[async_trait]
impl StructuredGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<serde_json::Value> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FinderError::upstream("model API key is not configured"))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::convert_parts(&request.parts),
            }],
            response_format: ResponseFormat {
                r#type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: request.schema_name,
                    schema: &request.schema,
                    strict: false,
                },
            },
            max_completion_tokens: request.max_output_tokens,
        };

        tracing::debug!(
            "Sending structured generation request to {} (model {})",
            self.completions_url(),
            self.model
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FinderError::upstream(format!("model request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FinderError::RateLimited {
                message: format!("model returned {}: {}", status, error_text),
            });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FinderError::upstream(format!(
                "model returned error {}: {}",
                status, error_text
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| FinderError::upstream(format!("failed to parse model response: {}", e)))?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| FinderError::upstream("model response contained no choices"))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(FinderError::upstream(format!("model refused: {}", refusal)));
        }

        tracing::debug!("Model finish reason: {:?}", choice.finish_reason);

        let content = choice
            .message
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| FinderError::upstream("model response had no content"))?;

        serde_json::from_str(&content)
            .map_err(|e| FinderError::schema("$", format!("model output is not valid JSON: {}", e)))
    }
}
