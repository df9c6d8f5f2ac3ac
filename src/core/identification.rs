use crate::core::{mock, schema};
use crate::domain::model::{Identification, IdentificationResult, IdentifyRequest, Provenance};
use crate::domain::ports::{ContentPart, GenerationRequest, ProductIdentifier, StructuredGenerator};
use crate::utils::error::{FinderError, Result, MISSING_INPUT_MESSAGE};
use async_trait::async_trait;
use std::sync::Arc;

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 3000;

/// 備援目錄的預設種子
const FALLBACK_SEED: &str = "medicine";

const IMAGE_INSTRUCTION: &str = "Identify the medicine or healthcare product in this image. Provide the exact product if recognizable, or similar alternatives if not clear.";

pub struct IdentificationService {
    generator: Arc<dyn StructuredGenerator>,
    max_output_tokens: u32,
}

impl IdentificationService {
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self::with_max_output_tokens(generator, DEFAULT_MAX_OUTPUT_TOKENS)
    }

    pub fn with_max_output_tokens(generator: Arc<dyn StructuredGenerator>, max_output_tokens: u32) -> Self {
        Self {
            generator,
            max_output_tokens,
        }
    }

    /// 辨識產品。模型呼叫失敗時不重試，直接改用示範目錄。
    pub async fn identify(&self, request: &IdentifyRequest) -> Result<Identification> {
        if request.is_empty() {
            return Err(FinderError::invalid_request(MISSING_INPUT_MESSAGE));
        }

        let generation = self.build_request(request);
        tracing::debug!(
            "Requesting structured generation: {} parts, max {} tokens",
            generation.parts.len(),
            generation.max_output_tokens
        );

        let outcome = match self.generator.generate(&generation).await {
            Ok(value) => schema::parse_identification(value),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                tracing::info!(
                    "✅ Identified {} product(s) with {} confidence",
                    result.products.len(),
                    result.confidence
                );
                Ok(Identification {
                    result,
                    provenance: Provenance::Generated,
                })
            }
            Err(e) => {
                tracing::warn!("⚠️ Model unavailable, using sample data: {}", e);
                let seed = request.query_text().unwrap_or(FALLBACK_SEED);
                Ok(Identification {
                    result: mock::mock(seed),
                    provenance: Provenance::Fallback,
                })
            }
        }
    }

    pub fn build_request(&self, request: &IdentifyRequest) -> GenerationRequest {
        GenerationRequest {
            parts: build_prompt(request),
            schema_name: schema::SCHEMA_NAME,
            schema: schema::identification_schema(),
            max_output_tokens: self.max_output_tokens,
        }
    }
}

#[async_trait]
impl ProductIdentifier for IdentificationService {
    async fn identify(&self, request: &IdentifyRequest) -> Result<IdentificationResult> {
        IdentificationService::identify(self, request)
            .await
            .map(|identification| identification.result)
    }
}

/// 組合多模態提示：有描述時先放文字說明，有圖片時附上圖片與辨識指示
pub fn build_prompt(request: &IdentifyRequest) -> Vec<ContentPart> {
    let mut parts = Vec::new();

    if let Some(query) = request.query_text() {
        parts.push(ContentPart::Text(query_instruction(query)));
    }

    if let Some(image) = request.image_data() {
        parts.push(ContentPart::Image(image.to_string()));
        parts.push(ContentPart::Text(IMAGE_INSTRUCTION.to_string()));
    }

    parts
}

fn query_instruction(query: &str) -> String {
    format!(
        "Identify the medicine or healthcare product based on this description: \"{}\".\n\n\
         Provide 2-4 relevant products that match the description. For each product:\n\
         - Include accurate product names with dosages\n\
         - Provide helpful descriptions\n\
         - List 3-5 major pharmacy retailers (CVS, Walgreens, Amazon Pharmacy, Rite Aid, Target, Walmart)\n\
         - Generate realistic price ranges based on typical market prices\n\
         - Vary availability and ratings to be realistic\n\
         - Include estimated shipping times\n\n\
         If the query is vague, provide popular options in that category.",
        query
    )
}
