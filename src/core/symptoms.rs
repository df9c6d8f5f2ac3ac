use crate::domain::ports::{ContentPart, GenerationRequest, StructuredGenerator};
use crate::utils::error::{FinderError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const SCHEMA_NAME: &str = "symptom_keywords";

pub const DISCLAIMER: &str =
    "Not medical advice. For persistent or severe symptoms, consult a licensed healthcare professional.";

pub const MAX_QUERY_CHARS: usize = 1000;

pub const MAX_OUTPUT_TOKENS: u32 = 200;

pub const FALLBACK_FLAG: &str = "fallback_used";

pub const RATE_LIMITED_FLAG: &str = "openai_rate_limited";

const ERROR_FLAG_PREFIX: &str = "openai_error:";

const NORMALIZER_INSTRUCTION: &str = "You are a pharmacy query normalizer. Given a user's free-text symptoms, return JSON:\n\
{\"cleaned_symptoms\":[...],\"candidate_keywords\":[...],\"categories\":[...],\"safety_flags\":[...]}\n\
Return ONLY minified JSON (no prose).";

/// 模型不可用時的關鍵字對照表：(觸發字, 關鍵字, 分類)，依序比對
const FALLBACK_RULES: &[(&[&str], &[&str], &str)] = &[
    (
        &["sleep", "insomnia", "melatonin", "awake"],
        &["melatonin", "sleep gummies", "valerian"],
        "sleep",
    ),
    (
        &["stomach", "gas", "relief", "diarrhea"],
        &["rolaids", "maalox", "mylanta"],
        "stomachache",
    ),
    (
        &["pain", "headache", "sore", "ache"],
        &["ibuprofen", "acetaminophen", "naproxen"],
        "pain relief",
    ),
    (
        &["acne", "pimple"],
        &["benzoyl peroxide", "salicylic acid", "adapalene"],
        "acne",
    ),
    (
        &["hair", "fall", "loss"],
        &["biotin", "minoxidil", "ketoconazole shampoo"],
        "hair care",
    ),
];

/// `POST /api/ask` 的請求內容
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SymptomQuery {
    #[serde(default)]
    pub query: Option<String>,
}

impl SymptomQuery {
    /// 去除前後空白後的症狀描述；空白或過長時為請求錯誤
    pub fn validated(&self) -> Result<&str> {
        let query = self.query.as_deref().map(str::trim).unwrap_or_default();
        if query.is_empty() {
            return Err(FinderError::invalid_request("query is required"));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(FinderError::invalid_request(format!(
                "query must be at most {} characters",
                MAX_QUERY_CHARS
            )));
        }
        Ok(query)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymptomAnalysis {
    #[serde(default)]
    pub cleaned_symptoms: Vec<String>,
    #[serde(default)]
    pub candidate_keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub safety_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomAnswer {
    pub data: SymptomAnalysis,
    pub disclaimer: &'static str,
}

pub fn symptom_schema() -> serde_json::Value {
    let strings = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "properties": {
            "cleaned_symptoms": strings,
            "candidate_keywords": strings,
            "categories": strings,
            "safety_flags": strings
        },
        "required": ["cleaned_symptoms", "candidate_keywords", "categories", "safety_flags"],
        "additionalProperties": false
    })
}

/// 依對照表產生關鍵字，結果固定帶有 `fallback_used`
pub fn fallback_keywords(query: &str) -> SymptomAnalysis {
    let lowered = query.to_lowercase();
    let mut keywords: Vec<String> = Vec::new();
    let mut categories: Vec<String> = Vec::new();

    for (triggers, rule_keywords, category) in FALLBACK_RULES {
        if !triggers.iter().any(|word| lowered.contains(word)) {
            continue;
        }
        for keyword in rule_keywords.iter() {
            push_unique(&mut keywords, keyword);
        }
        push_unique(&mut categories, category);
    }

    SymptomAnalysis {
        cleaned_symptoms: Vec::new(),
        candidate_keywords: keywords,
        categories,
        safety_flags: vec![FALLBACK_FLAG.to_string()],
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

pub struct SymptomAnalyzer {
    generator: Option<Arc<dyn StructuredGenerator>>,
}

impl SymptomAnalyzer {
    /// 沒有生成器（未設定 API key）時直接使用對照表
    pub fn new(generator: Option<Arc<dyn StructuredGenerator>>) -> Self {
        Self { generator }
    }

    /// 症狀轉關鍵字。模型只呼叫一次，失敗時改用對照表並標記原因。
    pub async fn analyze(&self, query: &str) -> SymptomAnalysis {
        let Some(generator) = &self.generator else {
            tracing::debug!("No model configured, using keyword table");
            return fallback_keywords(query);
        };

        let outcome = match generator.generate(&build_request(query)).await {
            Ok(value) => parse_analysis(value),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(analysis) => {
                tracing::info!(
                    "✅ Normalized symptoms into {} keyword(s)",
                    analysis.candidate_keywords.len()
                );
                analysis
            }
            Err(e) => {
                tracing::warn!("⚠️ Symptom normalization failed, using keyword table: {}", e);
                let mut analysis = fallback_keywords(query);
                analysis.safety_flags.push(failure_flag(&e));
                analysis
            }
        }
    }

    /// 分析結果加上固定的免責聲明
    pub async fn answer(&self, query: &str) -> SymptomAnswer {
        SymptomAnswer {
            data: self.analyze(query).await,
            disclaimer: DISCLAIMER,
        }
    }
}

fn failure_flag(error: &FinderError) -> String {
    match error {
        FinderError::RateLimited { .. } => RATE_LIMITED_FLAG.to_string(),
        other => format!("{}{}", ERROR_FLAG_PREFIX, other.kind()),
    }
}

pub fn build_request(query: &str) -> GenerationRequest {
    GenerationRequest {
        parts: vec![
            ContentPart::Text(NORMALIZER_INSTRUCTION.to_string()),
            ContentPart::Text(query.trim().to_string()),
        ],
        schema_name: SCHEMA_NAME,
        schema: symptom_schema(),
        max_output_tokens: MAX_OUTPUT_TOKENS,
    }
}

/// 缺少的欄位視為空陣列
pub fn parse_analysis(value: serde_json::Value) -> Result<SymptomAnalysis> {
    serde_json::from_value(value)
        .map_err(|e| FinderError::schema("$", format!("does not match symptom schema: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 依序回傳預先設定結果的假生成器
    struct ScriptedGenerator {
        responses: Mutex<VecDeque<Result<serde_json::Value>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Result<serde_json::Value>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StructuredGenerator for ScriptedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<serde_json::Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FinderError::upstream("no scripted response left")))
        }
    }

    fn rate_limited() -> Result<serde_json::Value> {
        Err(FinderError::RateLimited {
            message: "429 Too Many Requests".to_string(),
        })
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_fallback_keywords_for_sleep_and_pain() {
        let analysis = fallback_keywords("I can't sleep and have a pounding Headache");

        assert!(analysis.cleaned_symptoms.is_empty());
        assert_eq!(
            analysis.candidate_keywords,
            strings(&[
                "melatonin",
                "sleep gummies",
                "valerian",
                "ibuprofen",
                "acetaminophen",
                "naproxen"
            ])
        );
        assert_eq!(analysis.categories, strings(&["sleep", "pain relief"]));
        assert_eq!(analysis.safety_flags, strings(&[FALLBACK_FLAG]));
    }

    #[test]
    fn test_fallback_keywords_follow_table_order() {
        // "relief" 屬於腸胃規則，排在止痛之前
        let analysis = fallback_keywords("pain relief");
        assert_eq!(analysis.categories, strings(&["stomachache", "pain relief"]));
        assert_eq!(analysis.candidate_keywords[0], "rolaids");

        let analysis = fallback_keywords("PIMPLES and hair LOSS");
        assert_eq!(analysis.categories, strings(&["acne", "hair care"]));
        assert_eq!(
            analysis.candidate_keywords,
            strings(&[
                "benzoyl peroxide",
                "salicylic acid",
                "adapalene",
                "biotin",
                "minoxidil",
                "ketoconazole shampoo"
            ])
        );
    }

    #[test]
    fn test_fallback_keywords_without_match() {
        let analysis = fallback_keywords("fever and chills");

        assert!(analysis.candidate_keywords.is_empty());
        assert!(analysis.categories.is_empty());
        assert_eq!(analysis.safety_flags, strings(&[FALLBACK_FLAG]));
    }

    #[test]
    fn test_query_validation() {
        let query = SymptomQuery {
            query: Some("  itchy eyes  ".to_string()),
        };
        assert_eq!(query.validated().unwrap(), "itchy eyes");

        for query in [None, Some(String::new()), Some("   ".to_string())] {
            let err = SymptomQuery { query }.validated().unwrap_err();
            assert!(matches!(err, FinderError::InvalidRequest { ref message } if message == "query is required"));
        }

        let long = SymptomQuery {
            query: Some("a".repeat(MAX_QUERY_CHARS + 1)),
        };
        assert!(matches!(long.validated(), Err(FinderError::InvalidRequest { .. })));
        let limit = SymptomQuery {
            query: Some("é".repeat(MAX_QUERY_CHARS)),
        };
        assert!(limit.validated().is_ok());
    }

    #[tokio::test]
    async fn test_without_generator_uses_table_only() {
        let analyzer = SymptomAnalyzer::new(None);

        let analysis = analyzer.analyze("sore throat").await;

        assert_eq!(analysis.categories, strings(&["pain relief"]));
        assert_eq!(analysis.safety_flags, strings(&[FALLBACK_FLAG]));
    }

    #[tokio::test]
    async fn test_generated_analysis_fills_missing_fields() {
        let generator = ScriptedGenerator::new(vec![Ok(json!({
            "cleaned_symptoms": ["itchy eyes", "sneezing"],
            "candidate_keywords": ["loratadine", "cetirizine"]
        }))]);
        let analyzer = SymptomAnalyzer::new(Some(generator.clone()));

        let analysis = analyzer.analyze("itchy eyes and sneezing").await;

        assert_eq!(analysis.cleaned_symptoms, strings(&["itchy eyes", "sneezing"]));
        assert_eq!(analysis.candidate_keywords, strings(&["loratadine", "cetirizine"]));
        assert!(analysis.categories.is_empty());
        assert!(analysis.safety_flags.is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_error_is_tagged_and_not_retried() {
        let generator = ScriptedGenerator::new(vec![Err(FinderError::upstream("401 Unauthorized"))]);
        let analyzer = SymptomAnalyzer::new(Some(generator.clone()));

        let analysis = analyzer.analyze("acne").await;

        assert_eq!(analysis.categories, strings(&["acne"]));
        assert_eq!(
            analysis.safety_flags,
            strings(&[FALLBACK_FLAG, "openai_error:UpstreamFailure"])
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_output_is_tagged_as_schema_violation() {
        let generator = ScriptedGenerator::new(vec![Ok(json!({ "candidate_keywords": "melatonin" }))]);
        let analyzer = SymptomAnalyzer::new(Some(generator));

        let analysis = analyzer.analyze("insomnia").await;

        assert_eq!(analysis.categories, strings(&["sleep"]));
        assert_eq!(
            analysis.safety_flags,
            strings(&[FALLBACK_FLAG, "openai_error:SchemaViolation"])
        );
    }

    #[tokio::test]
    async fn test_rate_limit_is_tagged_without_retry() {
        let generator = ScriptedGenerator::new(vec![rate_limited(), rate_limited()]);
        let analyzer = SymptomAnalyzer::new(Some(generator.clone()));

        let analysis = analyzer.analyze("upset stomach").await;

        assert_eq!(analysis.categories, strings(&["stomachache"]));
        assert_eq!(analysis.safety_flags, strings(&[FALLBACK_FLAG, RATE_LIMITED_FLAG]));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_answer_carries_disclaimer() {
        let answer = SymptomAnalyzer::new(None).answer("headache").await;

        assert_eq!(answer.disclaimer, DISCLAIMER);
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["data"]["candidate_keywords"][0], "ibuprofen");
        assert!(json["disclaimer"].as_str().unwrap().starts_with("Not medical advice."));
    }

    #[test]
    fn test_request_caps_tokens_and_sends_instruction_first() {
        let request = build_request("  dry cough ");

        assert_eq!(request.max_output_tokens, MAX_OUTPUT_TOKENS);
        assert_eq!(request.schema_name, SCHEMA_NAME);
        assert!(matches!(&request.parts[0], ContentPart::Text(text) if text.starts_with("You are a pharmacy query normalizer")));
        assert_eq!(request.parts[1], ContentPart::Text("dry cough".to_string()));
        assert_eq!(request.schema["required"].as_array().unwrap().len(), 4);
    }
}
