use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use medicine_finder::adapters::http::{
    build_router, AppState, ASK_PATH, IDENTIFY_PATH, PROVENANCE_HEADER,
};
use medicine_finder::adapters::openai::OpenAiGenerator;
use medicine_finder::core::identification::IdentificationService;
use medicine_finder::core::symptoms::{SymptomAnalyzer, DISCLAIMER};
use medicine_finder::domain::ports::StructuredGenerator;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

/// 以指定的模型端點建立測試用的 router
fn create_test_app(endpoint: &str, api_key: Option<&str>) -> axum::Router {
    let generator = OpenAiGenerator::new(
        endpoint,
        "openai/gpt-5",
        api_key.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap();
    let generator: Arc<dyn StructuredGenerator> = Arc::new(generator);
    let service = IdentificationService::new(generator.clone());
    // 沒有 API key 時症狀分析只用對照表
    let symptoms = SymptomAnalyzer::new(api_key.map(|_| generator));
    build_router(AppState::new(Arc::new(service), Arc::new(symptoms)))
}

fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn identify_request(body: impl Into<Body>) -> Request<Body> {
    post_json(IDENTIFY_PATH, body)
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn model_output() -> Value {
    json!({
        "products": [{
            "name": "Loratadine 10mg Tablets",
            "description": "Non-drowsy antihistamine for seasonal allergies",
            "category": "Allergy Relief",
            "activeIngredients": ["Loratadine 10mg"],
            "retailers": [
                { "name": "CVS Pharmacy", "price": 12.49, "availability": "in-stock", "rating": 4.6, "shippingTime": "Same day pickup" },
                { "name": "Amazon", "price": 9.99, "availability": "low-stock" }
            ]
        }],
        "confidence": "high",
        "notes": "Generic loratadine works the same as the brand name."
    })
}

#[tokio::test]
async fn test_empty_query_without_image_is_rejected() {
    let server = MockServer::start();
    let model = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200);
    });
    let app = create_test_app(&server.base_url(), Some("test-key"));

    let response = app
        .oneshot(identify_request(json!({ "query": "" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await,
        json!({ "error": "Either query or image must be provided" })
    );
    model.assert_hits(0);
}

#[tokio::test]
async fn test_whitespace_query_is_served_from_fallback() {
    let app = create_test_app("http://127.0.0.1:9", None);

    let response = app
        .oneshot(identify_request(json!({ "query": "   ", "image": "" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[PROVENANCE_HEADER], "fallback");
    assert_eq!(read_json(response).await["products"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_body_is_internal_error() {
    let app = create_test_app("http://127.0.0.1:9", None);

    let response = app
        .oneshot(identify_request("{ this is not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_json(response).await,
        json!({ "error": "Failed to identify product" })
    );
}

#[tokio::test]
async fn test_headache_falls_back_to_sample_data_when_model_is_down() {
    let server = MockServer::start();
    let model = server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(503).body("service unavailable");
    });
    let app = create_test_app(&server.base_url(), Some("test-key"));

    let response = app
        .oneshot(identify_request(json!({ "query": "headache" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[PROVENANCE_HEADER], "fallback");

    let json = read_json(response).await;
    let products = json["products"].as_array().unwrap();
    assert_eq!(products.len(), 3);
    assert_eq!(products[0]["name"], "Ibuprofen 200mg Tablets");
    assert!(json["notes"].as_str().unwrap().contains("Demo mode"));

    // 單次嘗試，不重試
    model.assert_hits(1);
}

#[tokio::test]
async fn test_missing_api_key_serves_sample_data() {
    let app = create_test_app("http://127.0.0.1:9", None);

    let response = app
        .oneshot(identify_request(json!({ "query": "cold medicine" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[PROVENANCE_HEADER], "fallback");
    assert_eq!(read_json(response).await["confidence"], "medium");
}

#[tokio::test]
async fn test_model_output_is_returned_unchanged() {
    let server = MockServer::start();
    let model = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("authorization", "Bearer test-key")
            .body_contains("allergies");
        then.status(200).json_body(json!({
            "choices": [{
                "message": { "role": "assistant", "content": model_output().to_string() },
                "finish_reason": "stop"
            }]
        }));
    });
    let app = create_test_app(&server.base_url(), Some("test-key"));

    let response = app
        .oneshot(identify_request(
            json!({ "query": "something for allergies" }).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[PROVENANCE_HEADER], "generated");
    assert_eq!(read_json(response).await, model_output());
    model.assert();
}

#[tokio::test]
async fn test_schema_violation_falls_back() {
    let server = MockServer::start();
    let mut too_many = model_output();
    let product = too_many["products"][0].clone();
    too_many["products"] = json!([product.clone(), product.clone(), product.clone(), product.clone(), product.clone(), product]);

    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(200).json_body(json!({
            "choices": [{ "message": { "content": too_many.to_string() } }]
        }));
    });
    let app = create_test_app(&server.base_url(), Some("test-key"));

    let response = app
        .oneshot(identify_request(json!({ "query": "allergies" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[PROVENANCE_HEADER], "fallback");
    assert_eq!(read_json(response).await["products"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_image_only_request_reaches_model() {
    let server = MockServer::start();
    let model = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("data:image/png;base64,iVBORw0KGgo");
        then.status(200).json_body(json!({
            "choices": [{ "message": { "content": model_output().to_string() } }]
        }));
    });
    let app = create_test_app(&server.base_url(), Some("test-key"));

    let response = app
        .oneshot(identify_request(
            json!({ "image": "data:image/png;base64,iVBORw0KGgo" }).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    model.assert();
}

#[tokio::test]
async fn test_ask_without_api_key_uses_keyword_table() {
    let app = create_test_app("http://127.0.0.1:9", None);

    let response = app
        .oneshot(post_json(
            ASK_PATH,
            json!({ "query": "  I have acne and oily skin, what should I look for?  " }).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json(response).await,
        json!({
            "data": {
                "cleaned_symptoms": [],
                "candidate_keywords": ["benzoyl peroxide", "salicylic acid", "adapalene"],
                "categories": ["acne"],
                "safety_flags": ["fallback_used"]
            },
            "disclaimer": DISCLAIMER
        })
    );
}

#[tokio::test]
async fn test_ask_returns_model_keywords() {
    let server = MockServer::start();
    let model = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .body_contains("pharmacy query normalizer")
            .body_contains("symptom_keywords");
        then.status(200).json_body(json!({
            "choices": [{ "message": { "content": json!({
                "cleaned_symptoms": ["runny nose"],
                "candidate_keywords": ["pseudoephedrine", "saline spray"],
                "categories": ["cold"],
                "safety_flags": []
            }).to_string() } }]
        }));
    });
    let app = create_test_app(&server.base_url(), Some("test-key"));

    let response = app
        .oneshot(post_json(ASK_PATH, json!({ "query": "runny nose" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["data"]["candidate_keywords"], json!(["pseudoephedrine", "saline spray"]));
    assert_eq!(json["disclaimer"], DISCLAIMER);
    model.assert();
}

#[tokio::test]
async fn test_ask_model_failure_is_tagged() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat/completions");
        then.status(500).body("internal error");
    });
    let app = create_test_app(&server.base_url(), Some("test-key"));

    let response = app
        .oneshot(post_json(ASK_PATH, json!({ "query": "trouble sleeping" }).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = read_json(response).await;
    assert_eq!(json["data"]["categories"], json!(["sleep"]));
    assert_eq!(
        json["data"]["safety_flags"],
        json!(["fallback_used", "openai_error:UpstreamFailure"])
    );
}

#[tokio::test]
async fn test_ask_rejects_missing_or_malformed_query() {
    for body in [json!({}).to_string(), json!({ "query": "   " }).to_string(), "not json".to_string()] {
        let app = create_test_app("http://127.0.0.1:9", None);
        let response = app.oneshot(post_json(ASK_PATH, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app("http://127.0.0.1:9", None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = read_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "medicine-finder");
}
