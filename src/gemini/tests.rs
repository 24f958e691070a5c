use super::*;

fn test_client() -> GeminiClient {
    let config = GeminiConfig {
        base_url: "http://test-host:1234/v1beta".to_string(),
        embedding_model: "text-embedding-004".to_string(),
        generation_model: "models/gemini-1.5-flash".to_string(),
        batch_size: 16,
        ..GeminiConfig::default()
    };
    GeminiClient::new(&config, "secret-key").expect("Failed to create client")
}

#[test]
fn client_configuration() {
    let client = test_client();

    assert_eq!(client.embedding_model, "models/text-embedding-004");
    assert_eq!(client.generation_model, "models/gemini-1.5-flash");
    assert_eq!(client.batch_size, 16);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.base_url.path(), "/v1beta/");
}

#[test]
fn invalid_base_url_is_config_error() {
    let config = GeminiConfig {
        base_url: "::not a url::".to_string(),
        ..GeminiConfig::default()
    };

    let result = GeminiClient::new(&config, "key");
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[test]
fn debug_output_hides_api_key() {
    let rendered = format!("{:?}", test_client());
    assert!(!rendered.contains("secret-key"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn model_urls() {
    let client = test_client();

    let url = client
        .model_url(&client.embedding_model, "batchEmbedContents")
        .expect("should build url");
    assert_eq!(
        url.as_str(),
        "http://test-host:1234/v1beta/models/text-embedding-004:batchEmbedContents"
    );

    let url = client
        .model_url(&client.generation_model, "generateContent")
        .expect("should build url");
    assert_eq!(
        url.as_str(),
        "http://test-host:1234/v1beta/models/gemini-1.5-flash:generateContent"
    );
}

#[test]
fn model_path_normalization() {
    assert_eq!(model_path("embedding-001"), "models/embedding-001");
    assert_eq!(model_path("models/embedding-001"), "models/embedding-001");
    assert_eq!(model_path(" gemini-pro "), "models/gemini-pro");
    assert_eq!(model_path("tunedModels/mine"), "tunedModels/mine");
}

#[test]
fn embed_request_wire_format() {
    let request = EmbedContentRequest {
        model: "models/embedding-001".to_string(),
        content: Content::text("hello"),
        task_type: TaskType::RetrievalQuery,
    };

    let json = serde_json::to_value(&request).expect("can serialize json");
    assert_eq!(
        json,
        serde_json::json!({
            "model": "models/embedding-001",
            "content": { "parts": [{ "text": "hello" }] },
            "taskType": "RETRIEVAL_QUERY"
        })
    );
}

#[test]
fn generate_request_wire_format() {
    let request = GenerateContentRequest {
        contents: vec![Content {
            role: Some("user"),
            ..Content::text("prompt")
        }],
    };

    let json = serde_json::to_value(&request).expect("can serialize json");
    assert_eq!(
        json,
        serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": "prompt" }] }]
        })
    );
}

#[test]
fn extract_text_joins_parts() {
    let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": "Hello, " }, { "text": "world" }] },
            "finishReason": "STOP"
        }]
    }))
    .expect("can parse json");

    assert_eq!(
        extract_text(response).expect("should extract text"),
        "Hello, world"
    );
}

#[test]
fn extract_text_reports_blocked_prompt() {
    let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
        "promptFeedback": { "blockReason": "SAFETY" }
    }))
    .expect("can parse json");

    let err = extract_text(response).expect_err("blocked prompt has no text");
    assert!(err.to_string().contains("SAFETY"));
}

#[test]
fn extract_text_rejects_empty_candidate() {
    let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
        "candidates": [{ "finishReason": "MAX_TOKENS" }]
    }))
    .expect("can parse json");

    let err = extract_text(response).expect_err("empty candidate has no text");
    assert!(err.to_string().contains("MAX_TOKENS"));
}

#[test]
fn api_error_uses_error_body() {
    let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
    let err = api_error(400, body);
    assert_eq!(
        err.to_string(),
        "Gemini API error (HTTP 400, INVALID_ARGUMENT): API key not valid."
    );

    let err = api_error(502, "<html>bad gateway</html>");
    assert_eq!(err.to_string(), "Gemini API error: HTTP 502");
}
