use gradebot::{
    completion::{CompletionError, Grader, GradingRequest, OpenAiGrader, ResponseError},
    config::OpenAiEnv,
    types::Grade,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn grader(server: &MockServer) -> OpenAiGrader {
    let uri = server.uri();
    let env = OpenAiEnv::from_lookup(move |key| match key {
        "OPENAI_API_KEY" => Some("sk-mock-key".into()),
        "OPENAI_BASE_URL" => Some(uri.clone()),
        "OPENAI_MODEL" => Some("test-model".into()),
        _ => None,
    })
    .expect("openai env");
    OpenAiGrader::new(env)
}

fn request() -> GradingRequest<'static> {
    GradingRequest {
        prompt: "Grade student answer using provided criteria. Return json only.",
        rubric: "1) Explain how to vibe code (1 point)",
        answer: "1) You install cursor and then prompt it to get code",
    }
}

fn completion(content: Option<&str>) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test-001",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "test-model",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop",
            "logprobs": null
        }],
        "usage": {
            "prompt_tokens": 120,
            "completion_tokens": 20,
            "total_tokens": 140,
            "prompt_tokens_details": { "cached_tokens": 64 }
        }
    })
}

#[tokio::test]
async fn grade_is_parsed_from_json_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-mock-key"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "max_tokens": 8192,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": "Grade student answer using provided criteria. Return json only." },
                { "role": "system", "content": "Task: 1) Explain how to vibe code (1 point)" },
                { "role": "user", "content": "1) You install cursor and then prompt it to get code" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(Some(
            r#"{"grade": 0.5, "comment": "Mentions cursor but not copilot"}"#,
        ))))
        .expect(1)
        .mount(&server)
        .await;

    let result = grader(&server).grade(&request()).await.expect("grade");

    assert_eq!(result.grade, Grade::Points(0.5));
    assert_eq!(result.comment, "Mentions cursor but not copilot");
}

#[tokio::test]
async fn malformed_reply_is_reported_with_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion(Some(r#"{"score": 0.5}"#))),
        )
        .mount(&server)
        .await;

    let err = grader(&server).grade(&request()).await.unwrap_err();

    match err {
        CompletionError::Malformed { reason, content } => {
            assert_eq!(reason, ResponseError::MissingGrade);
            assert_eq!(content, r#"{"score": 0.5}"#);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_reply_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(None)))
        .mount(&server)
        .await;

    let err = grader(&server).grade(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Empty));
}

#[tokio::test]
async fn api_error_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error",
                "param": null,
                "code": "invalid_api_key"
            }
        })))
        .mount(&server)
        .await;

    let err = grader(&server).grade(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Api(_)));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {
                "message": "The server had an error while processing your request.",
                "type": "server_error",
                "param": null,
                "code": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = grader(&server).grade(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Api(_)));
}

#[tokio::test]
async fn rate_limit_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "message": "Rate limit reached for requests",
                "type": "requests",
                "param": null,
                "code": "rate_limit_exceeded"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = grader(&server).grade(&request()).await.unwrap_err();
    assert!(matches!(err, CompletionError::Api(_)));
}
