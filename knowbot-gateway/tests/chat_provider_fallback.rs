use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use serde_json::{Value, json};

use knowbot_gateway::answer::{DEFAULT_MAX_ANSWER_CHARS, NO_KNOWLEDGE_ANSWER};
use knowbot_gateway::providers::openai_compatible::OpenAiCompatibleClient;
use knowbot_gateway::{AnswerSynthesizer, ChatProvider, ProviderError};
use knowbot_knowledge::NO_MATCHING_KNOWLEDGE;

async fn hangs() -> axum::Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    answers().await
}

async fn broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded")
}

async fn no_choices() -> axum::Json<Value> {
    axum::Json(json!({"choices": []}))
}

async fn answers() -> axum::Json<Value> {
    axum::Json(json!({
        "choices": [{"message": {"role": "assistant", "content": "  Refunds take 14 days.  "}}]
    }))
}

/// Serve a fake chat-completions API; each behaviour lives under its own `/v1` base.
async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/hangs/v1/chat/completions", post(hangs))
        .route("/broken/v1/chat/completions", post(broken))
        .route("/empty/v1/chat/completions", post(no_choices))
        .route("/ok/v1/chat/completions", post(answers));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr, base: &str) -> OpenAiCompatibleClient {
    OpenAiCompatibleClient::new(
        format!("http://{addr}/{base}/v1"),
        "sk-test",
        "gpt-4o-mini",
        Duration::from_secs(1),
    )
    .unwrap()
}

fn synthesizer(addr: SocketAddr, base: &str) -> AnswerSynthesizer {
    AnswerSynthesizer::new(Some(Arc::new(client(addr, base))), DEFAULT_MAX_ANSWER_CHARS)
}

#[tokio::test]
async fn hung_provider_times_out() {
    let addr = spawn_upstream().await;
    let started = Instant::now();
    let err = client(addr, "hangs").complete("sys", "user").await.unwrap_err();

    assert!(
        matches!(err, ProviderError::HttpError(ref e) if e.is_timeout()),
        "{err:?}"
    );
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn non_success_status_is_an_api_error() {
    let addr = spawn_upstream().await;
    let err = client(addr, "broken").complete("sys", "user").await.unwrap_err();

    match err {
        ProviderError::ApiError { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "model overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_choices_is_no_content() {
    let addr = spawn_upstream().await;
    let err = client(addr, "empty").complete("sys", "user").await.unwrap_err();
    assert!(matches!(err, ProviderError::NoContent), "{err:?}");
}

#[tokio::test]
async fn hung_provider_degrades_to_local_template() {
    let addr = spawn_upstream().await;
    let synth = synthesizer(addr, "hangs");
    let context = "[Refunds]\nRefunds are issued within 14 days.";

    let started = Instant::now();
    let answer = synth.synthesize("refunds?", context).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(answer.starts_with("Regarding \"refunds?\""), "{answer}");
    assert!(answer.contains("Refunds are issued within 14 days."));
    assert!(answer.chars().count() <= DEFAULT_MAX_ANSWER_CHARS);
}

#[tokio::test]
async fn failing_provider_degrades_to_local_template() {
    let addr = spawn_upstream().await;

    for base in ["broken", "empty"] {
        let synth = synthesizer(addr, base);
        assert_eq!(
            synth.synthesize("refunds?", NO_MATCHING_KNOWLEDGE).await,
            NO_KNOWLEDGE_ANSWER,
            "{base}"
        );

        let answer = synth.synthesize("refunds?", &"policy ".repeat(100)).await;
        assert_eq!(answer.chars().count(), DEFAULT_MAX_ANSWER_CHARS, "{base}");
        assert!(answer.starts_with("Regarding"), "{base}");
    }
}

#[tokio::test]
async fn working_provider_answer_is_trimmed() {
    let addr = spawn_upstream().await;
    let synth = synthesizer(addr, "ok");
    assert_eq!(
        synth.synthesize("refunds?", "ctx").await,
        "Refunds take 14 days."
    );
}
