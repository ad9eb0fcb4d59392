#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, Response};
use serde_json::Value;
use tower::ServiceExt;

use knowbot_gateway::answer::DEFAULT_MAX_ANSWER_CHARS;
use knowbot_gateway::server::create_router;
use knowbot_gateway::{AnswerSynthesizer, AppState, RateLimiter};
use knowbot_knowledge::{KnowledgeEngine, KnowledgeSettings, KnowledgeStore, LocalEmbedder};

pub struct TestGateway {
    pub state: Arc<AppState>,
    pub router: Router,
}

/// Gateway over an in-memory store with local providers only.
pub async fn gateway(general_limit: usize, search_limit: usize) -> TestGateway {
    let state = local_state(general_limit, search_limit).await;
    wrap(state)
}

/// Like [`gateway`], answering CORS preflight for `origins` only.
pub async fn gateway_with_origins(search_limit: usize, origins: &[&str]) -> TestGateway {
    let state = local_state(60, search_limit)
        .await
        .with_allowed_origins(origins.iter().map(|o| o.to_string()).collect());
    wrap(state)
}

async fn local_state(general_limit: usize, search_limit: usize) -> AppState {
    let store = KnowledgeStore::open_in_memory().await.unwrap();
    let engine = KnowledgeEngine::new(KnowledgeSettings::default(), store, Arc::new(LocalEmbedder));
    AppState::new(
        engine,
        AnswerSynthesizer::local(DEFAULT_MAX_ANSWER_CHARS),
        Arc::new(RateLimiter::new(general_limit, Duration::from_secs(60))),
        Arc::new(RateLimiter::new(search_limit, Duration::from_secs(60))),
    )
}

fn wrap(state: AppState) -> TestGateway {
    let state = Arc::new(state);
    let router = create_router(Arc::clone(&state));
    TestGateway { state, router }
}

/// Send a request with arbitrary headers and no body.
pub async fn send_with_headers(
    router: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    client: &str,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn send_raw(router: &Router, uri: &str, raw: &'static str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "192.0.2.1")
        .body(Body::from(raw))
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
