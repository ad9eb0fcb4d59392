use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

use knowbot_knowledge::{FailureKind, KnowledgeError, NewEntry, RegenerationReport};

use crate::rate_limit::{ClientKey, RateLimiter};
use crate::retrieval::RetrievalResult;
use crate::state::{AppState, GatewayError};

/// Question payload for `/ask`
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Payload for replacing an entry's text
#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub title: String,
    pub content: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
struct RegenerationResponse {
    message: String,
    #[serde(flatten)]
    report: RegenerationReport,
}

/// Handler failure mapped onto an HTTP status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    RateLimited { retry_after: u64 },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message, None),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message, None),
            Self::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
                Some(retry_after),
            ),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message, None),
        };

        let mut response = (
            status,
            Json(ErrorResponse {
                error: message,
                retry_after,
            }),
        )
            .into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<KnowledgeError> for ApiError {
    fn from(err: KnowledgeError) -> Self {
        match (&err, err.kind()) {
            (KnowledgeError::UnknownEntry(_), _) => Self::NotFound("Knowledge not found".to_string()),
            (_, FailureKind::ClientInput) => Self::BadRequest(err.to_string()),
            _ => {
                error!(kind = ?err.kind(), error = %err, "knowledge request failed");
                Self::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::BadRequest("Invalid ID".to_string())
    }
}

fn admit(limiter: &RateLimiter, key: &str) -> Result<(), ApiError> {
    if limiter.allow(key) {
        Ok(())
    } else {
        warn!(client = key, "rate limit exceeded");
        Err(ApiError::RateLimited {
            retry_after: limiter.window().as_secs(),
        })
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>, bind_addr: &str) -> Result<(), GatewayError> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Create the router with all routes, mounted at `/` and `/api`.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.allowed_origins());
    let mut router = Router::new()
        .merge(routes())
        .nest("/api", routes())
        .with_state(state)
        .layer(cors);

    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Headers set on every response, preflight included.
const SECURITY_HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
    (
        "content-security-policy",
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; \
         img-src 'self' data: https:; connect-src 'self' https://api.openai.com;",
    ),
];

/// Preflight answers for the configured origins. Wildcards and unparsable
/// origins are skipped since credentials are allowed.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .map(|origin| origin.trim())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) if origin != "*" => Some(value),
            _ => {
                warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ask", post(ask_handler))
        .route(
            "/knowledge",
            get(list_entries_handler).post(create_entry_handler),
        )
        .route(
            "/knowledge/regenerate-embeddings",
            post(regenerate_embeddings_handler),
        )
        .route(
            "/knowledge/{id}",
            get(get_entry_handler)
                .put(update_entry_handler)
                .delete(delete_entry_handler),
        )
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<RetrievalResult>, ApiError> {
    let Json(request) = payload?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("Question is required".to_string()));
    }

    admit(state.search_limiter(), &client)?;

    match state.retrieval().answer(question).await {
        Ok(result) => Ok(Json(result)),
        Err(err) => {
            error!(kind = ?err.kind(), error = %err, "retrieval failed");
            Ok(Json(RetrievalResult::degraded()))
        }
    }
}

async fn list_entries_handler(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
) -> Result<impl IntoResponse, ApiError> {
    admit(state.general_limiter(), &client)?;
    Ok(Json(state.engine().list_entries().await?))
}

async fn create_entry_handler(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    payload: Result<Json<NewEntry>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    admit(state.general_limiter(), &client)?;
    let Json(entry) = payload?;
    let created = state.engine().create_entry(entry).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_entry_handler(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    admit(state.general_limiter(), &client)?;
    let Path(id) = id?;
    let entry = state
        .engine()
        .get_entry(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Knowledge not found".to_string()))?;
    Ok(Json(entry))
}

async fn update_entry_handler(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateEntryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    admit(state.general_limiter(), &client)?;
    let Path(id) = id?;
    let Json(request) = payload?;
    let updated = state
        .engine()
        .update_entry(id, &request.title, &request.content)
        .await?;
    Ok(Json(updated))
}

async fn delete_entry_handler(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    admit(state.general_limiter(), &client)?;
    let Path(id) = id?;
    state.engine().delete_entry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn regenerate_embeddings_handler(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
) -> Result<impl IntoResponse, ApiError> {
    admit(state.general_limiter(), &client)?;
    let report = state.engine().regenerate_all().await?;
    Ok(Json(RegenerationResponse {
        message: format!(
            "Embedding regeneration completed. Success: {}, Errors: {}",
            report.regenerated, report.errors
        ),
        report,
    }))
}
