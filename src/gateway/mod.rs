/// HTTP API server for the assistant.
///
/// Thin transport layer: session bookkeeping and JSON DTOs around the chat
/// engine. The engine owns all orchestration; handlers only resolve the
/// session, run the turn, and persist the completed exchange.
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::agent::{ChatEngine, TurnOptions};
use crate::session::{Exchange, SessionManager};
use crate::tools::ToolCallRecord;

fn default_true() -> bool {
    true
}

fn default_threshold() -> u8 {
    70
}

/// Request body for POST /api/chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    /// The user's message.
    pub message: String,
    /// Optional session ID for conversation continuity. Unknown or expired
    /// sessions are replaced transparently.
    pub session_id: Option<String>,
    #[serde(default = "default_true")]
    pub enable_validation: bool,
    #[serde(default = "default_threshold")]
    pub validation_threshold: u8,
}

/// Response body for POST /api/chat.
#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    pub response: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<ToolCallRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponseBody {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponseBody {
    pub session_id: String,
    pub history: Vec<Exchange>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponseBody {
    pub status: String,
    pub version: String,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub catalog: bool,
    pub vector: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub sessions: Arc<SessionManager>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/session/new", post(create_session_handler))
        .route("/api/session/{id}/history", get(history_handler))
        .route("/api/session/{id}", delete(delete_session_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// POST /api/chat — run one validated turn against a session.
async fn chat_handler(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> impl IntoResponse {
    if body.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!(ErrorBody {
                error: "BadRequest".into(),
                message: "message must not be empty".into(),
            })),
        );
    }

    // Resolve the session, replacing unknown/expired ids transparently.
    let session = match &body.session_id {
        Some(id) => match state.sessions.get(id).await {
            Some(session) => session,
            None => {
                warn!("unknown or expired session {}, creating a new one", id);
                state.sessions.create().await
            }
        },
        None => state.sessions.create().await,
    };

    info!(
        "chat turn for session {} ({} prior exchanges)",
        session.id,
        session.history.len()
    );

    let opts = TurnOptions {
        enable_validation: body.enable_validation,
        validation_threshold: body.validation_threshold,
        ..TurnOptions::default()
    };
    let history = session.to_messages();
    let result = state.engine.handle_turn(&body.message, &history, &opts).await;

    state
        .sessions
        .record(&session.id, &body.message, &result.response)
        .await;

    let response = ChatResponseBody {
        response: result.response,
        session_id: session.id,
        validation_score: result.verdict.as_ref().map(|v| v.score),
        function_calls: result.tool_calls,
        timestamp: Utc::now(),
    };
    (StatusCode::OK, Json(serde_json::json!(response)))
}

/// POST /api/session/new — create a fresh conversation session.
async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions.create().await;
    info!("created session {}", session.id);
    Json(SessionResponseBody {
        session_id: session.id,
        created_at: session.created_at,
    })
}

/// GET /api/session/{id}/history
async fn history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.sessions.get(&id).await {
        Some(session) => (
            StatusCode::OK,
            Json(serde_json::json!(HistoryResponseBody {
                session_id: session.id,
                history: session.history,
            })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!(ErrorBody {
                error: "NotFound".into(),
                message: "Session not found or expired".into(),
            })),
        ),
    }
}

/// DELETE /api/session/{id}
async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    state.sessions.delete(&id).await;
    info!("deleted session {}", id);
    Json(serde_json::json!({ "message": "Session deleted", "session_id": id }))
}

/// GET /api/health — reachability of both lookup backends.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (catalog, vector) = state.engine.registry().backend_health().await;
    let status = if catalog && vector { "healthy" } else { "degraded" };
    Json(HealthResponseBody {
        status: status.to_string(),
        version: crate::VERSION.to_string(),
        database: DatabaseHealth { catalog, vector },
    })
}

/// Bind and serve the API until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API listening on {}", addr);

    // Periodic session sweep so idle sessions don't accumulate.
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired().await;
            if removed > 0 {
                info!("cleaned up {} expired sessions", removed);
            }
        }
    });

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| {
            error!("API server error: {}", e);
            e.into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::{
        PartFilter, PartRecord, RepairGuide, ScoredPart, SemanticLookup, StructuredLookup,
    };
    use crate::providers::base::{ChatRequest, LLMProvider, LLMResponse};
    use crate::tools::ToolRegistry;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        async fn chat(&self, _req: ChatRequest<'_>) -> anyhow::Result<LLMResponse> {
            Ok(LLMResponse {
                content: Some("Happy to help with your dishwasher.".into()),
                tool_calls: vec![],
                total_tokens: None,
            })
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }
    }

    struct HealthyLookup;

    #[async_trait]
    impl StructuredLookup for HealthyLookup {
        async fn part_by_id(&self, _part_id: &str) -> anyhow::Result<Option<PartRecord>> {
            Ok(None)
        }
        async fn search_parts(
            &self,
            _filter: &PartFilter,
            _limit: u32,
        ) -> anyhow::Result<Vec<PartRecord>> {
            Ok(vec![])
        }
        async fn search_by_model_number(
            &self,
            _model_number: &str,
            _limit: u32,
        ) -> anyhow::Result<Vec<PartRecord>> {
            Ok(vec![])
        }
        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl SemanticLookup for HealthyLookup {
        async fn search_parts(
            &self,
            _query: &str,
            _filter: &PartFilter,
            _limit: u32,
        ) -> anyhow::Result<Vec<ScoredPart>> {
            Ok(vec![])
        }
        async fn search_repairs(
            &self,
            _query: &str,
            _product: Option<&str>,
            _limit: u32,
        ) -> anyhow::Result<Vec<RepairGuide>> {
            Ok(vec![])
        }
        async fn ping(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn make_state() -> AppState {
        let registry = ToolRegistry::new(Arc::new(HealthyLookup), Arc::new(HealthyLookup));
        AppState {
            engine: Arc::new(ChatEngine::new(Arc::new(EchoProvider), registry)),
            sessions: Arc::new(SessionManager::default()),
        }
    }

    async fn body_json(resp: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 65536).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_backend_status() {
        let app = build_router(make_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database"]["catalog"], true);
        assert_eq!(json["version"], crate::VERSION);
    }

    #[tokio::test]
    async fn chat_creates_session_and_persists_exchange() {
        let state = make_state();
        let app = build_router(state.clone());

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"message": "My dishwasher rack is broken"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["response"], "Happy to help with your dishwasher.");
        let session_id = json["session_id"].as_str().unwrap().to_string();

        let session = state.sessions.get(&session_id).await.unwrap();
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].user, "My dishwasher rack is broken");
    }

    #[tokio::test]
    async fn chat_rejects_empty_message() {
        let app = build_router(make_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({"message": "  "}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn history_of_unknown_session_is_404() {
        let app = build_router(make_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/session/nope/history")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_create_then_history_round_trip() {
        let app = build_router(make_state());

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/session/new")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(resp).await;
        let id = json["session_id"].as_str().unwrap().to_string();

        let resp = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/api/session/{}/history", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["history"].as_array().unwrap().len(), 0);
    }
}
