//! Axum routes for the tree engine service.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::demo;
use crate::engine::Deletion;
use crate::error::TreeError;
use crate::store::PostgresTreeStore;
use crate::types::{Message, MessageId, Thread, ThreadId, ThreadTree};
use crate::TREE_SCHEMA_VERSION;

use super::state::ServiceState;

/// Type alias for the service state with PostgresTreeStore.
pub type AppState = ServiceState<PostgresTreeStore>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to attach a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMessageRequest {
    /// The message id to attach.
    pub id: String,
    /// Parent message id; absent means "attach under the ThreadRoot".
    pub parent_id: Option<String>,
}

/// Query selecting an optional anchor message.
#[derive(Debug, Clone, Deserialize)]
pub struct AnchorQuery {
    /// Anchor message id; absent means the ThreadRoot.
    pub message: Option<String>,
}

/// Query for bounded-depth traversal.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildrenQuery {
    /// Anchor message id; absent means the ThreadRoot.
    pub message: Option<String>,
    /// Depth bound in edges, 1..=10.
    pub depth: u32,
}

/// Query selecting the two endpoints of a pick.
#[derive(Debug, Clone, Deserialize)]
pub struct PickQuery {
    /// Path start; absent means the ThreadRoot.
    pub from: Option<String>,
    /// Path end; absent means the thread's latest message.
    pub to: Option<String>,
}

/// Outcome of a delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionResponse {
    /// Number of messages removed.
    pub removed: u32,
    /// True when the thread was left with no latest message.
    pub cleared_latest: bool,
    /// Message promoted to latest, when configured.
    pub promoted_latest: Option<String>,
}

impl From<Deletion> for DeletionResponse {
    fn from(d: Deletion) -> Self {
        Self {
            removed: d.removed,
            cleared_latest: d.cleared_latest,
            promoted_latest: d.promoted_latest.map(|id| id.to_string()),
        }
    }
}

/// Thread-level metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Message count.
    pub size: u32,
    /// Leaf count.
    pub breadth: u32,
    /// Longest root-to-leaf path in edges.
    pub depth: u32,
}

/// Out-degree of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegreeResponse {
    /// Number of direct children.
    pub degree: u32,
}

/// Response after seeding the demo tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoResponse {
    /// Thread id of the seeded tree.
    pub thread_id: String,
    /// Message count of the seeded tree.
    pub size: u32,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded".
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Wire schema version.
    pub schema_version: String,
    /// Database connectivity status.
    pub database: DatabaseHealth,
}

/// Database health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    /// Whether the last probe succeeded.
    pub connected: bool,
    /// Current pool size.
    pub pool_size: u32,
    /// Idle connections.
    pub pool_idle: usize,
    /// Maximum pool size.
    pub pool_max: u32,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always "alive".
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the service can take traffic.
    pub ready: bool,
    /// Whether the database is reachable.
    pub database: bool,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
}

impl ErrorResponse {
    fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// Map an engine error to a status code and wire error.
fn error_reply(err: TreeError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        TreeError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        TreeError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
        TreeError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        TreeError::ParentNotFound(_) => (StatusCode::NOT_FOUND, "PARENT_NOT_FOUND"),
        TreeError::NoPath { .. } => (StatusCode::NOT_FOUND, "NO_PATH"),
        TreeError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        TreeError::Connection(_) => (StatusCode::SERVICE_UNAVAILABLE, "CONNECTION_ERROR"),
    };
    tracing::warn!(code, error = %err, "request error");
    (status, Json(ErrorResponse::new(code, err.to_string())))
}

type Reply<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

// ============================================================================
// Route Handlers
// ============================================================================

/// Attach a message under a parent (or the root).
async fn add_message_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(request): Json<AddMessageRequest>,
) -> Reply<Thread> {
    let thread = ThreadId::new(thread_id);
    let parent = request.parent_id.map(MessageId::new);
    let context = state
        .engine
        .add_message(&thread, Message::new(request.id), parent.as_ref())
        .await
        .map_err(error_reply)?;
    Ok(Json(context))
}

/// Bulk-load an entire tree.
async fn put_tree_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Json(tree): Json<ThreadTree>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let thread = ThreadId::new(thread_id);
    state
        .engine
        .add_tree(&thread, &tree)
        .await
        .map_err(error_reply)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fetch the full tree.
async fn get_tree_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Reply<ThreadTree> {
    let thread = ThreadId::new(thread_id);
    let tree = state.engine.get(&thread).await.map_err(error_reply)?;
    Ok(Json(tree))
}

/// Fetch a bounded subtree.
async fn get_children_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Query(query): Query<ChildrenQuery>,
) -> Reply<ThreadTree> {
    let thread = ThreadId::new(thread_id);
    let anchor = query.message.map(MessageId::new);
    let tree = state
        .engine
        .get_children(&thread, anchor.as_ref(), query.depth)
        .await
        .map_err(error_reply)?;
    Ok(Json(tree))
}

/// Extract the unique path between two nodes.
async fn pick_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Query(query): Query<PickQuery>,
) -> Reply<Thread> {
    let thread = ThreadId::new(thread_id);
    let from = query.from.map(MessageId::new);
    let to = query.to.map(MessageId::new);
    let path = state
        .engine
        .pick(&thread, from.as_ref(), to.as_ref())
        .await
        .map_err(error_reply)?;
    Ok(Json(path))
}

/// Fetch the latest message.
async fn get_latest_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Reply<Message> {
    let thread = ThreadId::new(thread_id);
    let latest = state
        .engine
        .get_latest_message(&thread)
        .await
        .map_err(error_reply)?;
    Ok(Json(latest))
}

/// Designate the latest message.
async fn set_latest_handler(
    State(state): State<Arc<AppState>>,
    Path((thread_id, message_id)): Path<(String, String)>,
) -> Reply<Message> {
    let thread = ThreadId::new(thread_id);
    let updated = state
        .engine
        .set_latest_message(&thread, &MessageId::new(message_id))
        .await
        .map_err(error_reply)?;
    Ok(Json(updated))
}

/// Delete a message subtree.
async fn delete_message_handler(
    State(state): State<Arc<AppState>>,
    Path((thread_id, message_id)): Path<(String, String)>,
) -> Reply<DeletionResponse> {
    let thread = ThreadId::new(thread_id);
    let outcome = state
        .engine
        .delete(&thread, Some(&MessageId::new(message_id)))
        .await
        .map_err(error_reply)?;
    Ok(Json(outcome.into()))
}

/// Delete a whole thread.
async fn delete_thread_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Reply<DeletionResponse> {
    let thread = ThreadId::new(thread_id);
    let outcome = state
        .engine
        .delete(&thread, None)
        .await
        .map_err(error_reply)?;
    Ok(Json(outcome.into()))
}

/// Thread metrics: size, breadth, depth.
async fn metrics_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Reply<MetricsResponse> {
    let thread = ThreadId::new(thread_id);
    let size = state.engine.size(&thread).await.map_err(error_reply)?;
    let breadth = state.engine.breadth(&thread).await.map_err(error_reply)?;
    let depth = state.engine.depth(&thread).await.map_err(error_reply)?;
    Ok(Json(MetricsResponse {
        size,
        breadth,
        depth,
    }))
}

/// Out-degree of a node.
async fn degree_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
    Query(query): Query<AnchorQuery>,
) -> Reply<DegreeResponse> {
    let thread = ThreadId::new(thread_id);
    let anchor = query.message.map(MessageId::new);
    let degree = state
        .engine
        .degree(&thread, anchor.as_ref())
        .await
        .map_err(error_reply)?;
    Ok(Json(DegreeResponse { degree }))
}

/// Seed the canonical demo tree.
async fn demo_handler(State(state): State<Arc<AppState>>) -> Reply<DemoResponse> {
    let thread = demo::demo_thread_id();
    let tree = demo::demo_tree();
    state
        .engine
        .add_tree(&thread, &tree)
        .await
        .map_err(error_reply)?;
    Ok(Json(DemoResponse {
        thread_id: thread.to_string(),
        size: tree.size(),
    }))
}

/// Health check endpoint (detailed).
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = state.engine.store();
    let db_healthy = store.is_healthy().await;
    let pool_stats = store.pool_stats();

    let status = if db_healthy { "healthy" } else { "degraded" };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: TREE_SCHEMA_VERSION.to_string(),
        database: DatabaseHealth {
            connected: db_healthy,
            pool_size: pool_stats.size,
            pool_idle: pool_stats.idle,
            pool_max: pool_stats.max,
        },
    })
}

/// Liveness probe: the process is running, dependencies not checked.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe: 200 when the database is reachable, 503 otherwise.
async fn readiness_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let db_healthy = state.engine.store().is_healthy().await;
    if db_healthy {
        Ok(Json(ReadinessResponse {
            ready: true,
            database: true,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                database: false,
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the tree engine service.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Tree operations
        .route("/api/threads/:thread_id/tree", put(put_tree_handler))
        .route("/api/threads/:thread_id/tree", get(get_tree_handler))
        .route("/api/threads/:thread_id", delete(delete_thread_handler))
        // Message operations
        .route("/api/threads/:thread_id/messages", post(add_message_handler))
        .route(
            "/api/threads/:thread_id/messages/:message_id",
            delete(delete_message_handler),
        )
        // Traversal and path extraction
        .route("/api/threads/:thread_id/children", get(get_children_handler))
        .route("/api/threads/:thread_id/pick", get(pick_handler))
        // Latest message
        .route("/api/threads/:thread_id/latest", get(get_latest_handler))
        .route(
            "/api/threads/:thread_id/latest/:message_id",
            put(set_latest_handler),
        )
        // Metrics
        .route("/api/threads/:thread_id/metrics", get(metrics_handler))
        .route("/api/threads/:thread_id/degree", get(degree_handler))
        // Demo seed
        .route("/api/demo", post(demo_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}
