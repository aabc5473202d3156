//! Tree Engine REST Service
//!
//! Exposes the tree engine as a REST API over the PostgreSQL store.
//!
//! ## Endpoints
//!
//! - `PUT /api/threads/:thread_id/tree` - Bulk-load a tree
//! - `GET /api/threads/:thread_id/tree` - Fetch the full tree
//! - `DELETE /api/threads/:thread_id` - Delete a whole thread
//! - `POST /api/threads/:thread_id/messages` - Attach a message
//! - `DELETE /api/threads/:thread_id/messages/:message_id` - Delete a subtree
//! - `GET /api/threads/:thread_id/children?message=&depth=` - Bounded subtree
//! - `GET /api/threads/:thread_id/pick?from=&to=` - Unique path between nodes
//! - `GET /api/threads/:thread_id/latest` - Current latest message
//! - `PUT /api/threads/:thread_id/latest/:message_id` - Designate latest
//! - `GET /api/threads/:thread_id/metrics` - Size, breadth, depth
//! - `GET /api/threads/:thread_id/degree?message=` - Out-degree of a node
//! - `POST /api/demo` - Seed the canonical demo tree
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod routes;
pub mod state;

pub use routes::{create_router, AppState};
pub use state::ServiceState;
