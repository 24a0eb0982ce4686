//! Web server module
//!
//! Thin HTTP surface over the orchestrator.

mod handlers;
mod limiter;
pub mod pii;
mod routes;
mod state;

pub use limiter::InboundLimiter;
pub use routes::create_router;
pub use state::AppState;
