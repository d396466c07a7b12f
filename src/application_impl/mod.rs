mod auth_client;
mod credential_store;
mod csrf_cache;
mod refresh_coordinator;
mod refresh_scheduler;
mod request_pipeline;
mod response;
mod session_context;
mod session_terminator;

pub use auth_client::*;
pub use credential_store::*;
pub use csrf_cache::*;
pub use refresh_coordinator::*;
pub use refresh_scheduler::*;
pub use request_pipeline::*;
pub use session_context::*;
pub use session_terminator::*;
