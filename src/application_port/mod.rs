mod api_error;
mod auth_service;
mod client_config;
mod session_events;

pub use api_error::*;
pub use auth_service::*;
pub use client_config::*;
pub use session_events::*;
