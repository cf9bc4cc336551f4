//! # Actix Middleware Library
//!
//! Shared middleware components for the social network's Actix services
//!
//! ## Modules
//! - `session_auth`: session-cookie authentication and the `UserId` extractor
//! - `request_tracing`: request id propagation and access logging

pub mod request_tracing;
pub mod session_auth;

pub use request_tracing::{RequestId, RequestTracing, REQUEST_ID_HEADER};
pub use session_auth::{SessionAuth, SessionAuthError, SessionResolver, UserId};
