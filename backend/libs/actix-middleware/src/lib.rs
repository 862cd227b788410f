//! # Actix Middleware Library
//!
//! Middleware shared by the chat backend's HTTP surface.
//!
//! ## Modules
//! - `jwt_auth`: bearer token authentication

pub mod jwt_auth;

pub use jwt_auth::{JwtAuthMiddleware, UserId};
