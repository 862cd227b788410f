//! Credential primitives shared by the chat backend.
//!
//! Only bearer-token verification lives here; issuing tokens for real users
//! belongs to the identity provider.

pub mod jwt;

pub use jwt::{Claims, JwtError, JwtKeys};
