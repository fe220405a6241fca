//! Connection identity for Rollcall.
//!
//! Every real-time connection is bound to exactly one [`Identity`]
//! (user id + role) during its handshake. This crate provides:
//!
//! 1. **The hook**: the [`Authenticator`] trait the gateway calls
//! 2. **The production verifier**: [`JwtAuthenticator`], HS256 tokens
//!    carrying `{ userId, role }`
//!
//! # How it fits in the stack
//!
//! ```text
//! Attendance layer (above)  ← authorizes events against the Identity
//!     ↕
//! Identity layer (this crate)  ← turns a bearer token into an Identity
//!     ↕
//! Protocol layer (below)  ← provides UserId, Role
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod jwt;

pub use auth::{Authenticator, Identity};
pub use error::AuthError;
pub use jwt::JwtAuthenticator;
