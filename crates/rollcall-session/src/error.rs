//! Error types for the identity layer.

/// Errors that can occur while establishing who a connection belongs to.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The handshake carried no usable token (absent, or given twice).
    #[error("token not found")]
    MissingToken,

    /// The token was rejected by the [`Authenticator`](crate::Authenticator):
    /// bad signature, expired, or claims that don't describe a user.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Minting a token failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}
