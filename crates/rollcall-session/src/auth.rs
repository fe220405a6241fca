//! Authentication hook for validating who is on the other end of a
//! connection.
//!
//! The gateway doesn't know how tokens are minted. It only needs something
//! implementing [`Authenticator`]: a single async method that takes the
//! bearer token from the handshake and returns an [`Identity`] or an error.
//! Production wires in [`JwtAuthenticator`](crate::JwtAuthenticator); tests
//! use small mocks.

use rollcall_protocol::{Role, UserId};

use crate::AuthError;

/// The verified identity bound to a connection.
///
/// Established once during the handshake and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    /// Shorthand for a teacher identity.
    pub fn teacher(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role: Role::Teacher,
        }
    }

    /// Shorthand for a student identity.
    pub fn student(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role: Role::Student,
        }
    }

    /// Returns `true` if this identity carries the given role.
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// Validates a client's bearer token and returns their identity.
///
/// `Send + Sync + 'static` because a single authenticator lives in the
/// shared server state and is called from every connection task.
///
/// # Example
///
/// ```rust
/// use rollcall_session::{AuthError, Authenticator, Identity};
///
/// /// Treats the token as `role:user`. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
///         match token.split_once(':') {
///             Some(("teacher", id)) => Ok(Identity::teacher(id)),
///             Some(("student", id)) => Ok(Identity::student(id)),
///             _ => Err(AuthError::InvalidToken("expected role:user".into())),
///         }
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the caller's identity.
    ///
    /// # Returns
    /// - `Ok(Identity)`: the token is genuine; here's who they are
    /// - `Err(AuthError::InvalidToken)`: the token is forged, expired,
    ///   or malformed
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, AuthError>> + Send;
}
