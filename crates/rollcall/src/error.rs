//! Unified error type for the Rollcall server.

use rollcall_attendance::AttendanceError;
use rollcall_protocol::ProtocolError;
use rollcall_session::AuthError;
use rollcall_store::StoreError;
use rollcall_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `rollcall` crate you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]` attribute
/// on each variant generates `From` impls, so `?` converts sub-crate errors
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum RollCallError {
    /// Binding, accepting, sending or receiving failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The handshake token was missing or rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The storage collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A roll-call operation was refused or failed.
    #[error(transparent)]
    Attendance(#[from] AttendanceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: RollCallError = TransportError::SendFailed(io).into();
        assert!(matches!(err, RollCallError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_auth_error() {
        let err: RollCallError = AuthError::MissingToken.into();
        assert!(matches!(err, RollCallError::Auth(_)));
        assert_eq!(err.to_string(), "token not found");
    }

    #[test]
    fn test_from_attendance_error() {
        let err: RollCallError = AttendanceError::NoActiveSession.into();
        assert!(matches!(err, RollCallError::Attendance(_)));
        assert_eq!(err.to_string(), "no active attendance session");
    }

    #[test]
    fn test_from_store_error() {
        let err: RollCallError = StoreError::NotFound("class c1".into()).into();
        assert!(matches!(err, RollCallError::Store(_)));
    }
}
