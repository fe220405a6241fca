//! Error types for the attendance layer.

use std::fmt;

use rollcall_protocol::{ClassId, ProtocolError};
use rollcall_store::StoreError;

/// Why an authenticated caller was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// A student sent a teacher-only event.
    TeacherOnly,
    /// A teacher sent a student-only event.
    StudentOnly,
    /// A teacher other than the one running the session.
    NotSessionTeacher,
    /// A student outside the class under roll call.
    NotEnrolled,
    /// A non-teacher tried to open a session.
    TeacherAccessRequired,
    /// A teacher tried to open a session for someone else's class.
    NotClassTeacher,
}

impl Denial {
    /// The text shown to the client in the `ERROR` event.
    pub fn message(&self) -> &'static str {
        match self {
            Self::TeacherOnly => "forbidden, teacher event only",
            Self::StudentOnly => "forbidden, student event only",
            Self::NotSessionTeacher => "forbidden, not the session teacher",
            Self::NotEnrolled => "not enrolled in this class",
            Self::TeacherAccessRequired => "forbidden, teacher access required",
            Self::NotClassTeacher => "forbidden, not class teacher",
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Errors produced while handling roll-call events.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// Wrong role, not the session owner, or not enrolled.
    #[error("{0}")]
    Authorization(Denial),

    /// The event needs an active session and there is none.
    #[error("no active attendance session")]
    NoActiveSession,

    /// A session is already running; only one may exist at a time.
    #[error("an attendance session is already active for class {0}")]
    SessionAlreadyActive(ClassId),

    /// `DONE` is in flight; marks and a second `DONE` must wait.
    #[error("attendance is being finalized")]
    Finalizing,

    /// The frame named a known event with a broken payload.
    #[error(transparent)]
    InvalidPayload(#[from] ProtocolError),

    /// A roster lookup failed before any state was touched.
    #[error("roster lookup failed: {0}")]
    Storage(#[source] StoreError),

    /// Loading the roster or writing records failed during `DONE`.
    /// The session is left active and `DONE` may be retried.
    #[error("failed to persist attendance: {0}")]
    Persistence(#[source] StoreError),
}

impl AttendanceError {
    /// Returns `true` if the connection must be closed after the `ERROR`
    /// reply.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authorization(_) | Self::NoActiveSession)
    }

    /// The text placed in `ERROR.data.message`.
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}
