//! Out-of-band session control: opening a roll call.
//!
//! Starting a session is not a real-time event. It comes from whatever sits
//! next to the gateway (an HTTP route, an admin tool, a test), so it gets
//! its own handle instead of going through [`EventRouter`](crate::EventRouter).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rollcall_protocol::{ClassId, Role};
use rollcall_session::Identity;
use rollcall_store::RosterStore;
use serde::Serialize;

use crate::{AttendanceError, Denial, SessionSnapshot, SessionStore};

/// Returned by [`SessionControl::start_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub class_id: ClassId,
    pub started_at: DateTime<Utc>,
}

/// Opens sessions and reports on the active one.
pub struct SessionControl<S> {
    sessions: Arc<SessionStore>,
    store: Arc<S>,
}

impl<S> Clone for SessionControl<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RosterStore> SessionControl<S> {
    pub fn new(sessions: Arc<SessionStore>, store: Arc<S>) -> Self {
        Self { sessions, store }
    }

    /// Moves the service from `Idle` to `Active` for `class_id`.
    ///
    /// # Errors
    /// - [`Denial::TeacherAccessRequired`] if the caller is not a teacher
    /// - [`Denial::NotClassTeacher`] if the class is unknown or taught by
    ///   someone else
    /// - [`AttendanceError::SessionAlreadyActive`] if a roll call is running
    /// - [`AttendanceError::Storage`] if the class lookup fails
    pub async fn start_session(
        &self,
        identity: &Identity,
        class_id: ClassId,
    ) -> Result<SessionStarted, AttendanceError> {
        if !identity.has_role(Role::Teacher) {
            return Err(AttendanceError::Authorization(Denial::TeacherAccessRequired));
        }

        let class = self
            .store
            .find_class(&class_id)
            .await
            .map_err(AttendanceError::Storage)?;
        match class {
            Some(class) if class.teacher_id == identity.user_id => {}
            _ => return Err(AttendanceError::Authorization(Denial::NotClassTeacher)),
        }

        let snapshot = self
            .sessions
            .start(class_id, identity.user_id.clone())
            .await?;
        Ok(SessionStarted {
            class_id: snapshot.class_id,
            started_at: snapshot.started_at,
        })
    }

    /// A copy of the active session, or `None` while idle.
    pub async fn active_session(&self) -> Option<SessionSnapshot> {
        self.sessions.snapshot().await
    }
}
