//! Who may send which event, and when.
//!
//! Checks run in a fixed order: role, then an active session, then
//! ownership. Enrollment needs the roster, which is a storage call, so the
//! policy only says *which* class to check and leaves the lookup to the
//! router, outside the session lock.

use rollcall_protocol::{ClassId, EventKind, Role};
use rollcall_session::Identity;

use crate::session::Session;
use crate::{AttendanceError, Denial};

/// Outcome of the in-memory checks for one event.
#[derive(Debug)]
pub(crate) enum Decision {
    Allow,
    /// Allowed once the caller is confirmed on this class's roster.
    AllowIfEnrolled(ClassId),
    Deny(AttendanceError),
}

fn required_role(kind: EventKind) -> Role {
    match kind {
        EventKind::MyAttendance => Role::Student,
        EventKind::AttendanceMarked | EventKind::TodaySummary | EventKind::Done => {
            Role::Teacher
        }
    }
}

pub(crate) fn authorize(
    kind: EventKind,
    identity: &Identity,
    session: Option<&Session>,
) -> Decision {
    let role = required_role(kind);
    if !identity.has_role(role) {
        let denial = match role {
            Role::Teacher => Denial::TeacherOnly,
            Role::Student => Denial::StudentOnly,
        };
        return Decision::Deny(AttendanceError::Authorization(denial));
    }

    let Some(session) = session else {
        return Decision::Deny(AttendanceError::NoActiveSession);
    };

    match kind {
        EventKind::MyAttendance => Decision::AllowIfEnrolled(session.class_id().clone()),
        _ if session.teacher_id() != &identity.user_id => {
            Decision::Deny(AttendanceError::Authorization(Denial::NotSessionTeacher))
        }
        EventKind::AttendanceMarked | EventKind::Done if session.is_finalizing() => {
            Decision::Deny(AttendanceError::Finalizing)
        }
        _ => Decision::Allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionStore;
    use rollcall_protocol::UserId;

    async fn active_store() -> SessionStore {
        let store = SessionStore::new();
        store
            .start(ClassId::from("c1"), UserId::from("t1"))
            .await
            .unwrap();
        store
    }

    fn denial(decision: Decision) -> Option<Denial> {
        match decision {
            Decision::Deny(AttendanceError::Authorization(d)) => Some(d),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_student_cannot_send_teacher_events() {
        let store = active_store().await;
        let slot = store.lock().await;
        let student = Identity::student("s1");
        for kind in [EventKind::AttendanceMarked, EventKind::TodaySummary, EventKind::Done] {
            assert_eq!(
                denial(authorize(kind, &student, slot.as_ref())),
                Some(Denial::TeacherOnly)
            );
        }
    }

    #[tokio::test]
    async fn test_teacher_cannot_ask_my_attendance() {
        let store = active_store().await;
        let slot = store.lock().await;
        assert_eq!(
            denial(authorize(EventKind::MyAttendance, &Identity::teacher("t1"), slot.as_ref())),
            Some(Denial::StudentOnly)
        );
    }

    #[tokio::test]
    async fn test_other_teacher_is_not_session_owner() {
        let store = active_store().await;
        let slot = store.lock().await;
        assert_eq!(
            denial(authorize(EventKind::TodaySummary, &Identity::teacher("t2"), slot.as_ref())),
            Some(Denial::NotSessionTeacher)
        );
    }

    #[test]
    fn test_idle_is_no_active_session() {
        let decision = authorize(EventKind::Done, &Identity::teacher("t1"), None);
        assert!(matches!(decision, Decision::Deny(AttendanceError::NoActiveSession)));
    }

    #[test]
    fn test_role_is_checked_before_session() {
        let decision = authorize(EventKind::Done, &Identity::student("s1"), None);
        assert_eq!(denial(decision), Some(Denial::TeacherOnly));
    }

    #[tokio::test]
    async fn test_student_needs_enrollment_check() {
        let store = active_store().await;
        let slot = store.lock().await;
        let decision = authorize(EventKind::MyAttendance, &Identity::student("s1"), slot.as_ref());
        assert!(matches!(decision, Decision::AllowIfEnrolled(c) if c == ClassId::from("c1")));
    }

    #[tokio::test]
    async fn test_finalizing_blocks_marks_but_not_summary() {
        let store = active_store().await;
        let mut slot = store.lock().await;
        SessionStore::begin_finalize(slot.as_mut().unwrap());
        let teacher = Identity::teacher("t1");

        assert!(matches!(
            authorize(EventKind::AttendanceMarked, &teacher, slot.as_ref()),
            Decision::Deny(AttendanceError::Finalizing)
        ));
        assert!(matches!(
            authorize(EventKind::Done, &teacher, slot.as_ref()),
            Decision::Deny(AttendanceError::Finalizing)
        ));
        assert!(matches!(
            authorize(EventKind::TodaySummary, &teacher, slot.as_ref()),
            Decision::Allow
        ));
    }
}
