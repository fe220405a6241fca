//! Event routing for authenticated connections.
//!
//! The router turns one [`ClientEvent`] into an [`Outcome`]. Events for
//! every connection go to the [`Publisher`] before the session lock is
//! released; replies for the caller come back in the outcome. It never does
//! I/O on connections itself.

use std::sync::Arc;

use rollcall_protocol::{ClientEvent, EventKind, InboundFrame, ServerEvent};
use rollcall_session::Identity;
use rollcall_store::{AttendanceStore, RosterStore};

use crate::policy::{authorize, Decision};
use crate::{AttendanceError, Denial, Publisher, Reconciler, SessionStore};

/// What the caller's connection should do with a routed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Already handed to the [`Publisher`] for every open connection,
    /// the caller included.
    Published(ServerEvent),
    /// Send to the calling connection only.
    Reply(ServerEvent),
    /// Unknown event tag; drop without a reply.
    Ignored,
}

/// Dispatches client events against the shared session store.
pub struct EventRouter<S> {
    sessions: Arc<SessionStore>,
    store: Arc<S>,
    reconciler: Reconciler<S>,
    publisher: Arc<dyn Publisher>,
}

impl<S> Clone for EventRouter<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            store: Arc::clone(&self.store),
            reconciler: self.reconciler.clone(),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<S> EventRouter<S>
where
    S: RosterStore + AttendanceStore,
{
    pub fn new(
        sessions: Arc<SessionStore>,
        store: Arc<S>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let reconciler = Reconciler::new(
            Arc::clone(&sessions),
            Arc::clone(&store),
            Arc::clone(&publisher),
        );
        Self {
            sessions,
            store,
            reconciler,
            publisher,
        }
    }

    /// Returns the session store this router works on.
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Types a raw frame and routes it.
    ///
    /// Unknown tags come back as [`Outcome::Ignored`]; a known tag with a
    /// broken payload is [`AttendanceError::InvalidPayload`].
    pub async fn route_frame(
        &self,
        identity: &Identity,
        frame: InboundFrame,
    ) -> Result<Outcome, AttendanceError> {
        let tag = frame.event.clone();
        match ClientEvent::from_frame(frame)? {
            Some(event) => self.route(identity, event).await,
            None => {
                tracing::debug!(user_id = %identity.user_id, event = %tag, "unknown event ignored");
                Ok(Outcome::Ignored)
            }
        }
    }

    /// Routes one typed event.
    pub async fn route(
        &self,
        identity: &Identity,
        event: ClientEvent,
    ) -> Result<Outcome, AttendanceError> {
        let kind = event.kind();
        tracing::debug!(user_id = %identity.user_id, event = %kind, "routing event");
        match event {
            ClientEvent::AttendanceMarked { student_id, status } => {
                let mut slot = self.sessions.lock().await;
                allowed(authorize(kind, identity, slot.as_ref()))?;
                let session = slot.as_mut().ok_or(AttendanceError::NoActiveSession)?;
                session.mark(student_id.clone(), status);
                let event = ServerEvent::AttendanceMarked { student_id, status };
                self.publisher.publish(&event);
                Ok(Outcome::Published(event))
            }

            ClientEvent::TodaySummary => {
                let slot = self.sessions.lock().await;
                allowed(authorize(kind, identity, slot.as_ref()))?;
                let session = slot.as_ref().ok_or(AttendanceError::NoActiveSession)?;
                let event = ServerEvent::TodaySummary(session.summary());
                self.publisher.publish(&event);
                Ok(Outcome::Published(event))
            }

            ClientEvent::MyAttendance => self.my_attendance(identity).await,

            ClientEvent::Done => {
                let summary = self.reconciler.finalize(identity).await?;
                Ok(Outcome::Published(ServerEvent::done(summary)))
            }
        }
    }

    /// Enrollment is checked against the roster with the lock released, so
    /// the session is looked up a second time afterwards. If a different
    /// session was installed in between, the caller is checked again.
    async fn my_attendance(&self, identity: &Identity) -> Result<Outcome, AttendanceError> {
        loop {
            let (class_id, generation) = {
                let slot = self.sessions.lock().await;
                let decision = authorize(EventKind::MyAttendance, identity, slot.as_ref());
                let class_id = match decision {
                    Decision::Deny(err) => return Err(err),
                    Decision::AllowIfEnrolled(class_id) => Some(class_id),
                    Decision::Allow => None,
                };
                let session = slot.as_ref().ok_or(AttendanceError::NoActiveSession)?;
                (
                    class_id.unwrap_or_else(|| session.class_id().clone()),
                    session.generation(),
                )
            };

            let enrolled = self
                .store
                .find_class_with_student(&class_id, &identity.user_id)
                .await
                .map_err(AttendanceError::Storage)?
                .is_some();
            if !enrolled {
                tracing::debug!(user_id = %identity.user_id, %class_id, "student not enrolled");
                return Err(AttendanceError::Authorization(Denial::NotEnrolled));
            }

            let slot = self.sessions.lock().await;
            let session = slot.as_ref().ok_or(AttendanceError::NoActiveSession)?;
            if session.generation() == generation {
                return Ok(Outcome::Reply(ServerEvent::MyAttendance {
                    status: session.status_of(&identity.user_id),
                }));
            }
        }
    }
}

fn allowed(decision: Decision) -> Result<(), AttendanceError> {
    match decision {
        Decision::Deny(err) => Err(err),
        Decision::Allow | Decision::AllowIfEnrolled(_) => Ok(()),
    }
}
