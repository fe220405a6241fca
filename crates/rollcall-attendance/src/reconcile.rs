//! The `DONE` transition: fill in absentees, persist, return to `Idle`.

use std::collections::HashMap;
use std::sync::Arc;

use rollcall_protocol::{
    AttendanceStatus, AttendanceSummary, ClassId, EventKind, ServerEvent, UserId,
};
use rollcall_session::Identity;
use rollcall_store::{AttendanceRecord, AttendanceStore, RosterStore};

use crate::policy::{authorize, Decision};
use crate::session::FinalizeTicket;
use crate::{AttendanceError, Publisher, SessionStore};

/// Puts a session back to `Active` if a finalize is dropped half way, for
/// example when the connection task running it is aborted.
///
/// `Drop` is synchronous, so the reset runs as a fire-and-forget task.
struct FinalizeGuard {
    sessions: Arc<SessionStore>,
    generation: u64,
    armed: bool,
}

impl FinalizeGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let sessions = Arc::clone(&self.sessions);
        let generation = self.generation;
        tokio::spawn(async move {
            sessions.abort_finalize(generation).await;
        });
    }
}

/// Completes the session map against the class roster and writes it out.
pub struct Reconciler<S> {
    sessions: Arc<SessionStore>,
    store: Arc<S>,
    publisher: Arc<dyn Publisher>,
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            store: Arc::clone(&self.store),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<S> Reconciler<S>
where
    S: RosterStore + AttendanceStore,
{
    pub fn new(
        sessions: Arc<SessionStore>,
        store: Arc<S>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            sessions,
            store,
            publisher,
        }
    }

    /// Finalizes the active session on behalf of `identity`.
    ///
    /// The session is flagged as finalizing under the lock, then the lock is
    /// released for the roster load and the batch write. The slot is emptied
    /// only once the write has succeeded; on any storage failure the session
    /// stays `Active` with its map untouched, and `DONE` may be sent again.
    /// The `DONE` event is published in the same lock acquisition that
    /// empties the slot.
    ///
    /// # Errors
    /// Authorization and `NoActiveSession` as for any teacher event,
    /// [`AttendanceError::Finalizing`] if another `DONE` is in flight, and
    /// [`AttendanceError::Persistence`] if storage fails.
    pub async fn finalize(
        &self,
        identity: &Identity,
    ) -> Result<AttendanceSummary, AttendanceError> {
        let ticket = {
            let mut slot = self.sessions.lock().await;
            match authorize(EventKind::Done, identity, slot.as_ref()) {
                Decision::Deny(err) => return Err(err),
                Decision::Allow | Decision::AllowIfEnrolled(_) => {}
            }
            let Some(session) = slot.as_mut() else {
                return Err(AttendanceError::NoActiveSession);
            };
            SessionStore::begin_finalize(session)
        };

        let mut guard = FinalizeGuard {
            sessions: Arc::clone(&self.sessions),
            generation: ticket.generation,
            armed: true,
        };
        let generation = ticket.generation;
        let class_id = ticket.class_id.clone();

        let result = self.persist(ticket).await;
        guard.disarm();

        match result {
            Ok(summary) => {
                let mut slot = self.sessions.lock().await;
                if !SessionStore::complete_finalize(&mut slot, generation) {
                    tracing::warn!(%class_id, "session replaced while finalizing");
                }
                self.publisher.publish(&ServerEvent::done(summary));
                drop(slot);
                tracing::info!(
                    %class_id,
                    present = summary.present,
                    absent = summary.absent,
                    total = summary.total,
                    "attendance session finalized"
                );
                Ok(summary)
            }
            Err(e) => {
                self.sessions.abort_finalize(generation).await;
                tracing::warn!(%class_id, error = %e, "finalize failed, session kept active");
                Err(e)
            }
        }
    }

    async fn persist(
        &self,
        ticket: FinalizeTicket,
    ) -> Result<AttendanceSummary, AttendanceError> {
        let roster = self
            .store
            .list_students_of_class(&ticket.class_id)
            .await
            .map_err(AttendanceError::Persistence)?;

        let completed = complete(&ticket.class_id, ticket.attendance, &roster);
        let records = to_records(&ticket.class_id, &completed);

        if !records.is_empty() {
            let inserted = self
                .store
                .insert_batch(&records)
                .await
                .map_err(AttendanceError::Persistence)?;
            if inserted < records.len() {
                tracing::warn!(
                    class_id = %ticket.class_id,
                    skipped = records.len() - inserted,
                    "class already has attendance on record, rows skipped"
                );
            }
        }

        Ok(AttendanceSummary::tally(completed.values()))
    }
}

/// Restricts the map to the roster and marks every unmarked student absent.
fn complete(
    class_id: &ClassId,
    mut attendance: HashMap<UserId, AttendanceStatus>,
    roster: &[UserId],
) -> HashMap<UserId, AttendanceStatus> {
    let mut completed = HashMap::with_capacity(roster.len());
    for student in roster {
        let status = attendance
            .remove(student)
            .unwrap_or(AttendanceStatus::Absent);
        completed.insert(student.clone(), status);
    }
    for stray in attendance.keys() {
        tracing::warn!(%class_id, student_id = %stray, "marked student not on roster, dropped");
    }
    completed
}

fn to_records(
    class_id: &ClassId,
    attendance: &HashMap<UserId, AttendanceStatus>,
) -> Vec<AttendanceRecord> {
    let mut records: Vec<AttendanceRecord> = attendance
        .iter()
        .map(|(student_id, status)| AttendanceRecord {
            class_id: class_id.clone(),
            student_id: student_id.clone(),
            status: *status,
        })
        .collect();
    records.sort_by(|a, b| a.student_id.cmp(&b.student_id));
    records
}
