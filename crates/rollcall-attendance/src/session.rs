//! The single-slot session store.
//!
//! At most one roll call runs across the whole service. The slot is an
//! `Option<Session>` behind one async mutex; every read-modify-write on the
//! attendance map happens inside a single lock acquisition, and no storage
//! call is ever awaited while the lock is held.
//!
//! ```text
//!   Idle ──(start)──→ Active ──(DONE begins)──→ Finalizing ──(persisted)──→ Idle
//!                       ↑                            │
//!                       └──────(persistence failed)──┘
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rollcall_protocol::{
    AttendanceStatus, AttendanceSummary, ClassId, PersonalStatus, UserId,
};
use tokio::sync::{Mutex, MutexGuard};

use crate::AttendanceError;

/// Coarse state of the store, for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session.
    Idle,
    /// A session accepts marks.
    Active,
    /// `DONE` is persisting the session.
    Finalizing,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Active => write!(f, "Active"),
            Self::Finalizing => write!(f, "Finalizing"),
        }
    }
}

/// The live roll call.
///
/// `teacher_id` and `class_id` are fixed at creation. `attendance` only
/// grows while the session is active.
#[derive(Debug)]
pub struct Session {
    class_id: ClassId,
    teacher_id: UserId,
    started_at: DateTime<Utc>,
    attendance: HashMap<UserId, AttendanceStatus>,
    generation: u64,
    finalizing: bool,
}

impl Session {
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    pub fn teacher_id(&self) -> &UserId {
        &self.teacher_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Distinguishes this session from any earlier or later one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finalizing(&self) -> bool {
        self.finalizing
    }

    pub fn attendance(&self) -> &HashMap<UserId, AttendanceStatus> {
        &self.attendance
    }

    /// Records a status. The last write for a student wins.
    pub fn mark(&mut self, student_id: UserId, status: AttendanceStatus) {
        self.attendance.insert(student_id, status);
    }

    /// Counts over the current map.
    pub fn summary(&self) -> AttendanceSummary {
        AttendanceSummary::tally(self.attendance.values())
    }

    /// A student's status, or the "not yet updated" sentinel.
    pub fn status_of(&self, student_id: &UserId) -> PersonalStatus {
        self.attendance.get(student_id).copied().into()
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            class_id: self.class_id.clone(),
            teacher_id: self.teacher_id.clone(),
            started_at: self.started_at,
            attendance: self
                .attendance
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            phase: if self.finalizing {
                SessionPhase::Finalizing
            } else {
                SessionPhase::Active
            },
        }
    }
}

/// A point-in-time copy of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub class_id: ClassId,
    pub teacher_id: UserId,
    pub started_at: DateTime<Utc>,
    pub attendance: BTreeMap<UserId, AttendanceStatus>,
    pub phase: SessionPhase,
}

/// What `DONE` carries out of the lock: enough to reconcile and persist
/// without touching the slot again until the end.
#[derive(Debug, Clone)]
pub(crate) struct FinalizeTicket {
    pub(crate) generation: u64,
    pub(crate) class_id: ClassId,
    pub(crate) attendance: HashMap<UserId, AttendanceStatus>,
}

/// Holds zero or one [`Session`].
#[derive(Debug, Default)]
pub struct SessionStore {
    slot: Mutex<Option<Session>>,
    next_generation: AtomicU64,
}

impl SessionStore {
    /// Creates an idle store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new session with an empty attendance map.
    ///
    /// # Errors
    /// [`AttendanceError::SessionAlreadyActive`] if the slot is occupied.
    pub async fn start(
        &self,
        class_id: ClassId,
        teacher_id: UserId,
    ) -> Result<SessionSnapshot, AttendanceError> {
        let mut slot = self.slot.lock().await;
        if let Some(existing) = slot.as_ref() {
            return Err(AttendanceError::SessionAlreadyActive(
                existing.class_id.clone(),
            ));
        }
        let session = Session {
            class_id,
            teacher_id,
            started_at: Utc::now(),
            attendance: HashMap::new(),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            finalizing: false,
        };
        tracing::info!(
            class_id = %session.class_id,
            teacher_id = %session.teacher_id,
            "attendance session started"
        );
        let snapshot = session.snapshot();
        *slot = Some(session);
        Ok(snapshot)
    }

    /// Returns a copy of the active session, if any.
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        self.slot.lock().await.as_ref().map(Session::snapshot)
    }

    /// Returns the current phase.
    pub async fn phase(&self) -> SessionPhase {
        match self.slot.lock().await.as_ref() {
            None => SessionPhase::Idle,
            Some(s) if s.finalizing => SessionPhase::Finalizing,
            Some(_) => SessionPhase::Active,
        }
    }

    /// Locks the slot. Callers must not await storage while holding it.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.slot.lock().await
    }

    /// Flags the session as finalizing and hands out what `DONE` needs.
    pub(crate) fn begin_finalize(session: &mut Session) -> FinalizeTicket {
        session.finalizing = true;
        FinalizeTicket {
            generation: session.generation,
            class_id: session.class_id.clone(),
            attendance: session.attendance.clone(),
        }
    }

    /// Returns a failed finalize to `Active`, leaving the map as it was.
    pub(crate) async fn abort_finalize(&self, generation: u64) {
        if let Some(session) = self.slot.lock().await.as_mut() {
            if session.generation == generation {
                session.finalizing = false;
            }
        }
    }

    /// Empties a locked slot if it still holds the finalized session.
    pub(crate) fn complete_finalize(slot: &mut Option<Session>, generation: u64) -> bool {
        if slot.as_ref().is_some_and(|s| s.generation == generation) {
            *slot = None;
            true
        } else {
            false
        }
    }
}
