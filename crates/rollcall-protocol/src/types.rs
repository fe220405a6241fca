//! Core protocol types for Rollcall's wire format.
//!
//! Every frame on the wire is a JSON object with a string `event`
//! discriminator and a `data` payload:
//!
//! ```text
//! { "event": "ATTENDANCE_MARKED", "data": { "studentId": "s1", "status": "present" } }
//! ```
//!
//! Inbound frames are decoded in two steps: first into an [`InboundFrame`]
//! (any tag accepted), then into a [`ClientEvent`]. That split is what lets
//! the server ignore unknown tags silently while still rejecting a known
//! tag whose payload is broken.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a user (teacher or student).
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire, so
/// `UserId("s1")` is `"s1"`, not `{"0":"s1"}`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identifier of a class.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClassId(pub String);

impl ClassId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// The role carried in a user's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl Role {
    /// Returns the lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Attendance values
// ---------------------------------------------------------------------------

/// A recorded attendance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    /// Returns the lowercase wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

/// What a student sees when asking for their own status mid-session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonalStatus {
    #[serde(rename = "present")]
    Present,
    #[serde(rename = "absent")]
    Absent,
    /// The teacher hasn't marked this student yet.
    #[serde(rename = "not yet updated")]
    NotYetUpdated,
}

impl From<Option<AttendanceStatus>> for PersonalStatus {
    fn from(value: Option<AttendanceStatus>) -> Self {
        match value {
            Some(AttendanceStatus::Present) => Self::Present,
            Some(AttendanceStatus::Absent) => Self::Absent,
            None => Self::NotYetUpdated,
        }
    }
}

/// Present/absent/total counts over an attendance map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub total: usize,
}

impl AttendanceSummary {
    /// Counts the statuses yielded by `statuses`.
    pub fn tally<'a>(
        statuses: impl IntoIterator<Item = &'a AttendanceStatus>,
    ) -> Self {
        statuses.into_iter().fold(Self::default(), |mut acc, status| {
            match status {
                AttendanceStatus::Present => acc.present += 1,
                AttendanceStatus::Absent => acc.absent += 1,
            }
            acc.total += 1;
            acc
        })
    }
}

// ---------------------------------------------------------------------------
// Inbound: client → server
// ---------------------------------------------------------------------------

/// A raw inbound frame: any `event` tag, any `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// The kinds of event a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AttendanceMarked,
    TodaySummary,
    MyAttendance,
    Done,
}

impl EventKind {
    /// Looks up a wire tag. Unknown tags return `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ATTENDANCE_MARKED" => Some(Self::AttendanceMarked),
            "TODAY_SUMMARY" => Some(Self::TodaySummary),
            "MY_ATTENDANCE" => Some(Self::MyAttendance),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    /// Returns the wire tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::AttendanceMarked => "ATTENDANCE_MARKED",
            Self::TodaySummary => "TODAY_SUMMARY",
            Self::MyAttendance => "MY_ATTENDANCE",
            Self::Done => "DONE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A decoded, typed client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Teacher marks one student.
    AttendanceMarked {
        student_id: UserId,
        status: AttendanceStatus,
    },
    /// Teacher asks for the running counts.
    TodaySummary,
    /// Student asks for their own status.
    MyAttendance,
    /// Teacher closes the roll call.
    Done,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkPayload {
    student_id: UserId,
    status: AttendanceStatus,
}

impl ClientEvent {
    /// Types an inbound frame.
    ///
    /// Returns `Ok(None)` for a tag this server doesn't know; those frames
    /// are meant to be dropped without a reply. The payload of events that
    /// carry none is not inspected.
    pub fn from_frame(
        frame: InboundFrame,
    ) -> Result<Option<Self>, crate::ProtocolError> {
        let Some(kind) = EventKind::from_tag(&frame.event) else {
            return Ok(None);
        };
        let event = match kind {
            EventKind::AttendanceMarked => {
                let payload: MarkPayload = serde_json::from_value(frame.data)
                    .map_err(|e| {
                        crate::ProtocolError::InvalidPayload(
                            kind.tag(),
                            e.to_string(),
                        )
                    })?;
                Self::AttendanceMarked {
                    student_id: payload.student_id,
                    status: payload.status,
                }
            }
            EventKind::TodaySummary => Self::TodaySummary,
            EventKind::MyAttendance => Self::MyAttendance,
            EventKind::Done => Self::Done,
        };
        Ok(Some(event))
    }

    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::AttendanceMarked { .. } => EventKind::AttendanceMarked,
            Self::TodaySummary => EventKind::TodaySummary,
            Self::MyAttendance => EventKind::MyAttendance,
            Self::Done => EventKind::Done,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound: server → client
// ---------------------------------------------------------------------------

/// Message sent with the final `DONE` broadcast.
pub const PERSISTED_MESSAGE: &str = "attendance persisted";

/// Events the server sends.
///
/// `#[serde(tag = "event", content = "data")]` produces the adjacently
/// tagged shape clients expect, and `rename_all_fields` turns
/// `student_id` into `studentId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Broadcast: a student was marked.
    AttendanceMarked {
        student_id: UserId,
        status: AttendanceStatus,
    },

    /// Broadcast: running counts.
    TodaySummary(AttendanceSummary),

    /// Unicast: the asking student's status.
    MyAttendance { status: PersonalStatus },

    /// Broadcast: the session was finalized and persisted.
    Done {
        message: String,
        present: usize,
        absent: usize,
        total: usize,
    },

    /// Unicast: the request was rejected.
    Error { message: String },
}

impl ServerEvent {
    /// Builds an `ERROR` event.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Builds the `DONE` event for a final summary.
    pub fn done(summary: AttendanceSummary) -> Self {
        Self::Done {
            message: PERSISTED_MESSAGE.to_string(),
            present: summary.present,
            absent: summary.absent,
            total: summary.total,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
