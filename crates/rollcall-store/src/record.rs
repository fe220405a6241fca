//! Rows as the rest of the server sees them.

use rollcall_protocol::{AttendanceStatus, ClassId, Role, UserId};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// What signup hands the store. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// A user together with the stored password hash, for login checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: UserRecord,
    pub password_hash: String,
}

/// A class with its teacher and enrolled students.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub id: ClassId,
    pub class_name: String,
    pub teacher_id: UserId,
    pub student_ids: Vec<UserId>,
}

impl ClassRecord {
    /// Returns `true` if `student_id` is on this class's roster.
    pub fn has_student(&self, student_id: &UserId) -> bool {
        self.student_ids.contains(student_id)
    }
}

/// One finalized attendance entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttendanceRecord {
    pub class_id: ClassId,
    pub student_id: UserId,
    pub status: AttendanceStatus,
}
