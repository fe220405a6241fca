//! Storage collaborators for Rollcall.
//!
//! The live roll-call core never talks to a database directly. It asks two
//! narrow traits:
//!
//! - [`RosterStore`]: who teaches a class, who is enrolled in it
//! - [`AttendanceStore`]: batch-write finalized records, look them up later
//!
//! The HTTP routes additionally need [`AccountStore`] for signup, login and
//! class management.
//!
//! Two implementations ship with the crate: [`MemoryStore`] (tests,
//! development; rosters and attendance only) and [`SqliteStore`] (all three
//! traits, via `rusqlite`).

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod record;
mod sqlite;

use std::future::Future;
use std::sync::Arc;

use rollcall_protocol::{ClassId, UserId};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{AttendanceRecord, ClassRecord, Credentials, NewUser, UserRecord};
pub use sqlite::SqliteStore;

/// Read access to classes and their rosters.
pub trait RosterStore: Send + Sync + 'static {
    /// Looks up a class by id.
    fn find_class(
        &self,
        class_id: &ClassId,
    ) -> impl Future<Output = Result<Option<ClassRecord>, StoreError>> + Send;

    /// Returns the class only if `student_id` is enrolled in it.
    fn find_class_with_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> impl Future<Output = Result<Option<ClassRecord>, StoreError>> + Send;

    /// Lists every student enrolled in the class. Unknown classes yield an
    /// empty roster.
    fn list_students_of_class(
        &self,
        class_id: &ClassId,
    ) -> impl Future<Output = Result<Vec<UserId>, StoreError>> + Send;
}

/// Persistence for finalized attendance.
pub trait AttendanceStore: Send + Sync + 'static {
    /// Inserts all records in one batch, skipping any whose
    /// `(class_id, student_id)` already exists.
    ///
    /// Returns how many rows were actually written.
    fn insert_batch(
        &self,
        records: &[AttendanceRecord],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Looks up the persisted record of one student in one class.
    fn find_attendance(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>, StoreError>> + Send;
}

/// Users and class membership.
pub trait AccountStore: Send + Sync + 'static {
    /// Registers a user.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if the email is taken.
    fn create_user(
        &self,
        user: NewUser,
    ) -> impl Future<Output = Result<UserRecord, StoreError>> + Send;

    /// Looks up a user by id.
    fn find_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send;

    /// Looks up a user and their password hash by email.
    fn find_credentials(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Credentials>, StoreError>> + Send;

    /// Lists every registered student, ordered by name.
    fn list_students(&self) -> impl Future<Output = Result<Vec<UserRecord>, StoreError>> + Send;

    /// Creates an empty class taught by `teacher_id`.
    fn create_class(
        &self,
        class_name: &str,
        teacher_id: &UserId,
    ) -> impl Future<Output = Result<ClassRecord, StoreError>> + Send;

    /// Enrolls a registered student and returns the updated class.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if `student_id` is not a student, and
    /// [`StoreError::Conflict`] if they are already enrolled.
    fn add_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> impl Future<Output = Result<ClassRecord, StoreError>> + Send;
}

impl<T: RosterStore> RosterStore for Arc<T> {
    fn find_class(
        &self,
        class_id: &ClassId,
    ) -> impl Future<Output = Result<Option<ClassRecord>, StoreError>> + Send {
        (**self).find_class(class_id)
    }

    fn find_class_with_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> impl Future<Output = Result<Option<ClassRecord>, StoreError>> + Send {
        (**self).find_class_with_student(class_id, student_id)
    }

    fn list_students_of_class(
        &self,
        class_id: &ClassId,
    ) -> impl Future<Output = Result<Vec<UserId>, StoreError>> + Send {
        (**self).list_students_of_class(class_id)
    }
}

impl<T: AttendanceStore> AttendanceStore for Arc<T> {
    fn insert_batch(
        &self,
        records: &[AttendanceRecord],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send {
        (**self).insert_batch(records)
    }

    fn find_attendance(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> impl Future<Output = Result<Option<AttendanceRecord>, StoreError>> + Send {
        (**self).find_attendance(class_id, student_id)
    }
}

impl<T: AccountStore> AccountStore for Arc<T> {
    fn create_user(
        &self,
        user: NewUser,
    ) -> impl Future<Output = Result<UserRecord, StoreError>> + Send {
        (**self).create_user(user)
    }

    fn find_user(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<UserRecord>, StoreError>> + Send {
        (**self).find_user(user_id)
    }

    fn find_credentials(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Credentials>, StoreError>> + Send {
        (**self).find_credentials(email)
    }

    fn list_students(&self) -> impl Future<Output = Result<Vec<UserRecord>, StoreError>> + Send {
        (**self).list_students()
    }

    fn create_class(
        &self,
        class_name: &str,
        teacher_id: &UserId,
    ) -> impl Future<Output = Result<ClassRecord, StoreError>> + Send {
        (**self).create_class(class_name, teacher_id)
    }

    fn add_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> impl Future<Output = Result<ClassRecord, StoreError>> + Send {
        (**self).add_student(class_id, student_id)
    }
}
