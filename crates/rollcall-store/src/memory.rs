//! In-process store for tests and development.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

use rollcall_protocol::{ClassId, UserId};

use crate::{
    AttendanceRecord, AttendanceStore, ClassRecord, RosterStore, StoreError,
};

#[derive(Default)]
struct Inner {
    classes: HashMap<ClassId, ClassRecord>,
    attendance: BTreeMap<(ClassId, UserId), AttendanceRecord>,
}

/// A [`RosterStore`] + [`AttendanceStore`] kept entirely in memory.
///
/// Attendance is keyed by `(class_id, student_id)`, mirroring the unique
/// constraint of the SQLite schema.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds (or replaces) a class taught by `teacher_id` with no students.
    pub fn add_class(
        &self,
        class_id: impl Into<String>,
        class_name: impl Into<String>,
        teacher_id: impl Into<String>,
    ) -> ClassId {
        let id = ClassId(class_id.into());
        let record = ClassRecord {
            id: id.clone(),
            class_name: class_name.into(),
            teacher_id: UserId(teacher_id.into()),
            student_ids: Vec::new(),
        };
        self.lock().classes.insert(id.clone(), record);
        id
    }

    /// Enrolls a student. Enrolling twice is a conflict.
    pub fn enroll(
        &self,
        class_id: &ClassId,
        student_id: impl Into<String>,
    ) -> Result<(), StoreError> {
        let student_id = UserId(student_id.into());
        let mut inner = self.lock();
        let class = inner
            .classes
            .get_mut(class_id)
            .ok_or_else(|| StoreError::NotFound(format!("class {class_id}")))?;
        if class.has_student(&student_id) {
            return Err(StoreError::Conflict(format!(
                "student {student_id} already in class {class_id}"
            )));
        }
        class.student_ids.push(student_id);
        Ok(())
    }

    /// Returns every persisted attendance record, ordered by class then
    /// student.
    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.lock().attendance.values().cloned().collect()
    }
}

impl RosterStore for MemoryStore {
    async fn find_class(
        &self,
        class_id: &ClassId,
    ) -> Result<Option<ClassRecord>, StoreError> {
        Ok(self.lock().classes.get(class_id).cloned())
    }

    async fn find_class_with_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<Option<ClassRecord>, StoreError> {
        Ok(self
            .lock()
            .classes
            .get(class_id)
            .filter(|class| class.has_student(student_id))
            .cloned())
    }

    async fn list_students_of_class(
        &self,
        class_id: &ClassId,
    ) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .lock()
            .classes
            .get(class_id)
            .map(|class| class.student_ids.clone())
            .unwrap_or_default())
    }
}

impl AttendanceStore for MemoryStore {
    async fn insert_batch(
        &self,
        records: &[AttendanceRecord],
    ) -> Result<usize, StoreError> {
        let mut inner = self.lock();
        let mut inserted = 0;
        for record in records {
            let key = (record.class_id.clone(), record.student_id.clone());
            if let std::collections::btree_map::Entry::Vacant(slot) =
                inner.attendance.entry(key)
            {
                slot.insert(record.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn find_attendance(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self
            .lock()
            .attendance
            .get(&(class_id.clone(), student_id.clone()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_protocol::AttendanceStatus;

    fn record(class: &str, student: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            class_id: ClassId::from(class),
            student_id: UserId::from(student),
            status,
        }
    }

    #[tokio::test]
    async fn test_roster_lookups() {
        let store = MemoryStore::new();
        let class = store.add_class("c1", "Maths", "t1");
        store.enroll(&class, "s1").unwrap();

        let found = store.find_class(&class).await.unwrap().unwrap();
        assert_eq!(found.teacher_id, UserId::from("t1"));
        assert!(store
            .find_class_with_student(&class, &UserId::from("s1"))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_class_with_student(&class, &UserId::from("s2"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            store.list_students_of_class(&class).await.unwrap(),
            vec![UserId::from("s1")]
        );
    }

    #[tokio::test]
    async fn test_unknown_class_has_empty_roster() {
        let store = MemoryStore::new();
        let roster = store
            .list_students_of_class(&ClassId::from("nope"))
            .await
            .unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn test_enroll_twice_conflicts() {
        let store = MemoryStore::new();
        let class = store.add_class("c1", "Maths", "t1");
        store.enroll(&class, "s1").unwrap();
        assert!(matches!(store.enroll(&class, "s1"), Err(StoreError::Conflict(_))));
        assert!(matches!(
            store.enroll(&ClassId::from("c9"), "s1"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_batch_skips_duplicates() {
        let store = MemoryStore::new();
        let first = [
            record("c1", "s1", AttendanceStatus::Present),
            record("c1", "s2", AttendanceStatus::Absent),
        ];
        assert_eq!(store.insert_batch(&first).await.unwrap(), 2);

        // Re-inserting keeps the original rows untouched.
        let second = [
            record("c1", "s1", AttendanceStatus::Absent),
            record("c1", "s3", AttendanceStatus::Present),
        ];
        assert_eq!(store.insert_batch(&second).await.unwrap(), 1);

        let s1 = store
            .find_attendance(&ClassId::from("c1"), &UserId::from("s1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(s1.status, AttendanceStatus::Present);
        assert_eq!(store.records().len(), 3);
    }
}
