//! Integration tests for the SQLite store against an in-memory database.

use rollcall_protocol::{AttendanceStatus, ClassId, Role, UserId};
use rollcall_store::{
    AccountStore, AttendanceRecord, AttendanceStore, NewUser, RosterStore, SqliteStore,
    StoreError,
};

struct Fixture {
    store: SqliteStore,
    teacher: UserId,
    class: ClassId,
    students: Vec<UserId>,
}

fn new_user(name: &str, email: &str, role: Role) -> NewUser {
    NewUser {
        name: name.into(),
        email: email.into(),
        password_hash: format!("hash-of-{name}"),
        role,
    }
}

async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().expect("open in-memory db");
    let teacher = store
        .create_user(new_user("Tess", "tess@school.test", Role::Teacher))
        .await
        .unwrap()
        .id;
    let class = store.create_class("Maths", &teacher).await.unwrap().id;

    let mut students = Vec::new();
    for (name, email) in [("Sam", "sam@school.test"), ("Sia", "sia@school.test")] {
        let student = store
            .create_user(new_user(name, email, Role::Student))
            .await
            .unwrap()
            .id;
        store.add_student(&class, &student).await.unwrap();
        students.push(student);
    }
    Fixture {
        store,
        teacher,
        class,
        students,
    }
}

#[tokio::test]
async fn test_find_class_returns_teacher_and_roster() {
    let f = fixture().await;
    let class = f.store.find_class(&f.class).await.unwrap().expect("class exists");
    assert_eq!(class.teacher_id, f.teacher);
    assert_eq!(class.class_name, "Maths");
    assert_eq!(class.student_ids.len(), 2);
    for student in &f.students {
        assert!(class.has_student(student));
    }
}

#[tokio::test]
async fn test_find_class_unknown_is_none() {
    let f = fixture().await;
    assert!(f.store.find_class(&ClassId::from("missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_class_with_student_checks_enrollment() {
    let f = fixture().await;
    assert!(f
        .store
        .find_class_with_student(&f.class, &f.students[0])
        .await
        .unwrap()
        .is_some());
    assert!(f
        .store
        .find_class_with_student(&f.class, &f.teacher)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_list_students_of_class() {
    let f = fixture().await;
    let mut roster = f.store.list_students_of_class(&f.class).await.unwrap();
    roster.sort();
    let mut expected = f.students.clone();
    expected.sort();
    assert_eq!(roster, expected);
}

#[tokio::test]
async fn test_duplicate_email_is_conflict() {
    let f = fixture().await;
    let err = f
        .store
        .create_user(new_user("Other", "tess@school.test", Role::Teacher))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_add_student_rejects_teacher_and_duplicates() {
    let f = fixture().await;
    let err = f.store.add_student(&f.class, &f.teacher).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    let err = f.store.add_student(&f.class, &f.students[0]).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
}

#[tokio::test]
async fn test_insert_batch_skips_duplicates_and_persists() {
    let f = fixture().await;
    let records: Vec<AttendanceRecord> = f
        .students
        .iter()
        .map(|student| AttendanceRecord {
            class_id: f.class.clone(),
            student_id: student.clone(),
            status: AttendanceStatus::Present,
        })
        .collect();

    assert_eq!(f.store.insert_batch(&records).await.unwrap(), 2);
    // Same batch again: nothing new, no error.
    assert_eq!(f.store.insert_batch(&records).await.unwrap(), 0);

    let found = f
        .store
        .find_attendance(&f.class, &f.students[1])
        .await
        .unwrap()
        .expect("record persisted");
    assert_eq!(found.status, AttendanceStatus::Present);
}

#[tokio::test]
async fn test_insert_batch_empty_is_noop() {
    let f = fixture().await;
    assert_eq!(f.store.insert_batch(&[]).await.unwrap(), 0);
    assert!(f
        .store
        .find_attendance(&f.class, &f.students[0])
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_add_student_returns_updated_class() {
    let f = fixture().await;
    let newcomer = f
        .store
        .create_user(new_user("Noa", "noa@school.test", Role::Student))
        .await
        .unwrap()
        .id;
    let class = f.store.add_student(&f.class, &newcomer).await.unwrap();
    assert_eq!(class.student_ids.len(), 3);
    assert!(class.has_student(&newcomer));
}

#[tokio::test]
async fn test_find_user_and_credentials() {
    let f = fixture().await;
    let teacher = f.store.find_user(&f.teacher).await.unwrap().expect("teacher exists");
    assert_eq!(teacher.email, "tess@school.test");
    assert_eq!(teacher.role, Role::Teacher);
    assert!(f.store.find_user(&UserId::from("nobody")).await.unwrap().is_none());

    let credentials = f
        .store
        .find_credentials("tess@school.test")
        .await
        .unwrap()
        .expect("credentials exist");
    assert_eq!(credentials.user, teacher);
    assert_eq!(credentials.password_hash, "hash-of-Tess");
    assert!(f.store.find_credentials("nobody@school.test").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_students_excludes_teachers() {
    let f = fixture().await;
    let students = f.store.list_students().await.unwrap();
    let names: Vec<&str> = students.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Sam", "Sia"]);
    assert!(students.iter().all(|s| s.role == Role::Student));
}
