//! SQLite-backed store.
//!
//! A single connection guarded by a mutex; every call runs on Tokio's
//! blocking pool so the async event path never waits on disk I/O directly.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rollcall_protocol::{AttendanceStatus, ClassId, Role, UserId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::{
    AccountStore, AttendanceRecord, AttendanceStore, ClassRecord, Credentials,
    NewUser, RosterStore, StoreError, UserRecord,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('teacher', 'student'))
    );
    CREATE TABLE IF NOT EXISTS classes (
        id TEXT PRIMARY KEY,
        class_name TEXT NOT NULL,
        teacher_id TEXT NOT NULL REFERENCES users(id)
    );
    CREATE TABLE IF NOT EXISTS class_students (
        class_id TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
        student_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        PRIMARY KEY (class_id, student_id)
    );
    CREATE TABLE IF NOT EXISTS attendance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        class_id TEXT NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
        student_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        status TEXT NOT NULL CHECK (status IN ('present', 'absent')),
        UNIQUE (class_id, student_id)
    );
";

/// Users, rosters and attendance in a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the
    /// schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = ?path.as_ref(), "opened attendance database");
        Self::init(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn load_class(
    conn: &Connection,
    class_id: &ClassId,
) -> Result<Option<ClassRecord>, StoreError> {
    let row = conn
        .query_row(
            "SELECT class_name, teacher_id FROM classes WHERE id = ?1",
            params![class_id.as_str()],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((class_name, teacher_id)) = row else {
        return Ok(None);
    };
    Ok(Some(ClassRecord {
        id: class_id.clone(),
        class_name,
        teacher_id: UserId(teacher_id),
        student_ids: load_roster(conn, class_id)?,
    }))
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    let role: String = row.get(3)?;
    let role = role.parse::<Role>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })?;
    Ok(UserRecord {
        id: UserId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        role,
    })
}

fn load_roster(conn: &Connection, class_id: &ClassId) -> Result<Vec<UserId>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT student_id FROM class_students WHERE class_id = ?1 ORDER BY student_id",
    )?;
    let rows = stmt.query_map(params![class_id.as_str()], |r| r.get::<_, String>(0))?;
    let mut roster = Vec::new();
    for row in rows {
        roster.push(UserId(row?));
    }
    Ok(roster)
}

impl RosterStore for SqliteStore {
    async fn find_class(
        &self,
        class_id: &ClassId,
    ) -> Result<Option<ClassRecord>, StoreError> {
        let class_id = class_id.clone();
        self.run(move |conn| load_class(conn, &class_id)).await
    }

    async fn find_class_with_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<Option<ClassRecord>, StoreError> {
        let class_id = class_id.clone();
        let student_id = student_id.clone();
        self.run(move |conn| {
            let enrolled: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM class_students WHERE class_id = ?1 AND student_id = ?2)",
                params![class_id.as_str(), student_id.as_str()],
                |r| r.get(0),
            )?;
            if !enrolled {
                return Ok(None);
            }
            load_class(conn, &class_id)
        })
        .await
    }

    async fn list_students_of_class(
        &self,
        class_id: &ClassId,
    ) -> Result<Vec<UserId>, StoreError> {
        let class_id = class_id.clone();
        self.run(move |conn| load_roster(conn, &class_id)).await
    }
}

impl AttendanceStore for SqliteStore {
    async fn insert_batch(
        &self,
        records: &[AttendanceRecord],
    ) -> Result<usize, StoreError> {
        let records = records.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO attendance (class_id, student_id, status) VALUES (?1, ?2, ?3)",
                )?;
                for record in &records {
                    inserted += stmt.execute(params![
                        record.class_id.as_str(),
                        record.student_id.as_str(),
                        record.status.as_str(),
                    ])?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }

    async fn find_attendance(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let class_id = class_id.clone();
        let student_id = student_id.clone();
        self.run(move |conn| {
            let status: Option<String> = conn
                .query_row(
                    "SELECT status FROM attendance WHERE class_id = ?1 AND student_id = ?2",
                    params![class_id.as_str(), student_id.as_str()],
                    |r| r.get(0),
                )
                .optional()?;
            status
                .map(|status| {
                    let status: AttendanceStatus = status.parse().map_err(|e: String| {
                        StoreError::Database(rusqlite::Error::InvalidColumnType(
                            0,
                            e,
                            rusqlite::types::Type::Text,
                        ))
                    })?;
                    Ok(AttendanceRecord {
                        class_id,
                        student_id,
                        status,
                    })
                })
                .transpose()
        })
        .await
    }
}

impl AccountStore for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let record = UserRecord {
            id: UserId(uuid::Uuid::new_v4().to_string()),
            name: user.name,
            email: user.email,
            role: user.role,
        };
        let row = record.clone();
        let password_hash = user.password_hash;
        self.run(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![&row.email],
                |r| r.get(0),
            )?;
            if exists {
                return Err(StoreError::Conflict(format!(
                    "email {} already exists",
                    row.email
                )));
            }
            conn.execute(
                "INSERT INTO users (id, name, email, password_hash, role) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.id.as_str(),
                    &row.name,
                    &row.email,
                    &password_hash,
                    row.role.as_str()
                ],
            )?;
            Ok(())
        })
        .await?;
        debug!(user_id = %record.id, role = %record.role, "user created");
        Ok(record)
    }

    async fn find_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        let user_id = user_id.clone();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, email, role FROM users WHERE id = ?1",
                    params![user_id.as_str()],
                    user_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<Credentials>, StoreError> {
        let email = email.to_owned();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, email, role, password_hash FROM users WHERE email = ?1",
                    params![&email],
                    |r| {
                        Ok(Credentials {
                            user: user_from_row(r)?,
                            password_hash: r.get(4)?,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }

    async fn list_students(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, email, role FROM users WHERE role = ?1 ORDER BY name, id",
            )?;
            let rows = stmt.query_map(params![Role::Student.as_str()], user_from_row)?;
            let mut students = Vec::new();
            for row in rows {
                students.push(row?);
            }
            Ok(students)
        })
        .await
    }

    async fn create_class(
        &self,
        class_name: &str,
        teacher_id: &UserId,
    ) -> Result<ClassRecord, StoreError> {
        let record = ClassRecord {
            id: ClassId(uuid::Uuid::new_v4().to_string()),
            class_name: class_name.to_owned(),
            teacher_id: teacher_id.clone(),
            student_ids: Vec::new(),
        };
        let row = record.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO classes (id, class_name, teacher_id) VALUES (?1, ?2, ?3)",
                params![row.id.as_str(), &row.class_name, row.teacher_id.as_str()],
            )?;
            Ok(())
        })
        .await?;
        debug!(class_id = %record.id, teacher_id = %record.teacher_id, "class created");
        Ok(record)
    }

    async fn add_student(
        &self,
        class_id: &ClassId,
        student_id: &UserId,
    ) -> Result<ClassRecord, StoreError> {
        let class_id = class_id.clone();
        let student_id = student_id.clone();
        self.run(move |conn| {
            let role: Option<String> = conn
                .query_row(
                    "SELECT role FROM users WHERE id = ?1",
                    params![student_id.as_str()],
                    |r| r.get(0),
                )
                .optional()?;
            if role.as_deref() != Some(Role::Student.as_str()) {
                return Err(StoreError::NotFound(format!("student {student_id}")));
            }
            let changed = conn.execute(
                "INSERT OR IGNORE INTO class_students (class_id, student_id) VALUES (?1, ?2)",
                params![class_id.as_str(), student_id.as_str()],
            )?;
            if changed == 0 {
                return Err(StoreError::Conflict(format!(
                    "student {student_id} already in class {class_id}"
                )));
            }
            debug!(%class_id, %student_id, "student enrolled");
            load_class(conn, &class_id)?
                .ok_or_else(|| StoreError::NotFound(format!("class {class_id}")))
        })
        .await
    }
}
