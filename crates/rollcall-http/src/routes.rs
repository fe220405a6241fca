//! Route handlers.
//!
//! Every response is an envelope: `{"success": true, "data": ...}` on
//! success, `{"success": false, "error": "..."}` otherwise.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rollcall_attendance::SessionStarted;
use rollcall_protocol::{AttendanceStatus, ClassId, Role, UserId};
use rollcall_session::Identity;
use rollcall_store::{ClassRecord, NewUser, StoreError, UserRecord};
use serde::{Deserialize, Serialize};

use crate::password;
use crate::state::{ApiStore, AppState, Caller};
use crate::ApiError;

const MIN_PASSWORD_LEN: usize = 6;

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

// ---------------------------------------------------------------------------
// Bodies and views
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct Envelope<T> {
    success: bool,
    data: T,
}

fn ok<T>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignupRequest {
    name: String,
    email: String,
    password: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateClassRequest {
    class_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddStudentRequest {
    student_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartRequest {
    class_id: ClassId,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserView {
    #[serde(rename = "_id")]
    id: UserId,
    name: String,
    email: String,
    role: Role,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentView {
    id: UserId,
    name: String,
    email: String,
}

impl From<UserRecord> for StudentView {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassView {
    #[serde(rename = "_id")]
    id: ClassId,
    class_name: String,
    teacher_id: UserId,
    student_ids: Vec<UserId>,
}

impl From<ClassRecord> for ClassView {
    fn from(class: ClassRecord) -> Self {
        Self {
            id: class.id,
            class_name: class.class_name,
            teacher_id: class.teacher_id,
            student_ids: class.student_ids,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClassDetail {
    #[serde(rename = "_id")]
    id: ClassId,
    class_name: String,
    teacher_id: UserId,
    students: Vec<StudentView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenView {
    token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttendanceView {
    class_id: ClassId,
    status: AttendanceStatus,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "request body rejected");
            Err(ApiError::InvalidSchema)
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// `POST /auth/signup`
pub(crate) async fn signup<S: ApiStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<UserView>>), ApiError> {
    let req = body(payload)?;
    if req.name.trim().is_empty()
        || !req.email.contains('@')
        || req.password.chars().count() < MIN_PASSWORD_LEN
    {
        return Err(ApiError::InvalidSchema);
    }

    let user = state
        .store
        .create_user(NewUser {
            name: req.name,
            email: req.email,
            password_hash: password::hash(&req.password),
            role: req.role,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::EmailTaken,
            other => other.into(),
        })?;
    tracing::info!(user_id = %user.id, role = %user.role, "user signed up");
    Ok((StatusCode::CREATED, ok(user.into())))
}

/// `POST /auth/login`
pub(crate) async fn login<S: ApiStore>(
    State(state): State<AppState<S>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<TokenView> {
    let req = body(payload)?;
    let credentials = state
        .store
        .find_credentials(&req.email)
        .await?
        .filter(|c| password::verify(&req.password, &c.password_hash))
        .ok_or(ApiError::InvalidCredentials)?;

    let identity = Identity {
        user_id: credentials.user.id,
        role: credentials.user.role,
    };
    let token = state.tokens.issue(&identity, state.token_ttl)?;
    tracing::debug!(user_id = %identity.user_id, "token issued");
    Ok(ok(TokenView { token }))
}

/// `GET /auth/me`
pub(crate) async fn me(caller: Caller) -> ApiResult<UserView> {
    Ok(ok(caller.user.into()))
}

/// `GET /students`
pub(crate) async fn list_students<S: ApiStore>(
    State(state): State<AppState<S>>,
    caller: Caller,
) -> ApiResult<Vec<StudentView>> {
    caller.require(Role::Teacher)?;
    let students = state.store.list_students().await?;
    Ok(ok(students.into_iter().map(StudentView::from).collect()))
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

/// `POST /class`
pub(crate) async fn create_class<S: ApiStore>(
    State(state): State<AppState<S>>,
    caller: Caller,
    payload: Result<Json<CreateClassRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<ClassView>>), ApiError> {
    caller.require(Role::Teacher)?;
    let req = body(payload)?;
    if req.class_name.trim().is_empty() {
        return Err(ApiError::InvalidSchema);
    }
    let class = state
        .store
        .create_class(&req.class_name, &caller.identity.user_id)
        .await?;
    Ok((StatusCode::CREATED, ok(class.into())))
}

/// `POST /class/{id}/add-student`
pub(crate) async fn add_student<S: ApiStore>(
    State(state): State<AppState<S>>,
    Path(class_id): Path<String>,
    caller: Caller,
    payload: Result<Json<AddStudentRequest>, JsonRejection>,
) -> ApiResult<ClassView> {
    caller.require(Role::Teacher)?;
    let req = body(payload)?;
    let class_id = ClassId(class_id);

    match state.store.find_class(&class_id).await? {
        Some(class) if class.teacher_id == caller.identity.user_id => {}
        _ => return Err(ApiError::NotClassTeacher),
    }

    let class = state
        .store
        .add_student(&class_id, &req.student_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::StudentNotFound,
            StoreError::Conflict(_) => ApiError::AlreadyEnrolled,
            other => other.into(),
        })?;
    Ok(ok(class.into()))
}

/// `GET /class/{id}`
///
/// Teachers see only their own classes, students only the ones they are
/// enrolled in.
pub(crate) async fn get_class<S: ApiStore>(
    State(state): State<AppState<S>>,
    Path(class_id): Path<String>,
    caller: Caller,
) -> ApiResult<ClassDetail> {
    let class = state
        .store
        .find_class(&ClassId(class_id))
        .await?
        .ok_or(ApiError::ClassNotFound)?;
    match caller.identity.role {
        Role::Teacher if class.teacher_id != caller.identity.user_id => {
            return Err(ApiError::NotClassTeacher);
        }
        Role::Student if !class.has_student(&caller.identity.user_id) => {
            return Err(ApiError::NotEnrolled);
        }
        Role::Teacher | Role::Student => {}
    }

    let mut students = Vec::with_capacity(class.student_ids.len());
    for student_id in &class.student_ids {
        if let Some(user) = state.store.find_user(student_id).await? {
            students.push(StudentView::from(user));
        }
    }
    Ok(ok(ClassDetail {
        id: class.id,
        class_name: class.class_name,
        teacher_id: class.teacher_id,
        students,
    }))
}

/// `GET /class/{id}/my-attendance`: the caller's persisted record.
pub(crate) async fn my_attendance<S: ApiStore>(
    State(state): State<AppState<S>>,
    Path(class_id): Path<String>,
    caller: Caller,
) -> ApiResult<AttendanceView> {
    caller.require(Role::Student)?;
    let record = state
        .store
        .find_attendance(&ClassId(class_id), &caller.identity.user_id)
        .await?
        .ok_or(ApiError::AttendanceNotFound)?;
    Ok(ok(AttendanceView {
        class_id: record.class_id,
        status: record.status,
    }))
}

// ---------------------------------------------------------------------------
// Roll call
// ---------------------------------------------------------------------------

/// `POST /attendance/start`: the only way a roll call begins.
pub(crate) async fn start_attendance<S: ApiStore>(
    State(state): State<AppState<S>>,
    caller: Caller,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<SessionStarted> {
    caller.require(Role::Teacher)?;
    let req = body(payload)?;
    let started = state
        .control
        .start_session(&caller.identity, req.class_id)
        .await?;
    Ok(ok(started))
}
