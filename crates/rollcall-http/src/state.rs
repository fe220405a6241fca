//! Shared state handed to every route, and the authenticated caller.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use rollcall_attendance::SessionControl;
use rollcall_protocol::Role;
use rollcall_session::{Identity, JwtAuthenticator};
use rollcall_store::{AccountStore, AttendanceStore, RosterStore, UserRecord};

use crate::ApiError;

/// Everything the routes need from storage.
pub trait ApiStore: AccountStore + RosterStore + AttendanceStore {}

impl<T: AccountStore + RosterStore + AttendanceStore> ApiStore for T {}

/// State cloned into every request.
pub struct AppState<S> {
    pub(crate) store: Arc<S>,
    pub(crate) tokens: Arc<JwtAuthenticator>,
    pub(crate) control: SessionControl<S>,
    pub(crate) token_ttl: Option<Duration>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tokens: Arc::clone(&self.tokens),
            control: self.control.clone(),
            token_ttl: self.token_ttl,
        }
    }
}

impl<S: ApiStore> AppState<S> {
    /// `control` must share its session store with the real-time gateway,
    /// or sessions started here will never be seen by connected clients.
    pub fn new(store: Arc<S>, tokens: JwtAuthenticator, control: SessionControl<S>) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
            control,
            token_ttl: None,
        }
    }

    /// Makes login tokens expire after `ttl`. Tokens never expire by default.
    pub fn with_token_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.token_ttl = ttl;
        self
    }
}

/// The caller behind a `Authorization: Bearer <token>` header.
///
/// The token must verify, and its user must still exist with the role the
/// token claims.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Identity,
    pub user: UserRecord,
}

impl Caller {
    /// Fails with the role's "forbidden" error unless the caller has `role`.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        match (role, self.identity.has_role(role)) {
            (_, true) => Ok(()),
            (Role::Teacher, false) => Err(ApiError::TeacherOnly),
            (Role::Student, false) => Err(ApiError::StudentOnly),
        }
    }
}

impl<S: ApiStore> FromRequestParts<AppState<S>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let identity = {
            let token = parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .ok_or(ApiError::Unauthorized)?;
            state.tokens.verify(token)?
        };

        let user = state
            .store
            .find_user(&identity.user_id)
            .await?
            .filter(|user| user.role == identity.role)
            .ok_or(ApiError::UserNotFound)?;
        Ok(Self { identity, user })
    }
}
