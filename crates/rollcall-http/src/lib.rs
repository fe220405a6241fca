//! HTTP routes for Rollcall.
//!
//! The real-time gateway only runs roll calls. Everything around them is
//! plain request/response and lives here:
//!
//! | Route                            | Who      | Does                              |
//! |----------------------------------|----------|-----------------------------------|
//! | `POST /auth/signup`              | anyone   | registers a teacher or student    |
//! | `POST /auth/login`               | anyone   | returns a bearer token            |
//! | `GET /auth/me`                   | any user | the caller's profile              |
//! | `POST /class`                    | teacher  | creates an empty class            |
//! | `POST /class/{id}/add-student`   | teacher  | enrolls a student in own class    |
//! | `GET /class/{id}`                | member   | class with its students           |
//! | `GET /students`                  | teacher  | every registered student          |
//! | `GET /class/{id}/my-attendance`  | student  | the caller's persisted status     |
//! | `POST /attendance/start`         | teacher  | opens the roll call for a class   |
//!
//! `POST /attendance/start` goes through the same
//! [`SessionControl`](rollcall_attendance::SessionControl) the gateway's
//! router reads from, so a roll call started here is live on every socket.

mod error;
mod password;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{ApiStore, AppState, Caller};

/// Builds the router with every route mounted.
pub fn router<S: ApiStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/auth/signup", post(routes::signup::<S>))
        .route("/auth/login", post(routes::login::<S>))
        .route("/auth/me", get(routes::me))
        .route("/students", get(routes::list_students::<S>))
        .route("/class", post(routes::create_class::<S>))
        .route("/class/{id}", get(routes::get_class::<S>))
        .route("/class/{id}/add-student", post(routes::add_student::<S>))
        .route("/class/{id}/my-attendance", get(routes::my_attendance::<S>))
        .route("/attendance/start", post(routes::start_attendance::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the routes on `listener` until the process exits.
pub async fn serve<S: ApiStore>(listener: TcpListener, state: AppState<S>) -> std::io::Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), "http routes listening");
    axum::serve(listener, router(state)).await
}
