//! # Rollcall
//!
//! A real-time classroom attendance server.
//!
//! A teacher opens a roll call for one class, marks students present or
//! absent over a WebSocket, and closes it with `DONE`: unmarked students are
//! recorded absent, everything is written in one batch, and every connected
//! client receives the final counts. Students may ask for their own status
//! while the session runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rollcall::prelude::*;
//!
//! # async fn run() -> Result<(), RollCallError> {
//! let store = Arc::new(MemoryStore::new());
//! let class = store.add_class("c1", "Biology", "t1");
//! store.enroll(&class, "s1")?;
//!
//! let server = RollCallServerBuilder::new()
//!     .bind("127.0.0.1:3003")
//!     .build(JwtAuthenticator::new(b"secret"), store)
//!     .await?;
//! server
//!     .control()
//!     .start_session(&Identity::teacher("t1"), class)
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! Clients connect with `ws://host:port/?token=<jwt>` and exchange
//! `{"event": ..., "data": ...}` frames.

mod broadcast;
mod config;
mod error;
mod handler;
mod server;

pub use broadcast::{Broadcaster, Outbound};
pub use config::ServerConfig;
pub use error::RollCallError;
pub use server::{RollCallServer, RollCallServerBuilder};

/// Everything needed to run and drive a server.
pub mod prelude {
    pub use crate::{RollCallError, RollCallServer, RollCallServerBuilder, ServerConfig};
    pub use rollcall_attendance::{
        AttendanceError, Denial, SessionControl, SessionPhase, SessionSnapshot,
        SessionStarted,
    };
    pub use rollcall_protocol::{
        AttendanceStatus, AttendanceSummary, ClassId, PersonalStatus, Role,
        ServerEvent, UserId,
    };
    pub use rollcall_session::{AuthError, Authenticator, Identity, JwtAuthenticator};
    pub use rollcall_store::{
        AttendanceRecord, AttendanceStore, ClassRecord, MemoryStore, RosterStore,
        SqliteStore, StoreError,
    };
}
