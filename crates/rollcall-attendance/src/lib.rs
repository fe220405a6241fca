//! Live roll-call state for Rollcall.
//!
//! One attendance session runs at a time. This crate owns it:
//!
//! - [`SessionStore`]: the single slot holding the active [`Session`]
//! - [`EventRouter`]: authorizes and applies client events, producing an
//!   [`Outcome`] for the gateway to deliver
//! - [`Reconciler`]: the `DONE` transition: absentees, batch write, reset
//! - [`SessionControl`]: opens a session for a teacher's class
//! - [`Publisher`]: where events for every connection are handed over
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)      ← delivers Outcomes over connections
//!     ↕
//! Attendance (this crate)
//!     ↕
//! Identity + Store (below)  ← who is asking, who is on the roster
//! ```

mod control;
mod error;
mod policy;
mod publish;
mod reconcile;
mod router;
mod session;

pub use control::{SessionControl, SessionStarted};
pub use error::{AttendanceError, Denial};
pub use publish::Publisher;
pub use reconcile::Reconciler;
pub use router::{EventRouter, Outcome};
pub use session::{Session, SessionPhase, SessionSnapshot, SessionStore};
