//! Wire protocol for Rollcall.
//!
//! This crate defines the "language" that teacher/student clients and the
//! server speak:
//!
//! - **Types** ([`InboundFrame`], [`ClientEvent`], [`ServerEvent`], ids,
//!   roles, statuses): the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those structures
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Attendance (session state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    AttendanceStatus, AttendanceSummary, ClassId, ClientEvent, EventKind,
    InboundFrame, PersonalStatus, Role, ServerEvent, UserId,
    PERSISTED_MESSAGE,
};
