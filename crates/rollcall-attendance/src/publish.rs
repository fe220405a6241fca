//! Hand-off point for events every open connection must see.

use rollcall_protocol::ServerEvent;

/// Receives events meant for every open connection.
///
/// The router calls [`publish`](Self::publish) while it still holds the
/// session lock, so the order events are published in is the order the
/// session changed in. Implementations must return without waiting: queue
/// the event and leave delivery to someone else.
pub trait Publisher: Send + Sync + 'static {
    fn publish(&self, event: &ServerEvent);
}
