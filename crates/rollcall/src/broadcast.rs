//! Fan-out of server events to every open connection.
//!
//! Each authenticated connection registers an unbounded sender; its handler
//! task drains the receiving end onto the socket. A broadcast is a loop of
//! non-blocking channel sends, so it never waits on a slow client and never
//! fails: a send to a connection that has already gone away is dropped.
//!
//! Nothing here awaits, so the router can publish while it holds the
//! session lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rollcall_attendance::Publisher;
use rollcall_protocol::{Codec, ServerEvent};
use rollcall_transport::ConnectionId;
use tokio::sync::mpsc;

/// An encoded frame shared by every recipient of one broadcast.
pub type Outbound = Arc<[u8]>;

/// Registry of open connections' outbound channels.
#[derive(Default)]
pub struct Broadcaster {
    peers: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection and returns the receiver its handler drains.
    pub fn register(&self, conn_id: ConnectionId) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conn_id, tx);
        rx
    }

    /// Removes a connection. Unknown ids are ignored.
    pub fn unregister(&self, conn_id: ConnectionId) {
        self.peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&conn_id);
    }

    /// Delivers `frame` to every registered connection.
    ///
    /// Returns how many connections accepted it.
    pub fn broadcast(&self, frame: Outbound) -> usize {
        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        for (conn_id, tx) in peers.iter() {
            if tx.send(Arc::clone(&frame)).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(%conn_id, "broadcast dropped for closed connection");
            }
        }
        tracing::debug!(recipients = peers.len(), delivered, "broadcast");
        delivered
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encodes published events once and hands the bytes to a [`Broadcaster`].
pub(crate) struct Fanout<C> {
    broadcaster: Arc<Broadcaster>,
    codec: C,
}

impl<C> Fanout<C> {
    pub(crate) fn new(broadcaster: Arc<Broadcaster>, codec: C) -> Self {
        Self { broadcaster, codec }
    }
}

impl<C: Codec> Publisher for Fanout<C> {
    fn publish(&self, event: &ServerEvent) {
        match self.codec.encode(event) {
            Ok(bytes) => {
                self.broadcaster.broadcast(Arc::from(bytes));
            }
            Err(e) => tracing::warn!(error = %e, "broadcast event could not be encoded"),
        }
    }
}
