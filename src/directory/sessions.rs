//! Live session set used for broadcast fan-out.
//!
//! The set is copy-on-write: arrivals and departures swap in a new list
//! under a short lock, while a broadcast iterates an immutable snapshot
//! without holding it. A session leaving mid-broadcast only causes its
//! own send to be skipped.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::protocol::Event;

/// Outbound side of one live session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    /// Session identifier.
    pub id: Uuid,
    /// Remote peer address.
    pub peer_addr: SocketAddr,
    /// Queue drained by the session's writer task.
    outbound: mpsc::UnboundedSender<Event>,
}

impl SessionHandle {
    /// Create a handle around a session's outbound queue.
    pub fn new(id: Uuid, peer_addr: SocketAddr, outbound: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            id,
            peer_addr,
            outbound,
        }
    }

    /// Queue an event for this session.
    ///
    /// Returns false if the session has already shut down.
    pub fn send(&self, event: Event) -> bool {
        self.outbound.send(event).is_ok()
    }
}

/// Set of all live sessions.
#[derive(Clone, Default)]
pub struct SessionSet {
    sessions: Arc<Mutex<Arc<Vec<SessionHandle>>>>,
}

impl SessionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> MutexGuard<'_, Arc<Vec<SessionHandle>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a session. The returned guard removes it again when dropped.
    pub fn insert(&self, handle: SessionHandle) -> SessionRegistration {
        let id = handle.id;
        let mut current = self.current();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(handle);
        *current = Arc::new(next);
        debug!(session = %id, total = current.len(), "Registered session");

        SessionRegistration {
            set: self.clone(),
            id,
        }
    }

    /// Remove a session.
    ///
    /// Returns true if the session was present.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut current = self.current();
        if !current.iter().any(|handle| handle.id == id) {
            return false;
        }
        let next: Vec<_> = current
            .iter()
            .filter(|handle| handle.id != id)
            .cloned()
            .collect();
        *current = Arc::new(next);
        debug!(session = %id, total = current.len(), "Unregistered session");
        true
    }

    /// Immutable snapshot of the live sessions.
    pub fn snapshot(&self) -> Arc<Vec<SessionHandle>> {
        let current = self.current();
        Arc::clone(&*current)
    }

    /// Get the number of live sessions.
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Check whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send an event to every live session except `origin`.
    ///
    /// Returns the number of sessions the event was queued for.
    pub fn broadcast_except(&self, origin: Uuid, event: &Event) -> usize {
        let snapshot = self.snapshot();
        let mut delivered = 0;
        for handle in snapshot.iter().filter(|handle| handle.id != origin) {
            if handle.send(event.clone()) {
                delivered += 1;
            } else {
                trace!(session = %handle.id, "Skipped closed session during broadcast");
            }
        }
        delivered
    }
}

/// Membership of one session in a [`SessionSet`].
///
/// Dropping the registration removes the session exactly once.
pub struct SessionRegistration {
    set: SessionSet,
    id: Uuid,
}

impl Drop for SessionRegistration {
    fn drop(&mut self) {
        self.set.remove(self.id);
    }
}
