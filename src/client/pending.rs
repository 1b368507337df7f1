//! Single-slot rendezvous between a waiting caller and the listener task.
//!
//! The directory answers the requests of one connection in order, so each
//! reply belongs to the oldest request that has not been answered yet. A
//! caller that stops waiting (timeout, dropped future) before its reply
//! arrives leaves that reply owed; the slot swallows owed replies, so a
//! late answer never resolves a newer request.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::{Result, RoomcastError};

/// What happened to a reply handed to [`PendingRequest::resolve_if`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The current waiter received the value.
    Delivered,
    /// The reply answered a request whose waiter had already left.
    Stale,
    /// No waiter was present, or its key did not match.
    Unclaimed,
}

struct Waiter<T, K> {
    key: K,
    sender: oneshot::Sender<T>,
}

impl<T, K> Waiter<T, K> {
    fn has_left(&self) -> bool {
        self.sender.is_closed()
    }
}

struct Slot<T, K> {
    waiter: Option<Waiter<T, K>>,
    owed: usize,
}

/// A request waiting for one specific asynchronous reply.
///
/// At most one request per slot is outstanding. `K` is whatever the
/// caller asked for (a room name, say) and lets the listener check that a
/// reply actually answers it. The first matching reply resolves the slot;
/// every later one finds it empty and is a no-op.
pub struct PendingRequest<T, K = ()> {
    kind: &'static str,
    slot: Mutex<Slot<T, K>>,
}

impl<T, K> PendingRequest<T, K> {
    /// Create an empty slot. `kind` names the request in errors and logs.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slot: Mutex::new(Slot {
                waiter: None,
                owed: 0,
            }),
        }
    }

    /// Name of the request kind.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    fn slot(&self) -> MutexGuard<'_, Slot<T, K>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the slot for a request identified by `key`.
    ///
    /// Fails if another caller is still waiting. A previous waiter that
    /// left before its reply came is still owed that reply.
    pub fn register(&self, key: K) -> Result<oneshot::Receiver<T>> {
        let mut slot = self.slot();
        if let Some(waiter) = &slot.waiter {
            if !waiter.has_left() {
                return Err(RoomcastError::RequestInFlight(self.kind));
            }
            slot.owed += 1;
        }
        let (sender, receiver) = oneshot::channel();
        slot.waiter = Some(Waiter { key, sender });
        Ok(receiver)
    }

    /// Hand a reply to the slot if `matches` accepts the waiter's key.
    ///
    /// Replies owed to earlier requests are consumed first, whatever their
    /// content.
    pub fn resolve_if(&self, matches: impl FnOnce(&K) -> bool, value: T) -> Resolution {
        let mut slot = self.slot();
        if slot.owed > 0 {
            slot.owed -= 1;
            return Resolution::Stale;
        }
        if slot.waiter.as_ref().is_some_and(Waiter::has_left) {
            slot.waiter = None;
            return Resolution::Stale;
        }
        if !slot.waiter.as_ref().is_some_and(|waiter| matches(&waiter.key)) {
            return Resolution::Unclaimed;
        }
        match slot.waiter.take() {
            Some(waiter) => match waiter.sender.send(value) {
                Ok(()) => Resolution::Delivered,
                Err(_) => Resolution::Unclaimed,
            },
            None => Resolution::Unclaimed,
        }
    }

    /// Hand a reply to whichever request is waiting.
    pub fn resolve(&self, value: T) -> Resolution {
        self.resolve_if(|_| true, value)
    }

    /// Whether a waiter is currently registered.
    pub fn is_pending(&self) -> bool {
        self.slot()
            .waiter
            .as_ref()
            .is_some_and(|waiter| !waiter.has_left())
    }

    /// Number of replies still expected for requests nobody waits on.
    pub fn owed(&self) -> usize {
        let slot = self.slot();
        let left = slot.waiter.as_ref().is_some_and(Waiter::has_left);
        slot.owed + usize::from(left)
    }

    /// Withdraw a registration whose request was never sent.
    pub fn cancel(&self) {
        self.slot().waiter = None;
    }

    /// Drop the outstanding request and forget owed replies.
    ///
    /// Used when the connection is gone. The waiter wakes with a receive
    /// error.
    pub fn abandon(&self) {
        let mut slot = self.slot();
        slot.waiter = None;
        slot.owed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_wakes_waiter() {
        let pending = PendingRequest::new("listing");
        let receiver = pending.register(()).unwrap();
        assert!(pending.is_pending());

        assert_eq!(pending.resolve(7), Resolution::Delivered);
        assert_eq!(receiver.await.unwrap(), 7);
        assert!(!pending.is_pending());
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        let pending = PendingRequest::new("room creation");
        let receiver = pending.register(()).unwrap();

        assert_eq!(pending.resolve("first"), Resolution::Delivered);
        assert_eq!(pending.resolve("second"), Resolution::Unclaimed);
        assert_eq!(receiver.await.unwrap(), "first");
    }

    #[test]
    fn test_resolve_without_waiter_is_noop() {
        let pending: PendingRequest<()> = PendingRequest::new("listing");
        assert_eq!(pending.resolve(()), Resolution::Unclaimed);
    }

    #[test]
    fn test_second_register_is_rejected() {
        let pending: PendingRequest<u32> = PendingRequest::new("room creation");
        let _receiver = pending.register(()).unwrap();

        let err = pending.register(()).unwrap_err();
        assert!(matches!(err, RoomcastError::RequestInFlight("room creation")));
    }

    #[tokio::test]
    async fn test_key_mismatch_leaves_waiter_pending() {
        let pending: PendingRequest<u32, String> = PendingRequest::new("room creation");
        let receiver = pending.register("Beta".to_string()).unwrap();

        assert_eq!(
            pending.resolve_if(|name| name == "Alpha", 1),
            Resolution::Unclaimed
        );
        assert!(pending.is_pending());

        assert_eq!(
            pending.resolve_if(|name| name == "Beta", 2),
            Resolution::Delivered
        );
        assert_eq!(receiver.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_late_reply_does_not_resolve_next_request() {
        let pending: PendingRequest<&str> = PendingRequest::new("listing");
        drop(pending.register(()).unwrap());

        let second = pending.register(()).unwrap();
        assert_eq!(pending.owed(), 1);
        assert_eq!(pending.resolve("late"), Resolution::Stale);
        assert!(pending.is_pending());
        assert_eq!(pending.resolve("current"), Resolution::Delivered);
        assert_eq!(second.await.unwrap(), "current");
        assert_eq!(pending.owed(), 0);
    }

    #[test]
    fn test_late_reply_with_nobody_waiting_frees_slot() {
        let pending: PendingRequest<u32> = PendingRequest::new("listing");
        drop(pending.register(()).unwrap());
        assert!(!pending.is_pending());
        assert_eq!(pending.owed(), 1);

        assert_eq!(pending.resolve(1), Resolution::Stale);
        assert_eq!(pending.owed(), 0);
        assert!(pending.register(()).is_ok());
        assert_eq!(pending.owed(), 0);
    }

    #[test]
    fn test_every_abandoned_request_is_owed() {
        let pending: PendingRequest<u32> = PendingRequest::new("listing");
        for _ in 0..3 {
            drop(pending.register(()).unwrap());
        }
        let _receiver = pending.register(()).unwrap();
        assert_eq!(pending.owed(), 3);

        for _ in 0..3 {
            assert_eq!(pending.resolve(0), Resolution::Stale);
        }
        assert_eq!(pending.resolve(1), Resolution::Delivered);
    }

    #[test]
    fn test_cancel_owes_nothing() {
        let pending: PendingRequest<u32> = PendingRequest::new("listing");
        let receiver = pending.register(()).unwrap();
        pending.cancel();
        drop(receiver);

        assert!(pending.register(()).is_ok());
        assert_eq!(pending.owed(), 0);
    }

    #[tokio::test]
    async fn test_abandon_wakes_waiter_and_clears_owed() {
        let pending: PendingRequest<u32> = PendingRequest::new("listing");
        drop(pending.register(()).unwrap());
        let receiver = pending.register(()).unwrap();
        assert_eq!(pending.owed(), 1);

        pending.abandon();
        assert!(receiver.await.is_err());
        assert_eq!(pending.owed(), 0);
    }

    #[tokio::test]
    async fn test_resolve_from_another_task() {
        let pending = std::sync::Arc::new(PendingRequest::new("listing"));
        let receiver = pending.register(()).unwrap();

        let resolver = std::sync::Arc::clone(&pending);
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            resolver.resolve(42u32);
        });

        assert_eq!(receiver.await.unwrap(), 42);
    }
}
