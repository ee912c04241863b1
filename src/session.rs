//! Session registry.
//!
//! Maps each live connection to the handler that currently owns it. The
//! registry is the only long-lived owner of a handler: installing a new
//! handler for a connection drops the previous one, and removing the
//! session drops whatever handler was current.

use crate::handler::RequestHandler;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque identifier of an accepted connection.
///
/// Ids are never reused within a process, so a stale id can only miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared slot holding a session's current handler.
///
/// The worker locks the slot for the duration of one request so that the
/// relevance check, execution and transition happen against the same
/// handler. Assigning through the guard replaces the registry's entry.
pub type SessionHandle = Arc<Mutex<Box<dyn RequestHandler>>>;

/// Registry of live sessions.
///
/// A single lock guards the map; every operation is a short pointer swap.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, SessionHandle>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh id and register `handler` under it.
    pub fn register(&self, handler: Box<dyn RequestHandler>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sessions
            .lock()
            .insert(id, Arc::new(Mutex::new(handler)));
        id
    }

    /// Insert or replace the handler for `id`.
    ///
    /// When replacing, the previous handler is dropped before this returns.
    /// The swap happens under the map lock, so a concurrent `remove` either
    /// sees the new handler or makes this an insert.
    pub fn set(&self, id: ConnectionId, handler: Box<dyn RequestHandler>) {
        let previous = {
            let mut sessions = self.sessions.lock();
            match sessions.get(&id) {
                Some(slot) => std::mem::replace(&mut *slot.lock(), handler),
                None => {
                    sessions.insert(id, Arc::new(Mutex::new(handler)));
                    return;
                }
            }
        };

        // Dropped outside the map lock
        drop(previous);
    }

    /// Look up the slot for `id`.
    pub fn get(&self, id: ConnectionId) -> Option<SessionHandle> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Remove the session. Removing an absent id is a no-op.
    pub fn remove(&self, id: ConnectionId) -> Option<SessionHandle> {
        self.sessions.lock().remove(&id)
    }

    /// Check if a session exists.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.lock().contains_key(&id)
    }

    /// Name of the handler currently owning `id`.
    pub fn handler_name(&self, id: ConnectionId) -> Option<&'static str> {
        let slot = self.get(id)?;
        let name = slot.lock().name();
        Some(name)
    }

    /// Ids of all live sessions, in no particular order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.sessions.lock().keys().copied().collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Check if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RequestResult;
    use crate::protocol::RequestInfo;
    use std::sync::atomic::AtomicUsize;

    /// Handler that counts its own drops.
    struct Tracked {
        name: &'static str,
        drops: Arc<AtomicUsize>,
    }

    impl Tracked {
        fn boxed(name: &'static str, drops: &Arc<AtomicUsize>) -> Box<dyn RequestHandler> {
            Box::new(Tracked {
                name,
                drops: Arc::clone(drops),
            })
        }
    }

    impl RequestHandler for Tracked {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_request_relevant(&self, _request: &RequestInfo) -> bool {
            false
        }

        fn handle_request(&mut self, _request: &RequestInfo) -> RequestResult {
            RequestResult::stay(Vec::new())
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_register_allocates_unique_ids() {
        let registry = SessionRegistry::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let a = registry.register(Tracked::boxed("login", &drops));
        let b = registry.register(Tracked::boxed("login", &drops));

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);

        // Removal does not free the id for reuse
        registry.remove(a);
        let c = registry.register(Tracked::boxed("login", &drops));
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_set_replaces_and_drops_previous() {
        let registry = SessionRegistry::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let id = registry.register(Tracked::boxed("login", &drops));
        assert_eq!(registry.handler_name(id), Some("login"));

        registry.set(id, Tracked::boxed("menu", &drops));
        assert_eq!(registry.handler_name(id), Some("menu"));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_inserts_when_absent() {
        let registry = SessionRegistry::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let id = registry.register(Tracked::boxed("login", &drops));
        registry.remove(id);
        assert!(!registry.contains(id));

        registry.set(id, Tracked::boxed("menu", &drops));
        assert_eq!(registry.handler_name(id), Some("menu"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = SessionRegistry::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let id = registry.register(Tracked::boxed("login", &drops));

        assert!(registry.remove(id).is_some());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        assert!(registry.remove(id).is_none());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
        assert!(registry.get(id).is_none());
        assert!(registry.handler_name(id).is_none());
    }

    #[test]
    fn test_concurrent_register_and_remove() {
        let registry = Arc::new(SessionRegistry::new());
        let drops = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let drops = Arc::clone(&drops);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let id = registry.register(Tracked::boxed("login", &drops));
                        registry.set(id, Tracked::boxed("menu", &drops));
                        assert_eq!(registry.handler_name(id), Some("menu"));
                        registry.remove(id);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.is_empty());
        assert_eq!(drops.load(Ordering::SeqCst), 8 * 100 * 2);
    }

    #[test]
    fn test_set_racing_remove_never_orphans_handler() {
        let drops = Arc::new(AtomicUsize::new(0));

        for _ in 0..200 {
            let registry = Arc::new(SessionRegistry::new());
            let id = registry.register(Tracked::boxed("login", &drops));

            let remover = {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.remove(id))
            };
            registry.set(id, Tracked::boxed("menu", &drops));
            let removed = remover.join().unwrap();

            // Either the remove saw "menu", or the set became an insert
            match removed {
                Some(slot) if slot.lock().name() == "menu" => assert!(!registry.contains(id)),
                Some(_) => assert_eq!(registry.handler_name(id), Some("menu")),
                None => unreachable!("the session was registered"),
            }
        }
    }
}
