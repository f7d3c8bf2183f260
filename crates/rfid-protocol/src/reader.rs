//! Interrogator capability traits
//!
//! An interrogator is driven through a small blocking surface: connect,
//! parameter get/set, bounded reads, continuous reading with listeners, and
//! destroy. Implementations are shared between threads, so every method
//! takes `&self` and `destroy` may be called while another thread is blocked
//! inside `connect` or `read`; that call must then return promptly with an
//! error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::ReaderError;
use crate::param::ParamValue;
use crate::tag::TagRecord;

/// Callback for each individual tag observation, duplicates included
pub type ReadListener = Arc<dyn Fn(TagRecord) + Send + Sync>;

/// Callback for faults raised while reading continuously
pub type ExceptionListener = Arc<dyn Fn(ReaderError) + Send + Sync>;

/// Callback for raw transport frames
pub type TransportListener = Arc<dyn Fn(TransportDirection, &[u8]) + Send + Sync>;

/// Direction of a raw transport frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportDirection {
    /// Host to device
    Tx,
    /// Device to host
    Rx,
}

/// Registration token returned by the `add_*_listener` methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A connected (or connectable) RFID interrogator session
pub trait Interrogator: Send + Sync + 'static {
    /// Open the transport and synchronise with the device. May block.
    fn connect(&self) -> Result<(), ReaderError>;

    /// Read a parameter
    fn param_get(&self, path: &str) -> Result<ParamValue, ReaderError>;

    /// Write a parameter
    fn param_set(&self, path: &str, value: ParamValue) -> Result<(), ReaderError>;

    /// Read tags for up to `timeout` and return every observation
    fn read(&self, timeout: Duration) -> Result<Vec<TagRecord>, ReaderError>;

    /// Register a tag-read callback
    fn add_read_listener(&self, listener: ReadListener) -> ListenerId;

    /// Unregister a tag-read callback
    fn remove_read_listener(&self, id: ListenerId) -> bool;

    /// Register a fault callback
    fn add_read_exception_listener(&self, listener: ExceptionListener) -> ListenerId;

    /// Unregister a fault callback
    fn remove_read_exception_listener(&self, id: ListenerId) -> bool;

    /// Register a raw transport callback, if the device supports tracing
    fn add_transport_listener(&self, _listener: TransportListener) -> Option<ListenerId> {
        None
    }

    /// Unregister a raw transport callback
    fn remove_transport_listener(&self, _id: ListenerId) -> bool {
        false
    }

    /// Begin continuous reading; observations go to the read listeners
    fn start_reading(&self) -> Result<(), ReaderError>;

    /// Stop continuous reading
    fn stop_reading(&self) -> Result<(), ReaderError>;

    /// Release the session and its transport. Idempotent.
    fn destroy(&self);
}

/// Creates interrogator sessions from an SDK address
pub trait InterrogatorFactory: Send + Sync {
    /// Session type produced by this factory
    type Device: Interrogator;

    /// Create an unconnected session for `uri`
    fn create(&self, uri: &str) -> Result<Self::Device, ReaderError>;
}

/// Thread-safe listener table for interrogator implementations
pub struct ListenerSet<L> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, L)>>,
}

impl<L: Clone> ListenerSet<L> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Add a listener and return its id
    pub fn add(&self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    /// Remove a listener by id
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Copy out the current listeners so they can be called without the lock
    pub fn snapshot(&self) -> Vec<L> {
        self.lock().iter().map(|(_, l)| l.clone()).collect()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no listeners are registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove every listener
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, L)>> {
        // A panicking listener must not wedge the table
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: Clone> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_listener_set_add_remove() {
        let set: ListenerSet<ReadListener> = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let id = set.add(Arc::new(move |_record: TagRecord| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(set.len(), 1);

        for listener in set.snapshot() {
            listener(TagRecord::new("E1"));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }

    #[test]
    fn test_listener_ids_are_unique() {
        let set: ListenerSet<ExceptionListener> = ListenerSet::new();
        let a = set.add(Arc::new(|_: ReaderError| {}));
        let b = set.add(Arc::new(|_: ReaderError| {}));
        assert_ne!(a, b);
    }
}
