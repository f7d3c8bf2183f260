//! Read plan configuration and listener registration
//!
//! Tag and fault callbacks arrive on a thread owned by the reader. They are
//! forwarded into unbounded channels so the relay consumes them as messages
//! instead of sharing mutable state with that thread.

use std::sync::Arc;
use std::time::Duration;

use rfid_protocol::{
    param, Interrogator, ListenerId, ParamValue, ReadPlan, ReaderError, TagProtocol, TagRecord,
    TransportDirection,
};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::error::RelayError;

/// Receiving ends of the reader callbacks
#[derive(Debug)]
pub struct ReaderFeed {
    /// One message per tag observation, duplicates included
    pub tags: mpsc::UnboundedReceiver<TagRecord>,
    /// Faults raised while reading
    pub faults: mpsc::UnboundedReceiver<ReaderError>,
}

#[derive(Debug, Clone, Copy)]
enum ListenerKind {
    Read,
    Exception,
    Transport,
}

/// Listener registrations that are removed when the guard is released
///
/// Dropping the guard unregisters too, so no callback outlives the session.
pub struct ListenerGuard<D: Interrogator> {
    device: Arc<D>,
    registered: Vec<(ListenerKind, ListenerId)>,
}

impl<D: Interrogator> ListenerGuard<D> {
    fn new(device: Arc<D>) -> Self {
        Self {
            device,
            registered: Vec::new(),
        }
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Unregister every listener now
    pub fn uninstall(mut self) {
        self.remove_all();
    }

    fn remove_all(&mut self) {
        for (kind, id) in self.registered.drain(..) {
            let removed = match kind {
                ListenerKind::Read => self.device.remove_read_listener(id),
                ListenerKind::Exception => self.device.remove_read_exception_listener(id),
                ListenerKind::Transport => self.device.remove_transport_listener(id),
            };
            debug!("Removed {:?} listener {:?} (found: {})", kind, id, removed);
        }
    }
}

impl<D: Interrogator> Drop for ListenerGuard<D> {
    fn drop(&mut self) {
        self.remove_all();
    }
}

/// Applies read plans and installs callbacks
pub struct ReadPlanConfigurator {
    antennas: Vec<u8>,
    protocol: TagProtocol,
}

impl ReadPlanConfigurator {
    /// Create a configurator for the given antennas and protocol
    pub fn new(antennas: impl IntoIterator<Item = u8>, protocol: TagProtocol) -> Self {
        Self {
            antennas: antennas.into_iter().collect(),
            protocol,
        }
    }

    /// Build the read plan and apply it to the reader
    pub fn configure<D: Interrogator>(
        &self,
        device: &D,
        window: Duration,
    ) -> Result<ReadPlan, RelayError> {
        let plan = ReadPlan::new(self.antennas.iter().copied(), self.protocol, window);
        device
            .param_set(param::READ_PLAN, ParamValue::ReadPlan(plan.clone()))
            .map_err(|e| {
                if e.is_connection_lost() {
                    RelayError::ConnectionLost
                } else {
                    RelayError::ReadPlan(e)
                }
            })?;
        info!(
            "Read plan applied: antennas {:?}, protocol {}, window {}ms",
            plan.antennas(),
            plan.protocol().name(),
            window.as_millis()
        );
        Ok(plan)
    }

    /// Register tag and fault callbacks that forward into channels
    pub fn install_listeners<D: Interrogator>(device: Arc<D>) -> (ListenerGuard<D>, ReaderFeed) {
        let (tag_tx, tag_rx) = mpsc::unbounded_channel();
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();

        let mut guard = ListenerGuard::new(device.clone());

        let read_id = device.add_read_listener(Arc::new(move |record: TagRecord| {
            // Receiver gone means the relay is shutting down
            let _ = tag_tx.send(record);
        }));
        guard.registered.push((ListenerKind::Read, read_id));

        let exception_id = device.add_read_exception_listener(Arc::new(move |error: ReaderError| {
            let _ = fault_tx.send(error);
        }));
        guard.registered.push((ListenerKind::Exception, exception_id));

        info!("Installed read and exception listeners");
        (
            guard,
            ReaderFeed {
                tags: tag_rx,
                faults: fault_rx,
            },
        )
    }

    /// Log raw transport frames at trace level
    ///
    /// Returns an empty guard if the reader cannot trace its transport.
    pub fn install_transport_trace<D: Interrogator>(device: Arc<D>) -> ListenerGuard<D> {
        let mut guard = ListenerGuard::new(device.clone());
        let listener = Arc::new(|direction: TransportDirection, frame: &[u8]| {
            trace!("Reader {:?}: {:02X?}", direction, frame);
        });
        match device.add_transport_listener(listener) {
            Some(id) => {
                guard.registered.push((ListenerKind::Transport, id));
                info!("Reader transport tracing enabled");
            }
            None => debug!("Reader does not support transport tracing"),
        }
        guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfid_protocol::Region;
    use rfid_sim::{ReadScript, VirtualReader, VirtualReaderConfig};

    fn reader() -> Arc<VirtualReader> {
        let config = VirtualReaderConfig {
            region: Region::NorthAmerica,
            ..Default::default()
        };
        let reader = VirtualReader::new("tmr:///COM_A", &config);
        reader.connect().unwrap();
        Arc::new(reader)
    }

    #[test]
    fn test_plan_applied() {
        let reader = reader();
        let configurator = ReadPlanConfigurator::new([1, 2, 3, 4], TagProtocol::Gen2);

        let plan = configurator
            .configure(reader.as_ref(), Duration::from_millis(500))
            .unwrap();

        assert_eq!(reader.plan(), Some(plan));
    }

    #[test]
    fn test_plan_rejected() {
        let reader = reader();
        let configurator = ReadPlanConfigurator::new(Vec::<u8>::new(), TagProtocol::Gen2);

        let err = configurator
            .configure(reader.as_ref(), Duration::from_millis(500))
            .unwrap_err();

        assert!(matches!(err, RelayError::ReadPlan(ReaderError::Rejected(_))));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_listeners_forward_and_uninstall() {
        let reader = reader();
        reader.script_reads([ReadScript::tags(["E1", "E1"])]);

        let (guard, mut feed) = ReadPlanConfigurator::install_listeners(reader.clone());
        assert_eq!(guard.len(), 2);
        assert_eq!(reader.listener_count(), 2);

        reader.start_reading().unwrap();
        reader.stop_reading().unwrap();

        assert_eq!(feed.tags.try_recv().unwrap().epc, "E1");
        assert_eq!(feed.tags.try_recv().unwrap().epc, "E1");

        guard.uninstall();
        assert_eq!(reader.listener_count(), 0);
    }

    #[test]
    fn test_guard_drop_unregisters() {
        let reader = reader();
        {
            let _guard = ReadPlanConfigurator::install_transport_trace(reader.clone());
            let (_listeners, _feed) = ReadPlanConfigurator::install_listeners(reader.clone());
            assert_eq!(reader.listener_count(), 2);
        }
        assert_eq!(reader.listener_count(), 0);
    }
}
