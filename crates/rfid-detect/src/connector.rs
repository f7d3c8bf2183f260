//! Bounded-time reader discovery
//!
//! Each candidate port gets one connect attempt. The blocking SDK connect
//! runs on the blocking pool under a timeout; when the timeout fires the
//! half-open session is destroyed before the next port is tried, which also
//! unblocks the abandoned connect call.

use std::sync::Arc;
use std::time::Duration;

use rfid_protocol::{reader_uri, Interrogator, InterrogatorFactory, ReaderError};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::DetectError;
use crate::scanner::PortDescriptor;

/// Configuration for discovery
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Upper bound on each connect attempt
    pub attempt_timeout: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(3),
        }
    }
}

/// An exclusively owned, connected reader bound to its port
///
/// The session is destroyed by [`ReaderSession::close`] or, failing that,
/// when it is dropped.
pub struct ReaderSession<D: Interrogator> {
    device: Arc<D>,
    port: PortDescriptor,
    uri: String,
    closed: bool,
}

impl<D: Interrogator> ReaderSession<D> {
    fn new(device: Arc<D>, port: PortDescriptor, uri: String) -> Self {
        Self {
            device,
            port,
            uri,
            closed: false,
        }
    }

    /// The connected device
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Port the reader is bound to
    pub fn port(&self) -> &PortDescriptor {
        &self.port
    }

    /// SDK address the session was opened with
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Destroy the device session
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.device.destroy();
            info!("Released reader on {}", self.port.name);
        }
    }
}

impl<D: Interrogator> Drop for ReaderSession<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: Interrogator> std::fmt::Debug for ReaderSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSession")
            .field("port", &self.port.name)
            .field("uri", &self.uri)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Finds the port a reader is attached to
pub struct DeviceConnector {
    config: ConnectorConfig,
}

impl DeviceConnector {
    /// Create a connector with default configuration
    pub fn new() -> Self {
        Self {
            config: ConnectorConfig::default(),
        }
    }

    /// Create a connector with custom configuration
    pub fn with_config(config: ConnectorConfig) -> Self {
        Self { config }
    }

    /// Try each port in order and return the first connected session
    ///
    /// Ports after the first success are never touched. Each port is tried
    /// exactly once, whatever the failure.
    pub async fn connect<F>(
        &self,
        factory: &F,
        ports: &[PortDescriptor],
    ) -> Result<ReaderSession<F::Device>, DetectError>
    where
        F: InterrogatorFactory,
    {
        for (index, port) in ports.iter().enumerate() {
            info!(
                "Trying reader on {} ({}/{})",
                port.label(),
                index + 1,
                ports.len()
            );

            match self.attempt(factory, port).await {
                Ok(session) => {
                    info!("Reader connected on {}", port.name);
                    return Ok(session);
                }
                Err(e) => warn!("No reader on {}: {}", port.name, e),
            }
        }

        Err(DetectError::DeviceNotFound {
            attempted: ports.len(),
        })
    }

    /// One bounded connect attempt on one port
    async fn attempt<F>(
        &self,
        factory: &F,
        port: &PortDescriptor,
    ) -> Result<ReaderSession<F::Device>, ReaderError>
    where
        F: InterrogatorFactory,
    {
        let uri = reader_uri(&port.name);
        debug!("Creating reader session for {}", uri);
        let device = Arc::new(factory.create(&uri)?);
        let pending = PendingSession::new(device.clone());

        let worker = device.clone();
        let task = tokio::task::spawn_blocking(move || worker.connect());

        match timeout(self.config.attempt_timeout, task).await {
            Ok(Ok(Ok(()))) => {
                pending.disarm();
                Ok(ReaderSession::new(device, port.clone(), uri))
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(ReaderError::Transport(format!("connect task failed: {}", e))),
            Err(_) => {
                // Destroying unblocks the abandoned connect on the blocking pool
                drop(pending);
                Err(ReaderError::Timeout(
                    self.config.attempt_timeout.as_millis() as u64,
                ))
            }
        }
    }
}

/// Destroys a half-open session unless the attempt succeeds
///
/// Also covers the attempt future being dropped mid-connect.
struct PendingSession<D: Interrogator> {
    device: Option<Arc<D>>,
}

impl<D: Interrogator> PendingSession<D> {
    fn new(device: Arc<D>) -> Self {
        Self {
            device: Some(device),
        }
    }

    fn disarm(mut self) {
        self.device = None;
    }
}

impl<D: Interrogator> Drop for PendingSession<D> {
    fn drop(&mut self) {
        if let Some(device) = self.device.take() {
            device.destroy();
        }
    }
}

impl Default for DeviceConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfid_sim::{ConnectBehavior, VirtualReaderConfig, VirtualReaderFactory};

    use crate::scanner::{FixedPorts, PortEnumerator};

    fn connector(timeout_ms: u64) -> DeviceConnector {
        DeviceConnector::with_config(ConnectorConfig {
            attempt_timeout: Duration::from_millis(timeout_ms),
        })
    }

    fn ports(names: &[&str]) -> Vec<PortDescriptor> {
        FixedPorts::from_names(names.iter().copied())
            .enumerate_ports()
            .unwrap()
    }

    #[test]
    fn test_connector_config_default() {
        let config = ConnectorConfig::default();
        assert_eq!(config.attempt_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig::default())
            .with_port("P1", ConnectBehavior::Refuse)
            .with_port("P2", ConnectBehavior::NoSuchDevice)
            .with_port("P3", ConnectBehavior::Succeed)
            .with_port("P4", ConnectBehavior::Succeed);

        let session = connector(200)
            .connect(&factory, &ports(&["P1", "P2", "P3", "P4"]))
            .await
            .unwrap();

        assert_eq!(session.port().name, "P3");
        assert_eq!(session.uri(), "tmr:///P3");
        assert_eq!(factory.attempts(), vec!["P1", "P2", "P3"]);

        // The refused attempt was cleaned up
        assert!(factory.reader_for("P1").unwrap().is_destroyed());
        assert!(session.device().is_connected());
    }

    #[tokio::test]
    async fn test_not_found_after_exhausting_ports() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig {
            port: Some("elsewhere".to_string()),
            ..Default::default()
        });

        let err = connector(200)
            .connect(&factory, &ports(&["COM1", "COM2"]))
            .await
            .unwrap_err();

        assert!(matches!(err, DetectError::DeviceNotFound { attempted: 2 }));
        assert_eq!(factory.attempts(), vec!["COM1", "COM2"]);
    }

    #[tokio::test]
    async fn test_empty_port_list() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig::default());
        let err = connector(200).connect(&factory, &[]).await.unwrap_err();
        assert!(matches!(err, DetectError::DeviceNotFound { attempted: 0 }));
    }

    #[tokio::test]
    async fn test_hung_connect_abandoned_and_destroyed() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig::default())
            .with_port("HUNG", ConnectBehavior::Hang)
            .with_port("GOOD", ConnectBehavior::Succeed);

        let started = std::time::Instant::now();
        let session = connector(50)
            .connect(&factory, &ports(&["HUNG", "GOOD"]))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(session.port().name, "GOOD");

        // The hung session was released before GOOD was created
        let created = factory.created();
        assert_eq!(created.len(), 2);
        assert!(created[0].is_destroyed());
        assert!(!created[1].is_destroyed());
    }

    #[tokio::test]
    async fn test_cancelled_discovery_destroys_pending_session() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig::default())
            .with_port("HUNG", ConnectBehavior::Hang);
        let connector = connector(5_000);
        let ports = ports(&["HUNG"]);

        let result = timeout(
            Duration::from_millis(50),
            connector.connect(&factory, &ports),
        )
        .await;
        assert!(result.is_err());
        assert!(factory.reader_for("HUNG").unwrap().is_destroyed());
    }

    #[tokio::test]
    async fn test_session_destroyed_on_close_and_drop() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig::default());

        let session = connector(200).connect(&factory, &ports(&["A"])).await.unwrap();
        let reader = factory.reader_for("A").unwrap();
        session.close();
        assert!(reader.is_destroyed());

        let session = connector(200).connect(&factory, &ports(&["B"])).await.unwrap();
        let reader = factory.reader_for("B").unwrap();
        drop(session);
        assert!(reader.is_destroyed());
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use rfid_sim::{ConnectBehavior, VirtualReaderConfig, VirtualReaderFactory};

    proptest! {
        #[test]
        fn discovery_stops_at_first_answering_port(
            failures in prop::collection::vec(any::<bool>(), 0..6),
            trailing in 0usize..3,
        ) {
            let k = failures.len();
            let names: Vec<String> = (0..k + 1 + trailing).map(|i| format!("P{}", i)).collect();

            let mut factory = VirtualReaderFactory::new(VirtualReaderConfig::default());
            for (name, refuse) in names.iter().zip(&failures) {
                let behavior = if *refuse {
                    ConnectBehavior::Refuse
                } else {
                    ConnectBehavior::NoSuchDevice
                };
                factory = factory.with_port(name, behavior);
            }
            let ports: Vec<PortDescriptor> =
                names.iter().map(|n| PortDescriptor::named(n.as_str())).collect();

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let connector = DeviceConnector::with_config(ConnectorConfig {
                attempt_timeout: Duration::from_millis(200),
            });
            let session = runtime.block_on(connector.connect(&factory, &ports)).unwrap();

            prop_assert_eq!(&session.port().name, &names[k]);
            prop_assert_eq!(factory.attempts(), names[..=k].to_vec());
            session.close();
        }
    }
}
