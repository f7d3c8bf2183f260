//! Relay main loop
//!
//! One task drives the relay: setup runs strictly in order
//! (discovery, region, read plan, serial bridge), then read cycles repeat
//! until the reader is lost or a shutdown command arrives. Every exit path
//! passes through shutdown, which releases whatever setup acquired.

use std::sync::Arc;

use rfid_detect::{ConnectorConfig, DeviceConnector, PortEnumerator, ReaderSession};
use rfid_protocol::{Interrogator, InterrogatorFactory, ReaderError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::aggregator::TagAggregator;
use crate::config::{EmptyMessagePolicy, RelayConfig};
use crate::encoder::MessageEncoder;
use crate::error::RelayError;
use crate::events::{RelayEvent, RelayState};
use crate::plan::{ListenerGuard, ReadPlanConfigurator};
use crate::region::RegionResolver;
use crate::serial::{select_bridge_port, SerialBridge, SerialOpener};
use crate::task::on_device;

/// Commands accepted by a running relay
#[derive(Debug)]
pub enum RelayCommand {
    /// Stop cycling and release the reader and serial port
    Shutdown,
}

/// How a relay ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// A shutdown command arrived or the command channel closed
    Interrupted,
}

/// Everything setup acquired, released in reverse order
struct Resources<D: Interrogator, Io> {
    session: Option<ReaderSession<D>>,
    trace: Option<ListenerGuard<D>>,
    aggregator: Option<TagAggregator<D>>,
    bridge: Option<SerialBridge<Io>>,
}

impl<D, Io> Resources<D, Io>
where
    D: Interrogator,
    Io: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn new() -> Self {
        Self {
            session: None,
            trace: None,
            aggregator: None,
            bridge: None,
        }
    }

    async fn release(&mut self) {
        if let Some(mut aggregator) = self.aggregator.take() {
            aggregator.shutdown().await;
        }
        if let Some(trace) = self.trace.take() {
            trace.uninstall();
        }
        if let Some(bridge) = self.bridge.take() {
            bridge.close().await;
        }
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}

/// The reader-to-microcontroller relay
pub struct Relay<F, P, S> {
    config: RelayConfig,
    factory: F,
    ports: P,
    serial: S,
    event_tx: Option<mpsc::Sender<RelayEvent>>,
}

impl<F, P, S> Relay<F, P, S>
where
    F: InterrogatorFactory,
    P: PortEnumerator,
    S: SerialOpener,
{
    /// Create a relay
    ///
    /// * `factory` - creates reader sessions from SDK addresses
    /// * `ports` - lists candidate ports for both the reader and the bridge
    /// * `serial` - opens the bridge port
    pub fn new(config: RelayConfig, factory: F, ports: P, serial: S) -> Self {
        Self {
            config,
            factory,
            ports,
            serial,
            event_tx: None,
        }
    }

    /// Emit progress on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<RelayEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Run setup and then cycle until shutdown or a fatal error
    pub async fn run(
        self,
        mut cmd_rx: mpsc::Receiver<RelayCommand>,
    ) -> Result<RelayExit, RelayError> {
        let mut resources = Resources::new();
        let outcome = self.operate(&mut resources, &mut cmd_rx).await;

        resources.release().await;
        self.enter(RelayState::ShuttingDown);

        match &outcome {
            Ok(exit) => info!("Relay stopped: {:?}", exit),
            Err(e) => error!("Relay stopped: {}", e),
        }
        outcome
    }

    async fn operate(
        &self,
        resources: &mut Resources<F::Device, S::Io>,
        cmd_rx: &mut mpsc::Receiver<RelayCommand>,
    ) -> Result<RelayExit, RelayError> {
        let device = tokio::select! {
            device = self.setup(resources) => device?,
            _ = cmd_rx.recv() => {
                info!("Shutdown requested during setup");
                return Ok(RelayExit::Interrupted);
            }
        };
        self.cycle(resources, &device, cmd_rx).await
    }

    async fn setup(
        &self,
        resources: &mut Resources<F::Device, S::Io>,
    ) -> Result<Arc<F::Device>, RelayError> {
        self.enter(RelayState::Discovering);
        let ports = self.ports.enumerate_ports()?;
        let connector = DeviceConnector::with_config(ConnectorConfig {
            attempt_timeout: self.config.connect_timeout,
        });
        let session = connector.connect(&self.factory, &ports).await?;
        let device = session.device().clone();
        let reader_port = session.port().name.clone();
        resources.session = Some(session);
        self.emit(RelayEvent::ReaderBound {
            port: reader_port.clone(),
        });

        self.enter(RelayState::RegionResolving);
        let degraded = match on_device(&device, |d| RegionResolver::ensure_region(d)).await? {
            Ok(region) => {
                self.emit(RelayEvent::RegionApplied {
                    region: Some(region),
                });
                false
            }
            Err(RelayError::ConnectionLost) => return Err(RelayError::ConnectionLost),
            Err(e) if self.config.require_region => return Err(e),
            Err(e) => {
                warn!("Continuing without a region: {}", e);
                self.emit(RelayEvent::RegionApplied { region: None });
                true
            }
        };

        self.enter(RelayState::PlanConfiguring);
        let configurator =
            ReadPlanConfigurator::new(self.config.antennas.iter().copied(), self.config.protocol);
        let window = self.config.window;
        match on_device(&device, move |d| configurator.configure(d, window)).await? {
            Ok(_) => {}
            Err(RelayError::ReadPlan(e)) if degraded => {
                warn!("Continuing without a read plan: {}", e);
            }
            Err(e) => return Err(e),
        }
        if self.config.trace_transport {
            resources.trace = Some(ReadPlanConfigurator::install_transport_trace(device.clone()));
        }
        resources.aggregator = Some(TagAggregator::new(self.config.aggregation, &device));

        self.enter(RelayState::SerialBinding);
        let port = select_bridge_port(&ports, &reader_port, self.config.serial_port.as_deref())?;
        let bridge = self.serial.open(&port.name, self.config.baud_rate)?;
        info!("Serial bridge bound to {}", port.label());
        resources.bridge = Some(bridge);
        self.emit(RelayEvent::SerialBound { port: port.name });

        Ok(device)
    }

    async fn cycle(
        &self,
        resources: &mut Resources<F::Device, S::Io>,
        device: &Arc<F::Device>,
        cmd_rx: &mut mpsc::Receiver<RelayCommand>,
    ) -> Result<RelayExit, RelayError> {
        let (Some(aggregator), Some(bridge)) =
            (resources.aggregator.as_mut(), resources.bridge.as_mut())
        else {
            return Err(RelayError::Reader(ReaderError::Transport(
                "relay setup incomplete".to_string(),
            )));
        };

        self.enter(RelayState::Cycling);
        let encoder = MessageEncoder::new(self.config.item_pacing);
        let mut cycle: u64 = 0;

        loop {
            cycle += 1;

            let window = tokio::select! {
                window = aggregator.collect(device, self.config.window) => window?,
                _ = cmd_rx.recv() => {
                    info!("Shutdown requested");
                    return Ok(RelayExit::Interrupted);
                }
            };

            if let Some(error) = window.failure {
                warn!(
                    "Cycle {}: {}, sending no tags",
                    cycle,
                    RelayError::ReadFailure(error.clone())
                );
                self.emit(RelayEvent::ReadFailed { cycle, error });
            }

            let tags = window.tags.len();
            let message = encoder.assemble(&window.tags).await;

            if message.is_empty() && self.config.empty_message == EmptyMessagePolicy::Skip {
                debug!("Cycle {}: no tags, message skipped", cycle);
                self.emit(RelayEvent::MessageSkipped { cycle });
            } else {
                match bridge.send(&message).await {
                    Ok(()) => {
                        info!(
                            "Cycle {}: {} tag(s), {} byte(s) written to {}",
                            cycle,
                            tags,
                            message.len(),
                            bridge.port()
                        );
                        self.emit(RelayEvent::CycleCompleted {
                            cycle,
                            tags,
                            message,
                        });
                    }
                    Err(e) => {
                        warn!("Cycle {}: message dropped: {}", cycle, e);
                        self.emit(RelayEvent::WriteFailed {
                            cycle,
                            error: e.to_string(),
                        });
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.inter_cycle) => {}
                _ = cmd_rx.recv() => {
                    info!("Shutdown requested");
                    return Ok(RelayExit::Interrupted);
                }
            }
        }
    }

    fn enter(&self, state: RelayState) {
        info!("Relay state: {:?}", state);
        self.emit(RelayEvent::StateChanged(state));
    }

    /// Never waits on the observer; a full channel drops the event
    fn emit(&self, event: RelayEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                debug!("Event channel full, dropping {:?}", event);
            }
        }
    }
}
