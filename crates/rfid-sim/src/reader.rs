//! Virtual interrogator simulation
//!
//! Provides a simulated reader that implements the full `Interrogator`
//! surface: connect behaviour chosen per port, region parameters, bounded
//! reads, and continuous reading that calls listeners from its own thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rfid_protocol::{
    param, ExceptionListener, Interrogator, ListenerId, ListenerSet, ParamValue, ReadListener,
    ReadPlan, ReaderError, Region, TagRecord, TransportDirection, TransportListener,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// How a virtual reader responds to `connect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectBehavior {
    /// Connect succeeds immediately
    Succeed,
    /// The factory reports no device at this address
    NoSuchDevice,
    /// Connect fails with a transport error
    Refuse,
    /// Connect blocks until the session is destroyed
    Hang,
}

/// Outcome of one scripted read window
#[derive(Debug, Clone, PartialEq)]
pub enum ReadScript {
    /// The window observes these records, duplicates included
    Tags(Vec<TagRecord>),
    /// The window fails
    Fail(ReaderError),
    /// The window observes these records, then fails
    Interrupted(Vec<TagRecord>, ReaderError),
}

impl ReadScript {
    /// A window that observes the given identifiers in order
    pub fn tags<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self::Tags(ids.into_iter().map(TagRecord::new).collect())
    }

    /// A window that observes the given identifiers, then raises `error`
    pub fn interrupted<'a>(ids: impl IntoIterator<Item = &'a str>, error: ReaderError) -> Self {
        Self::Interrupted(ids.into_iter().map(TagRecord::new).collect(), error)
    }
}

/// Configuration for creating a virtual reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualReaderConfig {
    /// Tag population seen when no window is scripted
    pub tags: Vec<String>,
    /// Region the reader starts with
    pub region: Region,
    /// Regions the reader reports as supported
    pub supported_regions: Vec<Region>,
    /// Port the reader answers on (None answers on any port)
    #[serde(default)]
    pub port: Option<String>,
    /// Block reads for their full duration, like hardware does
    #[serde(default)]
    pub realtime: bool,
    /// Interval between listener batches while reading continuously
    #[serde(default = "default_emit_interval_ms")]
    pub emit_interval_ms: u64,
}

fn default_emit_interval_ms() -> u64 {
    100
}

impl Default for VirtualReaderConfig {
    fn default() -> Self {
        Self {
            tags: vec![
                "E2000017221101441890ABCD".to_string(),
                "E2000017221101441890BEEF".to_string(),
            ],
            region: Region::Unspecified,
            supported_regions: vec![Region::NorthAmerica, Region::Europe],
            port: None,
            realtime: false,
            emit_interval_ms: default_emit_interval_ms(),
        }
    }
}

/// Mutable reader state behind the session lock
struct ReaderState {
    connected: bool,
    destroyed: bool,
    lost: bool,
    reading: bool,
    region: Region,
    supported_regions: Vec<Region>,
    plan: Option<ReadPlan>,
    population: Vec<String>,
    script: VecDeque<ReadScript>,
    emitter: Option<JoinHandle<()>>,
}

struct Shared {
    uri: String,
    behavior: ConnectBehavior,
    realtime: bool,
    emit_interval: Duration,
    state: Mutex<ReaderState>,
    wake: Condvar,
    reads: AtomicUsize,
    read_listeners: ListenerSet<ReadListener>,
    exception_listeners: ListenerSet<ExceptionListener>,
    transport_listeners: ListenerSet<TransportListener>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ReaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn trace_frame(&self, direction: TransportDirection, frame: &[u8]) {
        for listener in self.transport_listeners.snapshot() {
            listener(direction, frame);
        }
    }

    fn raise(&self, error: ReaderError) {
        for listener in self.exception_listeners.snapshot() {
            listener(error.clone());
        }
    }

    fn deliver(&self, records: &[TagRecord]) {
        let listeners = self.read_listeners.snapshot();
        for record in records {
            for listener in &listeners {
                listener(record.clone());
            }
        }
    }
}

/// A simulated interrogator session
///
/// Cloning yields another handle onto the same session, so tests can keep a
/// handle to inspect or disturb a reader that the relay owns.
#[derive(Clone)]
pub struct VirtualReader {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for VirtualReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualReader")
            .field("uri", &self.shared.uri)
            .field("behavior", &self.shared.behavior)
            .finish()
    }
}

impl VirtualReader {
    /// Create a reader that connects successfully
    pub fn new(uri: impl Into<String>, config: &VirtualReaderConfig) -> Self {
        Self::with_behavior(uri, config, ConnectBehavior::Succeed)
    }

    /// Create a reader with a specific connect behaviour
    pub fn with_behavior(
        uri: impl Into<String>,
        config: &VirtualReaderConfig,
        behavior: ConnectBehavior,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                uri: uri.into(),
                behavior,
                realtime: config.realtime,
                emit_interval: Duration::from_millis(config.emit_interval_ms.max(1)),
                state: Mutex::new(ReaderState {
                    connected: false,
                    destroyed: false,
                    lost: false,
                    reading: false,
                    region: config.region,
                    supported_regions: config.supported_regions.clone(),
                    plan: None,
                    population: config.tags.clone(),
                    script: VecDeque::new(),
                    emitter: None,
                }),
                wake: Condvar::new(),
                reads: AtomicUsize::new(0),
                read_listeners: ListenerSet::new(),
                exception_listeners: ListenerSet::new(),
                transport_listeners: ListenerSet::new(),
            }),
        }
    }

    /// SDK address this session was created for
    pub fn uri(&self) -> &str {
        &self.shared.uri
    }

    /// Queue outcomes for upcoming read windows
    pub fn script_reads(&self, windows: impl IntoIterator<Item = ReadScript>) {
        self.shared.lock().script.extend(windows);
    }

    /// Replace the unscripted tag population
    pub fn set_population<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        self.shared.lock().population = ids.into_iter().map(str::to_string).collect();
    }

    /// Simulate the transport dropping
    ///
    /// Continuous reading raises `ConnectionLost` to the exception
    /// listeners; later calls fail with the same error.
    pub fn lose_connection(&self) {
        let reading = {
            let mut state = self.shared.lock();
            state.lost = true;
            state.reading
        };
        warn!("Virtual reader {} lost its connection", self.shared.uri);
        if reading {
            self.shared.raise(ReaderError::ConnectionLost);
        }
        self.shared.wake.notify_all();
    }

    /// Whether `connect` has succeeded
    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    /// Whether `destroy` has been called
    pub fn is_destroyed(&self) -> bool {
        self.shared.lock().destroyed
    }

    /// Whether continuous reading is active
    pub fn is_reading(&self) -> bool {
        self.shared.lock().reading
    }

    /// Current region
    pub fn region(&self) -> Region {
        self.shared.lock().region
    }

    /// Read plan last applied
    pub fn plan(&self) -> Option<ReadPlan> {
        self.shared.lock().plan.clone()
    }

    /// Number of bounded reads served
    pub fn read_count(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }

    /// Number of registered read and exception listeners
    pub fn listener_count(&self) -> usize {
        self.shared.read_listeners.len() + self.shared.exception_listeners.len()
    }

    /// Fail unless the session is usable
    fn check_live(state: &ReaderState) -> Result<(), ReaderError> {
        if state.destroyed {
            return Err(ReaderError::Destroyed);
        }
        if state.lost {
            return Err(ReaderError::ConnectionLost);
        }
        if !state.connected {
            return Err(ReaderError::Transport("not connected".to_string()));
        }
        Ok(())
    }

    /// Next window's records, falling back to the population
    fn next_window(state: &mut ReaderState) -> ReadScript {
        if let Some(script) = state.script.pop_front() {
            return script;
        }
        let antennas: Vec<u8> = state
            .plan
            .as_ref()
            .map(|p| p.antennas().to_vec())
            .unwrap_or_else(|| vec![1]);
        let records = state
            .population
            .iter()
            .enumerate()
            .map(|(i, epc)| {
                TagRecord::new(epc.clone())
                    .with_antenna(antennas[i % antennas.len()])
                    .with_rssi(-50 - (i as i32 % 20))
                    .stamped()
            })
            .collect();
        ReadScript::Tags(records)
    }

    fn run_emitter(shared: Arc<Shared>, window: ReadScript) {
        match window {
            ReadScript::Fail(error) => {
                debug!("Virtual reader {} raising {}", shared.uri, error);
                shared.raise(error);
            }
            ReadScript::Interrupted(records, error) => {
                shared.deliver(&records);
                debug!("Virtual reader {} raising {}", shared.uri, error);
                shared.raise(error);
            }
            ReadScript::Tags(records) => loop {
                shared.deliver(&records);
                trace!("Virtual reader {} emitted {} records", shared.uri, records.len());

                let state = shared.lock();
                let (state, _) = shared
                    .wake
                    .wait_timeout_while(state, shared.emit_interval, |s| {
                        s.reading && !s.lost && !s.destroyed
                    })
                    .unwrap_or_else(PoisonError::into_inner);
                if !state.reading || state.lost || state.destroyed {
                    break;
                }
            },
        }
    }

    fn join_emitter(&self) {
        let handle = self.shared.lock().emitter.take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Virtual reader {} emitter panicked", self.shared.uri);
            }
        }
    }
}

impl Interrogator for VirtualReader {
    fn connect(&self) -> Result<(), ReaderError> {
        self.shared.trace_frame(TransportDirection::Tx, &[0xFF, 0x00, 0x03, 0x1D, 0x0C]);

        match self.shared.behavior {
            ConnectBehavior::Succeed => {
                let mut state = self.shared.lock();
                if state.destroyed {
                    return Err(ReaderError::Destroyed);
                }
                state.connected = true;
                drop(state);
                self.shared.trace_frame(TransportDirection::Rx, &[0xFF, 0x00, 0x03, 0x00, 0x00]);
                info!("Virtual reader connected at {}", self.shared.uri);
                Ok(())
            }
            ConnectBehavior::NoSuchDevice => {
                Err(ReaderError::NoSuchDevice(self.shared.uri.clone()))
            }
            ConnectBehavior::Refuse => Err(ReaderError::Transport(format!(
                "no response from {}",
                self.shared.uri
            ))),
            ConnectBehavior::Hang => {
                debug!("Virtual reader at {} hanging in connect", self.shared.uri);
                let state = self.shared.lock();
                let _state = self
                    .shared
                    .wake
                    .wait_while(state, |s| !s.destroyed)
                    .unwrap_or_else(PoisonError::into_inner);
                Err(ReaderError::Destroyed)
            }
        }
    }

    fn param_get(&self, path: &str) -> Result<ParamValue, ReaderError> {
        let state = self.shared.lock();
        Self::check_live(&state)?;
        match path {
            param::REGION_ID => Ok(ParamValue::Region(state.region)),
            param::SUPPORTED_REGIONS => Ok(ParamValue::Regions(state.supported_regions.clone())),
            param::READ_PLAN => state
                .plan
                .clone()
                .map(ParamValue::ReadPlan)
                .ok_or_else(|| ReaderError::Rejected("no read plan set".to_string())),
            other => Err(ReaderError::UnsupportedParameter(other.to_string())),
        }
    }

    fn param_set(&self, path: &str, value: ParamValue) -> Result<(), ReaderError> {
        let mut state = self.shared.lock();
        Self::check_live(&state)?;
        match path {
            param::REGION_ID => {
                let region = value.into_region(path)?;
                if !state.supported_regions.contains(&region) {
                    return Err(ReaderError::Rejected(format!("region {} not supported", region)));
                }
                state.region = region;
                Ok(())
            }
            param::READ_PLAN => {
                let plan = value.into_read_plan(path)?;
                if plan.antennas().is_empty() {
                    return Err(ReaderError::Rejected("read plan has no antennas".to_string()));
                }
                if !state.region.is_set() {
                    return Err(ReaderError::Rejected("region not set".to_string()));
                }
                state.plan = Some(plan);
                Ok(())
            }
            param::SUPPORTED_REGIONS => {
                Err(ReaderError::Rejected(format!("{} is read-only", path)))
            }
            other => Err(ReaderError::UnsupportedParameter(other.to_string())),
        }
    }

    fn read(&self, timeout: Duration) -> Result<Vec<TagRecord>, ReaderError> {
        let window = {
            let mut state = self.shared.lock();
            Self::check_live(&state)?;
            Self::next_window(&mut state)
        };
        self.shared.reads.fetch_add(1, Ordering::SeqCst);
        self.shared.trace_frame(TransportDirection::Tx, &[0xFF, 0x02, 0x21]);

        if self.shared.realtime {
            let deadline = Instant::now() + timeout;
            let mut state = self.shared.lock();
            while !state.destroyed && !state.lost {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                state = self
                    .shared
                    .wake
                    .wait_timeout(state, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            Self::check_live(&state)?;
        }

        match window {
            ReadScript::Tags(records) => {
                self.shared.trace_frame(TransportDirection::Rx, &[0xFF, 0x01, 0x29]);
                Ok(records)
            }
            ReadScript::Fail(error) | ReadScript::Interrupted(_, error) => Err(error),
        }
    }

    fn add_read_listener(&self, listener: ReadListener) -> ListenerId {
        self.shared.read_listeners.add(listener)
    }

    fn remove_read_listener(&self, id: ListenerId) -> bool {
        self.shared.read_listeners.remove(id)
    }

    fn add_read_exception_listener(&self, listener: ExceptionListener) -> ListenerId {
        self.shared.exception_listeners.add(listener)
    }

    fn remove_read_exception_listener(&self, id: ListenerId) -> bool {
        self.shared.exception_listeners.remove(id)
    }

    fn add_transport_listener(&self, listener: TransportListener) -> Option<ListenerId> {
        Some(self.shared.transport_listeners.add(listener))
    }

    fn remove_transport_listener(&self, id: ListenerId) -> bool {
        self.shared.transport_listeners.remove(id)
    }

    fn start_reading(&self) -> Result<(), ReaderError> {
        let mut state = self.shared.lock();
        Self::check_live(&state)?;
        if state.reading {
            return Ok(());
        }
        state.reading = true;
        let window = Self::next_window(&mut state);
        let shared = self.shared.clone();
        state.emitter = Some(std::thread::spawn(move || Self::run_emitter(shared, window)));
        debug!("Virtual reader {} started continuous reading", self.shared.uri);
        Ok(())
    }

    fn stop_reading(&self) -> Result<(), ReaderError> {
        {
            let mut state = self.shared.lock();
            state.reading = false;
        }
        self.shared.wake.notify_all();
        self.join_emitter();
        debug!("Virtual reader {} stopped continuous reading", self.shared.uri);

        let state = self.shared.lock();
        if state.lost {
            return Err(ReaderError::ConnectionLost);
        }
        Ok(())
    }

    fn destroy(&self) {
        {
            let mut state = self.shared.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.connected = false;
            state.reading = false;
        }
        self.shared.wake.notify_all();
        self.join_emitter();
        self.shared.read_listeners.clear();
        self.shared.exception_listeners.clear();
        self.shared.transport_listeners.clear();
        info!("Virtual reader at {} destroyed", self.shared.uri);
    }
}
