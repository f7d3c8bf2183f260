//! Virtual interrogator factory
//!
//! Creates `VirtualReader` sessions from SDK addresses and records every
//! attempt, so discovery order and session cleanup can be checked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rfid_protocol::{port_from_uri, InterrogatorFactory, ReaderError};
use tracing::debug;

use crate::reader::{ConnectBehavior, ReadScript, VirtualReader, VirtualReaderConfig};

#[derive(Default)]
struct FactoryState {
    behaviors: HashMap<String, ConnectBehavior>,
    scripts: HashMap<String, Vec<ReadScript>>,
    attempts: Vec<String>,
    created: Vec<VirtualReader>,
}

/// Factory producing simulated readers keyed by port
#[derive(Clone)]
pub struct VirtualReaderFactory {
    config: VirtualReaderConfig,
    state: Arc<Mutex<FactoryState>>,
}

impl VirtualReaderFactory {
    /// Create a factory from configuration
    ///
    /// The reader answers on `config.port`, or on every port when unset.
    pub fn new(config: VirtualReaderConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(FactoryState::default())),
        }
    }

    /// Set how the reader on `port` responds to connect
    pub fn with_port(self, port: &str, behavior: ConnectBehavior) -> Self {
        self.lock().behaviors.insert(port.to_string(), behavior);
        self
    }

    /// Queue read windows for the reader created on `port`
    pub fn with_reads(self, port: &str, windows: impl IntoIterator<Item = ReadScript>) -> Self {
        self.lock()
            .scripts
            .entry(port.to_string())
            .or_default()
            .extend(windows);
        self
    }

    /// Ports passed to `create`, in order
    pub fn attempts(&self) -> Vec<String> {
        self.lock().attempts.clone()
    }

    /// Every session created so far
    pub fn created(&self) -> Vec<VirtualReader> {
        self.lock().created.clone()
    }

    /// The most recent session created for `port`
    pub fn reader_for(&self, port: &str) -> Option<VirtualReader> {
        let uri = rfid_protocol::reader_uri(port);
        self.lock()
            .created
            .iter()
            .rev()
            .find(|r| r.uri() == uri)
            .cloned()
    }

    fn behavior_for(&self, port: &str, state: &FactoryState) -> ConnectBehavior {
        if let Some(behavior) = state.behaviors.get(port) {
            return behavior.clone();
        }
        match &self.config.port {
            Some(answering) if answering != port => ConnectBehavior::NoSuchDevice,
            _ => ConnectBehavior::Succeed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, FactoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InterrogatorFactory for VirtualReaderFactory {
    type Device = VirtualReader;

    fn create(&self, uri: &str) -> Result<VirtualReader, ReaderError> {
        let port = port_from_uri(uri).ok_or_else(|| ReaderError::NoSuchDevice(uri.to_string()))?;

        let mut state = self.lock();
        state.attempts.push(port.to_string());

        let behavior = self.behavior_for(port, &state);
        debug!("Creating virtual reader at {} ({:?})", uri, behavior);
        if behavior == ConnectBehavior::NoSuchDevice {
            return Err(ReaderError::NoSuchDevice(port.to_string()));
        }

        let reader = VirtualReader::with_behavior(uri, &self.config, behavior);
        if let Some(windows) = state.scripts.remove(port) {
            reader.script_reads(windows);
        }
        state.created.push(reader.clone());
        Ok(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfid_protocol::Interrogator;

    #[test]
    fn test_answers_only_on_configured_port() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig {
            port: Some("COM_B".to_string()),
            ..Default::default()
        });

        assert_eq!(
            factory.create("tmr:///COM_A").unwrap_err(),
            ReaderError::NoSuchDevice("COM_A".to_string())
        );
        let reader = factory.create("tmr:///COM_B").unwrap();
        assert!(reader.connect().is_ok());
        assert_eq!(factory.attempts(), vec!["COM_A", "COM_B"]);
    }

    #[test]
    fn test_explicit_behavior_wins() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig::default())
            .with_port("/dev/ttyACM0", ConnectBehavior::Refuse);

        let reader = factory.create("tmr:///dev/ttyACM0").unwrap();
        assert!(matches!(reader.connect(), Err(ReaderError::Transport(_))));
        assert!(factory.reader_for("/dev/ttyACM0").is_some());
    }

    #[test]
    fn test_scripts_go_to_created_reader() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig::default())
            .with_reads("COM_A", [ReadScript::tags(["E9"])]);

        let reader = factory.create("tmr:///COM_A").unwrap();
        reader.connect().unwrap();
        let records = reader.read(std::time::Duration::from_millis(1)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].epc, "E9");
    }

    #[test]
    fn test_rejects_foreign_uri() {
        let factory = VirtualReaderFactory::new(VirtualReaderConfig::default());
        assert!(factory.create("llrp://10.0.0.5").is_err());
        assert!(factory.attempts().is_empty());
    }
}
