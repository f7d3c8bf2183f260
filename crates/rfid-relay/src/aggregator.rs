//! Tag aggregation over bounded read windows
//!
//! Two interchangeable strategies collect the unique identifiers seen in a
//! window:
//!
//! - **Polling**: one blocking `read` bounded by the window length
//! - **Listener**: continuous reading while tag callbacks stream in through
//!   a channel; the window is closed by stopping the reader after the
//!   duration elapses
//!
//! Both start every window from an empty set, so nothing seen in one window
//! is reported in the next. A window that hits a reader fault reports no
//! tags under either strategy.

use std::sync::Arc;
use std::time::Duration;

use rfid_protocol::{Interrogator, ReaderError, TagSet};
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, warn};

use crate::config::AggregationStrategy;
use crate::error::RelayError;
use crate::plan::{ListenerGuard, ReadPlanConfigurator, ReaderFeed};
use crate::task::on_device;

/// Result of one read window
#[derive(Debug, Default)]
pub struct TagWindow {
    /// Unique identifiers seen
    pub tags: TagSet,
    /// Non-fatal fault hit during the window
    pub failure: Option<ReaderError>,
}

impl TagWindow {
    fn failed(error: ReaderError) -> Self {
        Self {
            tags: TagSet::new(),
            failure: Some(error),
        }
    }
}

/// Single-shot synchronous read per window
#[derive(Debug, Default)]
pub struct PollingAggregator;

impl PollingAggregator {
    /// Read for `window` and deduplicate the observations
    ///
    /// A failed read yields an empty window; only a lost connection is an
    /// error.
    pub async fn read_window<D: Interrogator>(
        &self,
        device: &Arc<D>,
        window: Duration,
    ) -> Result<TagWindow, RelayError> {
        match on_device(device, move |d| d.read(window)).await? {
            Ok(records) => {
                let observed = records.len();
                let tags: TagSet = records.into_iter().collect();
                debug!("Read {} observations, {} unique", observed, tags.len());
                Ok(TagWindow {
                    tags,
                    failure: None,
                })
            }
            Err(e) if e.is_connection_lost() => Err(RelayError::ConnectionLost),
            Err(e) => {
                warn!("Read window failed: {}", e);
                Ok(TagWindow::failed(e))
            }
        }
    }
}

/// Continuous reading fed by tag callbacks
pub struct ListenerAggregator<D: Interrogator> {
    device: Arc<D>,
    feed: ReaderFeed,
    guard: Option<ListenerGuard<D>>,
    reading: bool,
}

impl<D: Interrogator> ListenerAggregator<D> {
    /// Install callbacks on the device and aggregate from them
    pub fn install(device: Arc<D>) -> Self {
        let (guard, feed) = ReadPlanConfigurator::install_listeners(device.clone());
        Self {
            device,
            feed,
            guard: Some(guard),
            reading: false,
        }
    }

    /// Begin a window: discard stale callbacks, then start reading
    pub async fn start_window(&mut self) -> Result<Option<ReaderError>, RelayError> {
        let stale = self.discard_stale()?;
        if stale > 0 {
            debug!("Discarded {} observations from outside the window", stale);
        }

        match on_device(&self.device, |d| d.start_reading()).await? {
            Ok(()) => {
                self.reading = true;
                Ok(None)
            }
            Err(e) if e.is_connection_lost() => Err(RelayError::ConnectionLost),
            Err(e) => {
                warn!("Failed to start reading: {}", e);
                Ok(Some(e))
            }
        }
    }

    /// Collect callbacks for `duration`, then stop reading
    pub async fn end_window(&mut self, duration: Duration) -> Result<TagWindow, RelayError> {
        let mut window = TagWindow::default();
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                Some(record) = self.feed.tags.recv() => {
                    window.tags.observe(record);
                }
                Some(fault) = self.feed.faults.recv() => {
                    if fault.is_connection_lost() {
                        let _ = self.stop().await;
                        return Err(RelayError::ConnectionLost);
                    }
                    warn!("Reader fault during window: {}", fault);
                    window.failure = Some(fault);
                }
            }
        }

        if let Some(e) = self.stop().await {
            if e.is_connection_lost() {
                return Err(RelayError::ConnectionLost);
            }
            warn!("Failed to stop reading: {}", e);
            window.failure.get_or_insert(e);
        }

        // Callbacks delivered before the reader stopped still belong here
        while let Ok(record) = self.feed.tags.try_recv() {
            window.tags.observe(record);
        }
        while let Ok(fault) = self.feed.faults.try_recv() {
            if fault.is_connection_lost() {
                return Err(RelayError::ConnectionLost);
            }
            warn!("Reader fault during window: {}", fault);
            window.failure.get_or_insert(fault);
        }

        // A faulted window reports no tags, the same as a failed poll
        if window.failure.is_some() && !window.tags.is_empty() {
            debug!("Dropping {} tags from a faulted window", window.tags.len());
            window.tags = TagSet::new();
        }

        Ok(window)
    }

    /// Stop reading and unregister the callbacks
    pub async fn shutdown(&mut self) {
        if let Some(e) = self.stop().await {
            debug!("Stop reading during shutdown failed: {}", e);
        }
        if let Some(guard) = self.guard.take() {
            guard.uninstall();
        }
    }

    async fn stop(&mut self) -> Option<ReaderError> {
        if !self.reading {
            return None;
        }
        self.reading = false;
        match on_device(&self.device, |d| d.stop_reading()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(e) => Some(ReaderError::Transport(e.to_string())),
        }
    }

    /// Drop everything queued before this window
    fn discard_stale(&mut self) -> Result<usize, RelayError> {
        let mut stale = 0;
        loop {
            match self.feed.tags.try_recv() {
                Ok(_) => stale += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        while let Ok(fault) = self.feed.faults.try_recv() {
            if fault.is_connection_lost() {
                return Err(RelayError::ConnectionLost);
            }
            debug!("Discarding fault from outside the window: {}", fault);
        }
        Ok(stale)
    }
}

/// A tag aggregation strategy
///
/// This enum wraps the strategies to provide one interface for the relay's
/// cycle loop.
pub enum TagAggregator<D: Interrogator> {
    /// One bounded read per window
    Polling(PollingAggregator),
    /// Continuous reading with callbacks
    Listener(ListenerAggregator<D>),
}

impl<D: Interrogator> TagAggregator<D> {
    /// Create the configured strategy; the listener strategy registers its
    /// callbacks on `device` immediately
    pub fn new(strategy: AggregationStrategy, device: &Arc<D>) -> Self {
        match strategy {
            AggregationStrategy::Polling => Self::Polling(PollingAggregator),
            AggregationStrategy::Listener => {
                Self::Listener(ListenerAggregator::install(device.clone()))
            }
        }
    }

    /// Collect one window of unique tags
    pub async fn collect(
        &mut self,
        device: &Arc<D>,
        window: Duration,
    ) -> Result<TagWindow, RelayError> {
        match self {
            Self::Polling(p) => p.read_window(device, window).await,
            Self::Listener(l) => {
                if let Some(e) = l.start_window().await? {
                    // Still honour the window length so a failing reader
                    // cannot spin the cycle loop
                    tokio::time::sleep(window).await;
                    return Ok(TagWindow::failed(e));
                }
                l.end_window(window).await
            }
        }
    }

    /// Release strategy resources
    pub async fn shutdown(&mut self) {
        if let Self::Listener(l) = self {
            l.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfid_protocol::Region;
    use rfid_sim::{ReadScript, VirtualReader, VirtualReaderConfig};

    const WINDOW: Duration = Duration::from_millis(20);

    fn reader() -> Arc<VirtualReader> {
        let config = VirtualReaderConfig {
            region: Region::NorthAmerica,
            tags: vec![],
            ..Default::default()
        };
        let reader = VirtualReader::new("tmr:///COM_A", &config);
        reader.connect().unwrap();
        Arc::new(reader)
    }

    #[tokio::test]
    async fn test_polling_deduplicates() {
        let reader = reader();
        reader.script_reads([ReadScript::tags(["E1", "E1", "E2"])]);

        let window = PollingAggregator.read_window(&reader, WINDOW).await.unwrap();

        assert_eq!(window.tags.len(), 2);
        assert!(window.tags.contains("E1"));
        assert!(window.tags.contains("E2"));
        assert!(window.failure.is_none());
    }

    #[tokio::test]
    async fn test_polling_failure_yields_empty_window() {
        let reader = reader();
        reader.script_reads([ReadScript::Fail(ReaderError::Timeout(20))]);

        let window = PollingAggregator.read_window(&reader, WINDOW).await.unwrap();

        assert!(window.tags.is_empty());
        assert_eq!(window.failure, Some(ReaderError::Timeout(20)));
    }

    #[tokio::test]
    async fn test_polling_connection_lost_is_fatal() {
        let reader = reader();
        reader.script_reads([ReadScript::Fail(ReaderError::ConnectionLost)]);

        let result = PollingAggregator.read_window(&reader, WINDOW).await;
        assert!(matches!(result, Err(RelayError::ConnectionLost)));
    }

    #[tokio::test]
    async fn test_listener_windows_do_not_leak() {
        let reader = reader();
        reader.script_reads([
            ReadScript::tags(["E1", "E1", "E2"]),
            ReadScript::tags(["E3"]),
        ]);
        let mut aggregator = TagAggregator::new(AggregationStrategy::Listener, &reader);

        let first = aggregator.collect(&reader, WINDOW).await.unwrap();
        assert_eq!(first.tags.sorted(), vec!["E1", "E2"]);

        let second = aggregator.collect(&reader, WINDOW).await.unwrap();
        assert_eq!(second.tags.sorted(), vec!["E3"]);
        assert!(!reader.is_reading());

        aggregator.shutdown().await;
        assert_eq!(reader.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_listener_discards_stragglers() {
        let reader = reader();
        let mut aggregator = ListenerAggregator::install(reader.clone());

        // Callbacks that land between windows
        reader.set_population(["STALE"]);
        reader.start_reading().unwrap();
        reader.stop_reading().unwrap();

        reader.set_population(["FRESH"]);
        assert!(aggregator.start_window().await.unwrap().is_none());
        let window = aggregator.end_window(WINDOW).await.unwrap();
        assert_eq!(window.tags.sorted(), vec!["FRESH"]);

        aggregator.shutdown().await;
    }

    #[tokio::test]
    async fn test_listener_fault_is_fatal_when_connection_lost() {
        let reader = reader();
        reader.script_reads([ReadScript::Fail(ReaderError::ConnectionLost)]);
        let mut aggregator = TagAggregator::new(AggregationStrategy::Listener, &reader);

        let result = aggregator.collect(&reader, WINDOW).await;
        assert!(matches!(result, Err(RelayError::ConnectionLost)));

        aggregator.shutdown().await;
        assert!(!reader.is_reading());
    }

    #[tokio::test]
    async fn test_listener_transient_fault_is_reported() {
        let reader = reader();
        reader.script_reads([ReadScript::Fail(ReaderError::Transport("antenna fault".into()))]);
        let mut aggregator = TagAggregator::new(AggregationStrategy::Listener, &reader);

        let window = aggregator.collect(&reader, WINDOW).await.unwrap();
        assert!(window.tags.is_empty());
        assert_eq!(
            window.failure,
            Some(ReaderError::Transport("antenna fault".into()))
        );
        aggregator.shutdown().await;
    }

    #[tokio::test]
    async fn test_listener_fault_drops_window_tags() {
        let reader = reader();
        let fault = ReaderError::Transport("antenna fault".into());
        reader.script_reads([
            ReadScript::interrupted(["E1", "E2"], fault.clone()),
            ReadScript::tags(["E3"]),
        ]);
        let mut aggregator = TagAggregator::new(AggregationStrategy::Listener, &reader);

        let faulted = aggregator.collect(&reader, WINDOW).await.unwrap();
        assert!(faulted.tags.is_empty());
        assert_eq!(faulted.failure, Some(fault));

        let next = aggregator.collect(&reader, WINDOW).await.unwrap();
        assert_eq!(next.tags.sorted(), vec!["E3"]);
        assert!(next.failure.is_none());

        aggregator.shutdown().await;
    }
}
