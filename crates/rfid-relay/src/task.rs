//! Running blocking device calls from async code

use std::sync::Arc;

use rfid_protocol::{Interrogator, ReaderError};

use crate::error::RelayError;

/// Run a blocking call against the device on the blocking pool
pub(crate) async fn on_device<D, T, F>(device: &Arc<D>, f: F) -> Result<T, RelayError>
where
    D: Interrogator,
    T: Send + 'static,
    F: FnOnce(&D) -> T + Send + 'static,
{
    let device = device.clone();
    tokio::task::spawn_blocking(move || f(&device))
        .await
        .map_err(|e| {
            RelayError::Reader(ReaderError::Transport(format!("device task failed: {}", e)))
        })
}
