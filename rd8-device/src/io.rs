//! MIDI I/O seam
//!
//! The session never opens MIDI ports itself. The host hands it something
//! implementing [`MidiIo`] and feeds inbound sysex back through
//! `DeviceSession::handle_message`.
//!
//! ```text
//! [host MIDI ports]  ← implements MidiIo (raw send / enable input)
//!         |
//!  [DebouncedSender]  ← coalesces rapid settings writes
//!         |
//!   [DeviceSession]
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rd8_sysex::SysexMessage;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Errors reported by the MIDI I/O collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    #[error("MIDI port not available: {0}")]
    PortUnavailable(String),

    #[error("MIDI send failed: {0}")]
    SendFailed(String),

    /// Debounced sends need a tokio runtime to schedule on
    #[error("No async runtime available for debounced send")]
    NoRuntime,
}

/// Raw MIDI capability injected into the session
#[async_trait]
pub trait MidiIo: Send + Sync {
    /// Start delivering inbound messages to the host
    async fn enable_input(&self) -> Result<(), IoError>;

    /// Send a block of sysex messages immediately, in order
    async fn send_now(&self, messages: &[SysexMessage]) -> Result<(), IoError>;
}

/// Sends the latest scheduled block after a quiet period.
///
/// Scheduling again before the delay elapses replaces the earlier block, so
/// a burst of edits results in a single transmission.
pub struct DebouncedSender {
    io: Arc<dyn MidiIo>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedSender {
    pub fn new(io: Arc<dyn MidiIo>) -> Self {
        Self {
            io,
            task: Mutex::new(None),
        }
    }

    /// Schedule `messages` to go out after `delay`, superseding any
    /// block that has not been sent yet.
    pub fn schedule(&self, messages: Vec<SysexMessage>, delay: Duration) -> Result<(), IoError> {
        let runtime = Handle::try_current().map_err(|_| IoError::NoRuntime)?;
        let io = Arc::clone(&self.io);

        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            if !previous.is_finished() {
                debug!("Debounced send superseded");
            }
            previous.abort();
        }
        *task = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Debounced send of {} message(s)", messages.len());
            if let Err(e) = io.send_now(&messages).await {
                warn!("Debounced send failed: {}", e);
            }
        }));
        Ok(())
    }

    /// Drop a scheduled block that has not been sent yet
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// True while a block is waiting for its delay to elapse
    pub fn is_pending(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for DebouncedSender {
    fn drop(&mut self) {
        self.cancel();
    }
}
