//! Normalized progress events and their delivery to the caller

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::process::KillSwitch;

pub const PHASE_CONVERTING: &str = "Converting...";
pub const PHASE_CONVERSION_COMPLETE: &str = "Conversion complete";
pub const PHASE_MERGING: &str = "Merging...";
pub const PHASE_EXTRACTING_AUDIO: &str = "Extracting audio...";

/// One progress update from either tool.
///
/// `phase` is free text: empty while downloading, one of the `PHASE_*`
/// constants, or the file name announced by the downloader. `size` is the
/// downloader's own size string (e.g. "12.3MiB"), empty when unknown.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressEvent {
    pub percent: f64,
    pub phase: String,
    pub size: String,
}

impl ProgressEvent {
    pub fn new(percent: f64, phase: impl Into<String>) -> Self {
        Self {
            percent,
            phase: phase.into(),
            size: String::new(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    /// One-line human status for this event
    ///
    /// # Returns
    /// * `"Converting... 50.0%"` while transcoding
    /// * `"Merging..."` / `"Extracting audio..."` for those phases
    /// * `"Downloading... 45.2%"` below 100%, `"Finishing..."` otherwise
    pub fn status_text(&self) -> String {
        match self.phase.as_str() {
            PHASE_CONVERTING => format!("Converting... {:.1}%", self.percent),
            PHASE_MERGING => PHASE_MERGING.to_string(),
            PHASE_EXTRACTING_AUDIO => PHASE_EXTRACTING_AUDIO.to_string(),
            _ if self.percent < 100.0 => format!("Downloading... {:.1}%", self.percent),
            _ => "Finishing...".to_string(),
        }
    }
}

/// Caller-supplied progress sink
pub type ProgressCallback = Box<dyn FnMut(ProgressEvent) + Send>;

/// Cloneable handle line handlers use to queue events
#[derive(Debug, Clone)]
pub struct ProgressSender(mpsc::UnboundedSender<Option<ProgressEvent>>);

impl ProgressSender {
    pub fn send(&self, event: ProgressEvent) {
        // Closed only once the pump has stopped, when events are dropped anyway
        let _ = self.0.send(Some(event));
    }
}

/// Single writer between the reader tasks and the caller's callback.
///
/// Readers push into an unbounded channel from any task; one pump task invokes
/// the callback in arrival order. Once the kill switch fires nothing else is
/// delivered.
pub struct ProgressPump {
    tx: ProgressSender,
    task: JoinHandle<()>,
}

impl ProgressPump {
    pub fn start(mut callback: ProgressCallback, kill_switch: KillSwitch) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Option<ProgressEvent>>();

        let task = tokio::spawn(async move {
            // `None` marks the end of the operation
            while let Some(Some(event)) = rx.recv().await {
                if kill_switch.is_terminated() {
                    log::debug!("Dropping progress after termination request");
                    break;
                }
                callback(event);
            }
        });

        Self {
            tx: ProgressSender(tx),
            task,
        }
    }

    pub fn sender(&self) -> ProgressSender {
        self.tx.clone()
    }

    pub fn send(&self, event: ProgressEvent) {
        self.tx.send(event);
    }

    /// Delivers everything queued so far, then stops the pump.
    ///
    /// Events sent afterwards through lingering senders are discarded.
    pub async fn finish(self) {
        let Self { tx, task } = self;
        let _ = tx.0.send(None);
        if let Err(e) = task.await {
            log::warn!("Progress pump task failed: {}", e);
        }
    }
}
