use std::sync::Arc;

use tokio::{
    runtime::Handle,
    sync::mpsc::{error::TryRecvError, unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    engine::Engine,
    error::{AppError, Result},
    model::{DownloadRequest, FormatChoice, FormatDescriptor, Phase, ProgressEvent},
};

/// Messages from the current worker to the UI thread.
#[derive(Debug)]
enum WorkerEvent {
    /// Video-only renditions, engine order
    Formats(Vec<FormatDescriptor>),
    MetadataFailed(String),
    Progress(ProgressEvent),
    /// Download returned successfully
    Downloaded,
}

/// The single worker slot: the task and the receiving end of its channel.
struct Worker {
    events: UnboundedReceiver<WorkerEvent>,
    handle: JoinHandle<()>,
}

/// Drives the fetch → pick → download cycle for the window.
///
/// At most one worker exists at a time. Each worker gets its own channel, so
/// replacing the slot drops whatever an older worker still had queued.
pub struct Controller {
    engine: Arc<dyn Engine>,
    runtime: Handle,
    phase: Phase,
    status: String,
    progress: f32,
    choices: Vec<FormatChoice>,
    url: String,
    folder: String,
    worker: Option<Worker>,
}

impl Controller {
    pub fn new(engine: Arc<dyn Engine>, runtime: Handle) -> Self {
        Self {
            engine,
            runtime,
            phase: Phase::Idle,
            status: "Idle".to_string(),
            progress: 0.0,
            choices: Vec::new(),
            url: String::new(),
            folder: String::new(),
            worker: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn status_line(&self) -> String {
        format!("Status: {}", self.status())
    }

    /// 0–100
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn choices(&self) -> &[FormatChoice] {
        &self.choices
    }

    pub fn is_busy(&self) -> bool {
        self.phase().is_busy()
    }

    pub fn selection_enabled(&self) -> bool {
        self.phase() == Phase::AwaitingSelection
    }

    fn install(&mut self, events: UnboundedReceiver<WorkerEvent>, handle: JoinHandle<()>) {
        if let Some(old) = self.worker.take() {
            if !old.handle.is_finished() {
                tracing::debug!("previous worker still winding down, dropping its events");
            }
        }
        self.worker = Some(Worker { events, handle });
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.status = text.into();
    }

    /// Validates input and spawns the metadata worker.
    pub fn start(&mut self, url: &str, folder: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(self.reject("Please enter a URL"));
        }
        if folder.trim().is_empty() {
            return Err(self.reject("Choose save folder"));
        }
        if self.is_busy() {
            tracing::debug!(phase = ?self.phase, "start ignored, worker active");
            return Err(AppError::Busy);
        }

        self.url = url.to_string();
        self.folder = folder.to_string();
        self.choices.clear();
        self.progress = 0.0;
        self.set_status("Loading metadata...");
        self.phase = Phase::FetchingFormats;

        let (tx, rx) = unbounded_channel();
        let engine = Arc::clone(&self.engine);
        let url = self.url.clone();
        tracing::info!(%url, "spawning metadata worker");
        let handle = self.runtime.spawn(async move {
            let event = match engine.fetch_formats(&url).await {
                Ok(formats) => {
                    let total = formats.len();
                    let video: Vec<_> = formats.into_iter().filter(|f| f.is_video_only()).collect();
                    tracing::debug!(total, video_only = video.len(), "formats filtered");
                    WorkerEvent::Formats(video)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "metadata fetch failed");
                    WorkerEvent::MetadataFailed(e.to_string())
                }
            };
            let _ = tx.send(event);
        });
        self.install(rx, handle);
        Ok(())
    }

    fn reject(&mut self, message: &str) -> AppError {
        self.set_status(message);
        AppError::Validation(message.to_string())
    }

    /// Format id behind a picker label. Colliding labels resolve to the first one.
    // The window selects by position; label lookups serve callers holding only the text.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn resolve_label(&self, label: &str) -> Option<&str> {
        self.choices
            .iter()
            .find(|c| c.label == label)
            .map(|c| c.descriptor.format_id.as_str())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn confirm_label(&mut self, label: &str) -> Result<()> {
        let index = self.choices.iter().position(|c| c.label == label);
        self.confirm(index)
    }

    /// Spawns the download worker for the picked position. An unknown position
    /// leaves the selector empty and the engine chooses.
    pub fn confirm(&mut self, index: Option<usize>) -> Result<()> {
        if self.is_busy() {
            return Err(AppError::Busy);
        }
        if self.phase != Phase::AwaitingSelection {
            return Err(AppError::Validation("Fetch formats first".to_string()));
        }

        let format = index
            .and_then(|i| self.choices.get(i))
            .map(|c| c.descriptor.format_id.clone());
        let request = DownloadRequest::new(self.url.clone(), &self.folder, format);
        self.progress = 0.0;
        self.phase = Phase::Downloading;

        let (tx, rx) = unbounded_channel();
        let engine = Arc::clone(&self.engine);
        tracing::info!(url = %request.url, format = ?request.format, "spawning download worker");
        let handle = self.runtime.spawn(run_download(engine, request, tx));
        self.install(rx, handle);
        Ok(())
    }

    /// Applies everything the worker has sent so far. Returns `true` if anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        loop {
            let Some(worker) = self.worker.as_mut() else {
                break;
            };
            match worker.events.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    changed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let finished = worker.handle.is_finished();
                    self.worker = None;
                    if self.is_busy() {
                        tracing::error!(phase = ?self.phase, finished, "worker exited without reporting");
                        self.set_status("Error: worker stopped unexpectedly");
                        self.phase = Phase::Failed;
                        changed = true;
                    }
                    break;
                }
            }
        }
        changed
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Formats(formats) => {
                self.choices = formats.into_iter().map(FormatChoice::from).collect();
                self.phase = Phase::AwaitingSelection;
            }
            WorkerEvent::MetadataFailed(message) => {
                self.set_status(format!("Error: {}", message));
                self.phase = Phase::Failed;
            }
            WorkerEvent::Progress(ProgressEvent::Downloading { percent, eta }) => {
                if let Some(p) = percent {
                    self.progress = p.clamp(0.0, 100.0);
                }
                self.set_status(format!("ETA: {}", eta));
            }
            WorkerEvent::Progress(ProgressEvent::Finished) => {
                self.progress = 100.0;
                self.set_status("Done");
            }
            WorkerEvent::Progress(ProgressEvent::Error { message }) => {
                self.set_status(format!("Error: {}", message));
                self.phase = Phase::Failed;
            }
            WorkerEvent::Downloaded => {
                self.progress = 100.0;
                self.set_status("Done");
                self.phase = Phase::Done;
            }
        }
    }
}

async fn run_download(engine: Arc<dyn Engine>, request: DownloadRequest, tx: UnboundedSender<WorkerEvent>) {
    let (progress_tx, mut progress_rx) = unbounded_channel();
    let relay = {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                let _ = tx.send(WorkerEvent::Progress(event));
            }
        })
    };

    let result = engine.download(&request, Some(progress_tx)).await;
    // Sender is gone once download returns; wait for the relay to flush.
    let _ = relay.await;

    let event = match result {
        Ok(()) => WorkerEvent::Downloaded,
        Err(e) => {
            tracing::warn!(error = %e, "download failed");
            WorkerEvent::Progress(ProgressEvent::Error { message: e.to_string() })
        }
    };
    let _ = tx.send(event);
}
