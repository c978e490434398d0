// Seams between the orchestrator and its collaborators

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::errors::DownloadError;
use super::models::{
    JobEvent, MediaReference, PlaylistListing, Severity, StreamDescriptor, VideoCatalog,
};

/// Hosting-platform client: resolves videos and expands playlists
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Name of the client (for logging)
    fn name(&self) -> &'static str;

    /// Title and ordered stream catalog of a single video
    async fn resolve(&self, reference: &MediaReference) -> Result<VideoCatalog, DownloadError>;

    /// Title and ordered member videos of a playlist
    async fn expand_playlist(
        &self,
        reference: &MediaReference,
    ) -> Result<PlaylistListing, DownloadError>;
}

/// Writes a selected stream to local storage
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download `stream` into `target_dir` as `<file_stem>.<container>`,
    /// returning the absolute path of the written file
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        target_dir: &Path,
        file_stem: &str,
    ) -> Result<PathBuf, DownloadError>;
}

/// Converts a fetched container into the target audio format
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Extension of the files this transcoder produces (without dot)
    fn target_extension(&self) -> &str;

    /// Convert `input` into a sibling file, removing `input` on success
    async fn transcode(&self, input: &Path) -> Result<PathBuf, DownloadError>;
}

/// Receives job events; append-only, in emission order
pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

impl EventSink for UnboundedSender<JobEvent> {
    fn emit(&self, event: JobEvent) {
        // receiver gone means nobody is watching; the job still runs
        let _ = self.send(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: JobEvent) {
        (**self).emit(event)
    }
}

/// Sink calling a closure for every event
pub struct CallbackSink<F>(pub F);

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(JobEvent) + Send + Sync,
{
    fn emit(&self, event: JobEvent) {
        (self.0)(event)
    }
}

/// In-memory sink keeping every event
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<JobEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<JobEvent> {
        self.events().into_iter().filter(JobEvent::is_error).collect()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: JobEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Event emitter helper: mirrors every event into tracing at debug level,
/// so a front end printing the sink does not see each line twice
pub struct EventEmitter<'a> {
    sink: &'a dyn EventSink,
}

impl<'a> EventEmitter<'a> {
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self { sink }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.emit(JobEvent::info(text));
    }

    pub fn error(&self, err: &DownloadError) {
        self.emit(JobEvent::error(format!("Error [{}]: {}", err.kind(), err)));
    }

    pub fn emit(&self, event: JobEvent) {
        let severity = match event.severity {
            Severity::Info => "info",
            Severity::Error => "error",
        };
        debug!(severity, event = %event.text, "job event");
        self.sink.emit(event);
    }
}
