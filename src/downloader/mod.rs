// Downloader module - resolve, select, fetch and transcode behind small seams

pub mod config;
pub mod errors;
pub mod extractors;
pub mod fetcher;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod transcode;
pub mod utils;

pub use config::{DownloaderConfig, FileNaming};
pub use errors::{DownloadError, ResolutionFailure};
pub use extractors::CliInfoExtractor;
pub use fetcher::HttpFetcher;
pub use format_selector::{select, FormatSelector};
pub use models::{
    AudioBitrate, DownloadJob, JobEvent, JobReport, JobStage, MediaReference, OutputKind,
    PlaylistListing, QualityPreference, ReferenceKind, Severity, StreamDescriptor, StreamHandle,
    StreamKind, VideoCatalog, VideoOutcome, VideoResolution,
};
pub use orchestrator::{JobHandle, JobRunner, Orchestrator};
pub use tools::{ToolInfo, ToolManager, ToolType};
pub use traits::{CallbackSink, EventLog, EventSink, MediaFetcher, PlatformClient, Transcoder};
pub use transcode::FfmpegTranscoder;
