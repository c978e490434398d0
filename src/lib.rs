pub mod cli;
pub mod downloader;
pub mod logging;

pub use downloader::{
    DownloadError, DownloadJob, DownloaderConfig, JobEvent, JobReport, JobRunner, Orchestrator,
    OutputKind, QualityPreference,
};
