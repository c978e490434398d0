// Orchestrator - drives one job through resolve, select, fetch and transcode
//
// Videos of a playlist run strictly one after another in platform order.
// A failing video ends up as one error event and a failed outcome; the
// next member is still attempted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

use super::config::{DownloaderConfig, FileNaming};
use super::errors::DownloadError;
use super::extractors::CliInfoExtractor;
use super::fetcher::HttpFetcher;
use super::format_selector::FormatSelector;
use super::models::{
    DownloadJob, JobReport, JobStage, MediaReference, OutputKind, VideoCatalog, VideoOutcome,
};
use super::traits::{EventEmitter, EventSink, MediaFetcher, PlatformClient, Transcoder};
use super::transcode::FfmpegTranscoder;
use super::utils::sanitize_file_stem;

pub struct Orchestrator {
    client: Arc<dyn PlatformClient>,
    fetcher: Arc<dyn MediaFetcher>,
    transcoder: Arc<dyn Transcoder>,
    selector: FormatSelector,
    file_naming: FileNaming,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        fetcher: Arc<dyn MediaFetcher>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            client,
            fetcher,
            transcoder,
            selector: FormatSelector::default(),
            file_naming: FileNaming::default(),
        }
    }

    /// Production wiring: yt-dlp client, HTTP fetcher, ffmpeg transcoder
    pub fn from_config(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        Ok(Self {
            client: Arc::new(CliInfoExtractor::new(config)),
            fetcher: Arc::new(HttpFetcher::new(config)?),
            transcoder: Arc::new(FfmpegTranscoder::new(config)),
            selector: FormatSelector::new(config.video_container.clone()),
            file_naming: config.file_naming,
        })
    }

    pub fn with_file_naming(mut self, naming: FileNaming) -> Self {
        self.file_naming = naming;
        self
    }

    /// Run a job to completion. Never fails as a whole; every problem is
    /// reported through `sink` and recorded in the returned report.
    pub async fn run(&self, job: &DownloadJob, sink: &dyn EventSink) -> JobReport {
        let emitter = EventEmitter::new(sink);
        let reference = job.reference();
        let mut report = JobReport::default();

        info!(
            url = %reference,
            kind = %job.output_kind(),
            quality = %job.quality(),
            client = self.client.name(),
            "job started"
        );

        if !reference.is_playlist() {
            report.videos.push(self.run_video(reference.clone(), job, &emitter).await);
            info!(succeeded = report.succeeded(), "job finished");
            return report;
        }

        debug!(url = %reference, stage = %JobStage::Expanding, "entering stage");
        let listing = match self.client.expand_playlist(reference).await {
            Ok(listing) => listing,
            Err(e) => {
                info!(url = %reference, error = %e, "playlist expansion failed");
                emitter.error(&e);
                report.expansion_error = Some(e);
                return report;
            }
        };

        emitter.info(format!("Playlist Title: {}", listing.title));
        emitter.info(format!("Total Videos: {}", listing.entries.len()));
        report.playlist_title = Some(listing.title);

        if let Err(e) = tokio::fs::create_dir_all(job.output_dir()).await {
            let e = DownloadError::from(e);
            emitter.error(&e);
            report.expansion_error = Some(e);
            return report;
        }

        let total = listing.entries.len();
        for (index, member) in listing.entries.into_iter().enumerate() {
            debug!(position = index + 1, total, url = %member, "playlist member");
            report.videos.push(self.run_video(member, job, &emitter).await);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "job finished"
        );
        report
    }

    async fn run_video(
        &self,
        reference: MediaReference,
        job: &DownloadJob,
        emitter: &EventEmitter<'_>,
    ) -> VideoOutcome {
        let mut stage = JobStage::Resolving;
        let mut title = None;
        let result = self.process_video(&reference, job, &mut stage, &mut title).await;

        match &result {
            Ok(path) => {
                stage = JobStage::Done;
                info!(url = %reference, path = %path.display(), "video done");
                emitter.info(format!(
                    "Downloaded: {}",
                    title.as_deref().unwrap_or(reference.url())
                ));
            }
            Err(e) => {
                info!(
                    url = %reference,
                    stage = %JobStage::Failed,
                    failed_at = %stage,
                    error = %e,
                    "video failed"
                );
                emitter.error(e);
            }
        }

        VideoOutcome {
            reference,
            title,
            stage,
            result,
        }
    }

    async fn process_video(
        &self,
        reference: &MediaReference,
        job: &DownloadJob,
        stage: &mut JobStage,
        title: &mut Option<String>,
    ) -> Result<PathBuf, DownloadError> {
        enter(stage, JobStage::Resolving, reference);
        let catalog = self.client.resolve(reference).await?;
        *title = Some(catalog.title.clone());

        enter(stage, JobStage::Selecting, reference);
        let stream = self
            .selector
            .select(&catalog.streams, job.output_kind(), job.quality())?;
        debug!(format_id = %stream.format_id, container = %stream.container, "stream selected");

        enter(stage, JobStage::Fetching, reference);
        let stem = self.file_stem(&catalog);
        let fetched = self.fetcher.fetch(stream, job.output_dir(), &stem).await?;

        if job.output_kind() != OutputKind::AudioOnly {
            return Ok(fetched);
        }

        enter(stage, JobStage::Transcoding, reference);
        let output = self.transcoder.transcode(&fetched).await?;

        let expected = self.transcoder.target_extension();
        let matches = output
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case(expected));
        if !matches {
            return Err(DownloadError::Transcode(format!(
                "{} does not have the .{} extension",
                output.display(),
                expected
            )));
        }
        Ok(output)
    }

    fn file_stem(&self, catalog: &VideoCatalog) -> String {
        let stem = match self.file_naming {
            FileNaming::Title => sanitize_file_stem(&catalog.title),
            FileNaming::VideoId => sanitize_file_stem(&catalog.id),
        };
        if stem.is_empty() {
            // titles made only of unsafe characters
            sanitize_file_stem(&catalog.id)
        } else {
            stem
        }
    }
}

fn enter(stage: &mut JobStage, next: JobStage, reference: &MediaReference) {
    *stage = next;
    debug!(url = %reference, stage = %next, "entering stage");
}

/// Runs jobs on a background task, one at a time.
///
/// Submitting while a job is active is rejected with `DownloadError::Busy`
/// instead of abandoning or racing the running job.
#[derive(Clone)]
pub struct JobRunner {
    orchestrator: Arc<Orchestrator>,
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when the job task ends, panics included
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl JobRunner {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Start `job` in the background. Must be called within a tokio runtime.
    pub fn submit<S>(&self, job: DownloadJob, sink: S) -> Result<JobHandle, DownloadError>
    where
        S: EventSink + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(url = %job.reference(), "job rejected, runner busy");
            return Err(DownloadError::Busy);
        }

        let guard = BusyGuard(Arc::clone(&self.busy));
        let orchestrator = Arc::clone(&self.orchestrator);
        let task = tokio::spawn(async move {
            let _guard = guard;
            orchestrator.run(&job, &sink).await
        });

        Ok(JobHandle { task })
    }
}

/// A submitted job
pub struct JobHandle {
    task: JoinHandle<JobReport>,
}

impl JobHandle {
    /// Wait for the job; errors only if the job task panicked
    pub async fn wait(self) -> Result<JobReport, JoinError> {
        self.task.await
    }
}
