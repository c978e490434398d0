// FormatSelector - picks the one stream a job will fetch
//
// Rules:
// - Progressive video: exact resolution if offered, otherwise the highest
//   resolution available in the target container (first one wins a tie)
// - Audio only: exact bitrate or nothing, never a silent substitute

use super::errors::DownloadError;
use super::models::{
    AudioBitrate, OutputKind, QualityPreference, StreamDescriptor, StreamKind, VideoResolution,
};

/// Container progressive downloads are restricted to by default
pub const DEFAULT_VIDEO_CONTAINER: &str = "mp4";

/// Stream selector for one target container
#[derive(Debug, Clone)]
pub struct FormatSelector {
    video_container: String,
}

impl FormatSelector {
    pub fn new(video_container: impl Into<String>) -> Self {
        Self {
            video_container: video_container.into(),
        }
    }

    /// Pick exactly one stream from the catalog.
    ///
    /// A preference from the wrong family (e.g. a resolution for an audio
    /// download) never matches anything.
    pub fn select<'a>(
        &self,
        streams: &'a [StreamDescriptor],
        kind: OutputKind,
        preference: QualityPreference,
    ) -> Result<&'a StreamDescriptor, DownloadError> {
        let found = match (kind, preference) {
            (OutputKind::ProgressiveAudioVideo, QualityPreference::Video(resolution)) => {
                self.select_progressive(streams, resolution)
            }
            (OutputKind::AudioOnly, QualityPreference::Audio(bitrate)) => {
                Self::select_audio(streams, bitrate)
            }
            _ => None,
        };

        found.ok_or(DownloadError::NotFound { kind, preference })
    }

    fn select_progressive<'a>(
        &self,
        streams: &'a [StreamDescriptor],
        resolution: VideoResolution,
    ) -> Option<&'a StreamDescriptor> {
        let container = self.video_container.as_str();
        let candidates = || {
            streams.iter().filter(move |s| {
                s.kind == StreamKind::Progressive && s.container.eq_ignore_ascii_case(container)
            })
        };

        candidates()
            .find(|s| s.resolution.as_deref() == Some(resolution.label()))
            .or_else(|| Self::find_best_video(candidates()))
    }

    /// Highest resolution; entries without a known resolution are skipped
    fn find_best_video<'a>(
        candidates: impl Iterator<Item = &'a StreamDescriptor>,
    ) -> Option<&'a StreamDescriptor> {
        let mut best: Option<(u32, &StreamDescriptor)> = None;
        for stream in candidates {
            let Some(height) = stream.height() else {
                continue;
            };
            // strictly greater keeps the earliest entry on ties
            if best.map_or(true, |(h, _)| height > h) {
                best = Some((height, stream));
            }
        }
        best.map(|(_, stream)| stream)
    }

    fn select_audio(
        streams: &[StreamDescriptor],
        bitrate: AudioBitrate,
    ) -> Option<&StreamDescriptor> {
        streams.iter().find(|s| {
            s.kind == StreamKind::AudioOnly && s.bitrate.as_deref() == Some(bitrate.label())
        })
    }
}

impl Default for FormatSelector {
    fn default() -> Self {
        Self::new(DEFAULT_VIDEO_CONTAINER)
    }
}

/// Select with the default mp4 target container
pub fn select(
    streams: &[StreamDescriptor],
    kind: OutputKind,
    preference: QualityPreference,
) -> Result<&StreamDescriptor, DownloadError> {
    FormatSelector::default().select(streams, kind, preference)
}
