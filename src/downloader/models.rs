// Common data models for the download pipeline

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DownloadError;
use super::utils::{parse_bitrate_label, parse_resolution_label};

/// Marker that makes a URL a playlist reference
const PLAYLIST_MARKER: &str = "playlist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    Video,
    Playlist,
}

/// A URL classified as a single video or a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    url: String,
    kind: ReferenceKind,
}

impl MediaReference {
    /// Classify a user supplied URL.
    ///
    /// Any URL containing `playlist` anywhere is treated as a playlist. This
    /// also catches e.g. a channel path named "playlist", which is accepted
    /// as-is; the platform is the only stronger signal and we do not ask it.
    pub fn parse(url: impl Into<String>) -> Self {
        let url = url.into().trim().to_string();
        let kind = if url.contains(PLAYLIST_MARKER) {
            ReferenceKind::Playlist
        } else {
            ReferenceKind::Video
        };
        Self { url, kind }
    }

    /// A playlist member, always a single video regardless of its text
    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: ReferenceKind::Video,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    pub fn is_playlist(&self) -> bool {
        self.kind == ReferenceKind::Playlist
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// What a single stream carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Audio track only
    AudioOnly,
    /// Audio and video muxed together
    Progressive,
    /// Video track without audio
    VideoOnly,
}

/// Opaque handle used by the fetcher to get the bytes: a direct media URL
/// plus the request headers the platform expects for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHandle {
    url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
}

impl StreamHandle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }
}

/// One entry of a video's catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Platform format id (e.g. "140", "22")
    pub format_id: String,
    pub kind: StreamKind,
    /// Container / file extension (mp4, webm, m4a)
    pub container: String,
    /// Nominal resolution label, e.g. "720p"
    pub resolution: Option<String>,
    /// Nominal audio bitrate label, e.g. "192kbps"
    pub bitrate: Option<String>,
    pub handle: StreamHandle,
}

impl StreamDescriptor {
    /// Vertical resolution parsed from the label
    pub fn height(&self) -> Option<u32> {
        self.resolution.as_deref().and_then(parse_resolution_label)
    }
}

/// Streams available for one video, in platform order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCatalog {
    pub id: String,
    pub title: String,
    pub streams: Vec<StreamDescriptor>,
}

/// Result of expanding a playlist reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistListing {
    pub title: String,
    pub entries: Vec<MediaReference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioBitrate {
    #[serde(rename = "320kbps")]
    Kbps320,
    #[serde(rename = "192kbps")]
    Kbps192,
    #[serde(rename = "160kbps")]
    Kbps160,
    #[serde(rename = "128kbps")]
    Kbps128,
    #[serde(rename = "64kbps")]
    Kbps64,
}

impl AudioBitrate {
    pub const ALL: [AudioBitrate; 5] = [
        Self::Kbps320,
        Self::Kbps192,
        Self::Kbps160,
        Self::Kbps128,
        Self::Kbps64,
    ];

    pub fn kbps(&self) -> u32 {
        match self {
            Self::Kbps320 => 320,
            Self::Kbps192 => 192,
            Self::Kbps160 => 160,
            Self::Kbps128 => 128,
            Self::Kbps64 => 64,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Kbps320 => "320kbps",
            Self::Kbps192 => "192kbps",
            Self::Kbps160 => "160kbps",
            Self::Kbps128 => "128kbps",
            Self::Kbps64 => "64kbps",
        }
    }

    pub fn from_kbps(kbps: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.kbps() == kbps)
    }
}

impl FromStr for AudioBitrate {
    type Err = DownloadError;

    /// Accepts "192kbps", "192" and the combo-box form "high (192kbps)"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        parse_bitrate_label(trimmed)
            .or_else(|| trimmed.parse().ok())
            .and_then(Self::from_kbps)
            .ok_or_else(|| DownloadError::InvalidJob(format!("Unrecognized audio quality: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoResolution {
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "144p")]
    P144,
}

impl VideoResolution {
    pub const ALL: [VideoResolution; 6] = [
        Self::P1080,
        Self::P720,
        Self::P480,
        Self::P360,
        Self::P240,
        Self::P144,
    ];

    pub fn height(&self) -> u32 {
        match self {
            Self::P1080 => 1080,
            Self::P720 => 720,
            Self::P480 => 480,
            Self::P360 => 360,
            Self::P240 => 240,
            Self::P144 => 144,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::P1080 => "1080p",
            Self::P720 => "720p",
            Self::P480 => "480p",
            Self::P360 => "360p",
            Self::P240 => "240p",
            Self::P144 => "144p",
        }
    }
}

impl FromStr for VideoResolution {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_resolution_label(s.trim())
            .and_then(|h| Self::ALL.into_iter().find(|r| r.height() == h))
            .ok_or_else(|| DownloadError::InvalidJob(format!("Unrecognized video quality: {}", s)))
    }
}

/// Requested bitrate (audio) or resolution (video)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualityPreference {
    Audio(AudioBitrate),
    Video(VideoResolution),
}

impl QualityPreference {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Audio(b) => b.label(),
            Self::Video(r) => r.label(),
        }
    }

    /// Output kind this preference belongs to
    pub fn output_kind(&self) -> OutputKind {
        match self {
            Self::Audio(_) => OutputKind::AudioOnly,
            Self::Video(_) => OutputKind::ProgressiveAudioVideo,
        }
    }
}

impl fmt::Display for QualityPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for QualityPreference {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(resolution) = s.parse::<VideoResolution>() {
            return Ok(Self::Video(resolution));
        }
        if let Ok(bitrate) = s.parse::<AudioBitrate>() {
            return Ok(Self::Audio(bitrate));
        }
        Err(DownloadError::InvalidJob(format!("Unrecognized quality: {}", s)))
    }
}

/// Shown to the user as "mp3" / "mp4"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    #[serde(rename = "mp3")]
    AudioOnly,
    #[serde(rename = "mp4")]
    ProgressiveAudioVideo,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AudioOnly => "mp3",
            Self::ProgressiveAudioVideo => "mp4",
        }
    }

    /// Preference used when the caller does not pick one
    pub fn default_quality(&self) -> QualityPreference {
        match self {
            Self::AudioOnly => QualityPreference::Audio(AudioBitrate::Kbps192),
            Self::ProgressiveAudioVideo => QualityPreference::Video(VideoResolution::P720),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp3" | "audio" => Ok(Self::AudioOnly),
            "mp4" | "video" => Ok(Self::ProgressiveAudioVideo),
            _ => Err(DownloadError::InvalidJob(format!("Unrecognized format: {}", s))),
        }
    }
}

/// One user request: a video or a playlist, where to put it and how.
///
/// Deserialising goes through [`DownloadJob::new`], so a job read from JSON
/// is validated exactly like one built in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "JobRequest", into = "JobRequest")]
pub struct DownloadJob {
    reference: MediaReference,
    output_dir: PathBuf,
    output_kind: OutputKind,
    quality: QualityPreference,
}

impl DownloadJob {
    pub fn new(
        url: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        output_kind: OutputKind,
        quality: QualityPreference,
    ) -> Result<Self, DownloadError> {
        let url = url.into();
        let output_dir = output_dir.into();

        if url.trim().is_empty() || output_dir.as_os_str().is_empty() {
            return Err(DownloadError::InvalidJob(
                "Please provide both a video link and an output directory.".to_string(),
            ));
        }

        if quality.output_kind() != output_kind {
            return Err(DownloadError::InvalidJob(format!(
                "Quality {} does not apply to {} downloads",
                quality, output_kind
            )));
        }

        Ok(Self {
            reference: MediaReference::parse(url),
            output_dir,
            output_kind,
            quality,
        })
    }

    pub fn reference(&self) -> &MediaReference {
        &self.reference
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn output_kind(&self) -> OutputKind {
        self.output_kind
    }

    pub fn quality(&self) -> QualityPreference {
        self.quality
    }
}

/// Wire form of a job: the fields a front end submits
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobRequest {
    url: String,
    output_dir: PathBuf,
    output_kind: OutputKind,
    quality: QualityPreference,
}

impl TryFrom<JobRequest> for DownloadJob {
    type Error = DownloadError;

    fn try_from(req: JobRequest) -> Result<Self, Self::Error> {
        DownloadJob::new(req.url, req.output_dir, req.output_kind, req.quality)
    }
}

impl From<DownloadJob> for JobRequest {
    fn from(job: DownloadJob) -> Self {
        Self {
            url: job.reference.url,
            output_dir: job.output_dir,
            output_kind: job.output_kind,
            quality: job.quality,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// A log line sent from the orchestrator to the front end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    pub text: String,
    pub severity: Severity,
}

impl JobEvent {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Pipeline position of a job or a single video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStage {
    Expanding,
    Resolving,
    Selecting,
    Fetching,
    Transcoding,
    Done,
    Failed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Expanding => "expanding",
            Self::Resolving => "resolving",
            Self::Selecting => "selecting",
            Self::Fetching => "fetching",
            Self::Transcoding => "transcoding",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one video of a job
#[derive(Debug)]
pub struct VideoOutcome {
    pub reference: MediaReference,
    /// Known once resolution succeeded
    pub title: Option<String>,
    /// Last stage entered; the failing stage when `result` is an error
    pub stage: JobStage,
    pub result: Result<PathBuf, DownloadError>,
}

impl VideoOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Typed summary of a finished job
#[derive(Debug, Default)]
pub struct JobReport {
    pub playlist_title: Option<String>,
    /// Set when the playlist itself could not be expanded
    pub expansion_error: Option<DownloadError>,
    pub videos: Vec<VideoOutcome>,
}

impl JobReport {
    pub fn succeeded(&self) -> usize {
        self.videos.iter().filter(|v| v.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.videos.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.expansion_error.is_none() && self.failed() == 0
    }

    /// Paths of every file the job produced
    pub fn files(&self) -> Vec<&Path> {
        self.videos
            .iter()
            .filter_map(|v| v.result.as_ref().ok().map(PathBuf::as_path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_classification() {
        let video = MediaReference::parse("https://host/watch?id=abc");
        assert_eq!(video.kind(), ReferenceKind::Video);

        let playlist = MediaReference::parse("https://www.youtube.com/playlist?list=PL123");
        assert!(playlist.is_playlist());

        // Marker anywhere in the URL counts
        let odd = MediaReference::parse("https://host/channel/playlistfan/watch?id=x");
        assert!(odd.is_playlist());
    }

    #[test]
    fn test_playlist_member_is_always_video() {
        let member = MediaReference::video("https://host/watch?id=a&from=playlist");
        assert!(!member.is_playlist());
    }

    #[test]
    fn test_audio_bitrate_parsing() {
        assert_eq!("192kbps".parse::<AudioBitrate>().unwrap(), AudioBitrate::Kbps192);
        assert_eq!("high (320kbps)".parse::<AudioBitrate>().unwrap(), AudioBitrate::Kbps320);
        assert_eq!("low (64kbps)".parse::<AudioBitrate>().unwrap(), AudioBitrate::Kbps64);
        assert_eq!("128".parse::<AudioBitrate>().unwrap(), AudioBitrate::Kbps128);
        assert!("256kbps".parse::<AudioBitrate>().is_err());
        assert!("loud".parse::<AudioBitrate>().is_err());
    }

    #[test]
    fn test_video_resolution_parsing() {
        assert_eq!("1080p".parse::<VideoResolution>().unwrap(), VideoResolution::P1080);
        assert_eq!(" 144p ".parse::<VideoResolution>().unwrap(), VideoResolution::P144);
        assert!("2160p".parse::<VideoResolution>().is_err());
        assert!("720".parse::<VideoResolution>().is_err());
    }

    #[test]
    fn test_quality_preference_parsing() {
        assert_eq!(
            "480p".parse::<QualityPreference>().unwrap(),
            QualityPreference::Video(VideoResolution::P480)
        );
        assert_eq!(
            "medium (160kbps)".parse::<QualityPreference>().unwrap(),
            QualityPreference::Audio(AudioBitrate::Kbps160)
        );
        assert!("best".parse::<QualityPreference>().is_err());
    }

    #[test]
    fn test_output_kind_parsing() {
        assert_eq!("mp3".parse::<OutputKind>().unwrap(), OutputKind::AudioOnly);
        assert_eq!("MP4".parse::<OutputKind>().unwrap(), OutputKind::ProgressiveAudioVideo);
        assert!("flac".parse::<OutputKind>().is_err());
    }

    #[test]
    fn test_job_requires_url_and_directory() {
        let quality = QualityPreference::Video(VideoResolution::P720);
        let err = DownloadJob::new("", "/tmp/out", OutputKind::ProgressiveAudioVideo, quality)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_job");

        let err = DownloadJob::new(
            "https://host/watch?id=abc",
            "",
            OutputKind::ProgressiveAudioVideo,
            quality,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "invalid_job");
    }

    #[test]
    fn test_job_rejects_mismatched_quality() {
        let result = DownloadJob::new(
            "https://host/watch?id=abc",
            "/tmp/out",
            OutputKind::AudioOnly,
            QualityPreference::Video(VideoResolution::P720),
        );
        assert!(matches!(result, Err(DownloadError::InvalidJob(_))));
    }

    #[test]
    fn test_job_classifies_reference() {
        let job = DownloadJob::new(
            "https://host/playlist?list=1",
            "/tmp/out",
            OutputKind::AudioOnly,
            QualityPreference::Audio(AudioBitrate::Kbps128),
        )
        .unwrap();
        assert!(job.reference().is_playlist());
        assert_eq!(job.output_dir(), Path::new("/tmp/out"));
    }

    #[test]
    fn test_job_from_json_is_validated() {
        let request = |url: &str, dir: &str, quality: &str| {
            serde_json::json!({
                "url": url,
                "output_dir": dir,
                "output_kind": "mp3",
                "quality": quality,
            })
        };

        let err = serde_json::from_value::<DownloadJob>(request("", "", "192kbps")).unwrap_err();
        assert!(err.to_string().contains("Please provide both"));

        let mismatched = request("https://host/watch?id=abc", "/tmp", "720p");
        assert!(serde_json::from_value::<DownloadJob>(mismatched).is_err());

        let valid = request("https://host/playlist?list=1", "/tmp", "320kbps");
        let job: DownloadJob = serde_json::from_value(valid).unwrap();
        assert!(job.reference().is_playlist());
        assert_eq!(job.quality(), QualityPreference::Audio(AudioBitrate::Kbps320));
    }

    #[test]
    fn test_event_serialization() {
        let event = JobEvent::error("Error [fetch]: boom");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"text":"Error [fetch]: boom","severity":"error"}"#);
    }
}
