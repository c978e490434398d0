// Runtime configuration for the download pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::format_selector::DEFAULT_VIDEO_CONTAINER;
use super::tools::{ToolManager, ToolType};

pub const ENV_FFMPEG: &str = "YTGRAB_FFMPEG";
pub const ENV_YTDLP: &str = "YTGRAB_YTDLP";
pub const ENV_PROXY: &str = "YTGRAB_PROXY";

/// How fetched files are named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNaming {
    /// Sanitised video title
    #[default]
    Title,
    /// Platform video id
    VideoId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Transcoder executable used for audio output
    pub transcoder_path: PathBuf,
    /// yt-dlp executable used to resolve videos and playlists
    pub ytdlp_path: PathBuf,
    /// Extension of audio output (without dot)
    pub audio_extension: String,
    /// Container progressive downloads are restricted to
    pub video_container: String,
    pub file_naming: FileNaming,
    /// SOCKS5/HTTP proxy URL, used for resolving and fetching
    pub proxy: Option<String>,
    /// Socket timeout handed to the platform client
    pub socket_timeout_secs: u32,
    /// Upper bound for one resolve or expand call
    pub resolve_timeout_secs: u64,
    /// Upper bound for one transcoder run
    pub transcode_timeout_secs: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            transcoder_path: PathBuf::from(ToolType::Ffmpeg.as_str()),
            ytdlp_path: PathBuf::from(ToolType::YtDlp.as_str()),
            audio_extension: "mp3".to_string(),
            video_container: DEFAULT_VIDEO_CONTAINER.to_string(),
            file_naming: FileNaming::Title,
            proxy: None,
            socket_timeout_secs: 30,
            resolve_timeout_secs: 120,
            transcode_timeout_secs: 3600,
        }
    }
}

impl DownloaderConfig {
    /// Defaults with executables taken from the environment, or discovered
    pub fn from_env() -> Self {
        let manager = ToolManager::new();
        let from_env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            transcoder_path: from_env(ENV_FFMPEG)
                .map(PathBuf::from)
                .unwrap_or_else(|| manager.resolve_path(ToolType::Ffmpeg)),
            ytdlp_path: from_env(ENV_YTDLP)
                .map(PathBuf::from)
                .unwrap_or_else(|| manager.resolve_path(ToolType::YtDlp)),
            proxy: from_env(ENV_PROXY),
            ..Self::default()
        }
    }

    pub fn with_transcoder_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcoder_path = path.into();
        self
    }

    pub fn with_ytdlp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ytdlp_path = path.into();
        self
    }

    pub fn with_audio_extension(mut self, ext: impl Into<String>) -> Self {
        self.audio_extension = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_video_container(mut self, container: impl Into<String>) -> Self {
        self.video_container = container.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_file_naming(mut self, naming: FileNaming) -> Self {
        self.file_naming = naming;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout_secs = seconds;
        self
    }

    pub fn with_resolve_timeout(mut self, seconds: u64) -> Self {
        self.resolve_timeout_secs = seconds;
        self
    }

    pub fn with_transcode_timeout(mut self, seconds: u64) -> Self {
        self.transcode_timeout_secs = seconds;
        self
    }
}
