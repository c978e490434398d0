use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::downloader::{
    DownloadError, DownloadJob, DownloaderConfig, FileNaming, OutputKind, QualityPreference,
};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "yt-grab")]
#[command(author, version, about = "Download a video or a whole playlist, optionally as audio")]
pub struct Cli {
    /// Video or playlist URL.
    #[arg(value_name = "URL", required_unless_present = "check_tools")]
    pub url: Option<String>,

    /// Output directory (defaults to the user's download directory).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: mp3 (audio only) or mp4 (video with audio).
    #[arg(short, long, default_value = "mp4")]
    pub format: OutputKind,

    /// Quality: 1080p..144p for mp4, 320kbps..64kbps for mp3.
    #[arg(short, long)]
    pub quality: Option<QualityPreference>,

    /// Path to ffmpeg.
    #[arg(long)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to yt-dlp.
    #[arg(long)]
    pub ytdlp_path: Option<PathBuf>,

    /// Proxy URL for resolving and downloading.
    #[arg(long)]
    pub proxy: Option<String>,

    /// Container the video stream must come in (default mp4).
    #[arg(long, value_name = "EXT")]
    pub container: Option<String>,

    /// Extension of transcoded audio files (default mp3).
    #[arg(long, value_name = "EXT")]
    pub audio_ext: Option<String>,

    /// How output files are named.
    #[arg(long, value_enum, default_value_t = Naming::Title)]
    pub naming: Naming,

    /// Show ffmpeg and yt-dlp availability and exit.
    #[arg(long)]
    pub check_tools: bool,

    /// More diagnostic output (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Naming {
    Title,
    Id,
}

impl From<Naming> for FileNaming {
    fn from(naming: Naming) -> Self {
        match naming {
            Naming::Title => FileNaming::Title,
            Naming::Id => FileNaming::VideoId,
        }
    }
}

impl Cli {
    /// Layer the command line flags over `base`
    pub fn apply_to(&self, base: DownloaderConfig) -> DownloaderConfig {
        let mut config = base.with_file_naming(self.naming.into());
        if let Some(path) = &self.ffmpeg_path {
            config = config.with_transcoder_path(path);
        }
        if let Some(path) = &self.ytdlp_path {
            config = config.with_ytdlp_path(path);
        }
        if let Some(container) = &self.container {
            config = config.with_video_container(container.as_str());
        }
        if let Some(ext) = &self.audio_ext {
            config = config.with_audio_extension(ext.as_str());
        }
        if self.proxy.is_some() {
            config = config.with_proxy(self.proxy.clone());
        }
        config
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Build the job; quality defaults per format
    pub fn job(&self) -> Result<DownloadJob, DownloadError> {
        let quality = self
            .quality
            .unwrap_or_else(|| self.format.default_quality());
        DownloadJob::new(
            self.url.clone().unwrap_or_default(),
            self.output_dir(),
            self.format,
            quality,
        )
    }
}
