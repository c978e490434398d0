// FFmpeg transcode step - converts a fetched container into audio
//
// Contract: `<ffmpeg> -i <input> <output>`, output is the input path with
// the audio extension. Only a zero exit status together with an existing
// output counts as success; then the input is removed. On any failure the
// input stays where it is. ffmpeg refuses to overwrite without a terminal,
// so an output left by an earlier run is removed first.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::config::DownloaderConfig;
use super::errors::DownloadError;
use super::traits::Transcoder;
use super::utils::run_output_with_timeout;

pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
    extension: String,
    timeout_secs: u64,
}

impl FfmpegTranscoder {
    pub fn new(config: &DownloaderConfig) -> Self {
        Self {
            ffmpeg_path: config.transcoder_path.clone(),
            extension: config.audio_extension.clone(),
            timeout_secs: config.transcode_timeout_secs,
        }
    }

    /// Sibling of `input` carrying the target extension
    pub fn output_path(&self, input: &Path) -> PathBuf {
        input.with_extension(&self.extension)
    }

    fn build_args(input: &Path, output: &Path) -> Vec<std::ffi::OsString> {
        vec![
            "-i".into(),
            input.as_os_str().to_owned(),
            output.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn target_extension(&self) -> &str {
        &self.extension
    }

    async fn transcode(&self, input: &Path) -> Result<PathBuf, DownloadError> {
        let output = self.output_path(input);
        if output == input {
            // already in the target format, ffmpeg cannot convert in place
            return Ok(output);
        }

        match tokio::fs::remove_file(&output).await {
            Ok(()) => debug!(output = %output.display(), "removed stale output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DownloadError::Transcode(format!(
                    "could not replace {}: {}",
                    output.display(),
                    e
                )))
            }
        }

        info!(input = %input.display(), output = %output.display(), "transcoding");

        let result = run_output_with_timeout(
            self.ffmpeg_path.as_os_str(),
            Self::build_args(input, &output),
            self.timeout_secs,
        )
        .await
        .map_err(|e| {
            if e.is_missing_program() {
                DownloadError::Transcode(format!(
                    "transcoder not found at {}",
                    self.ffmpeg_path.display()
                ))
            } else {
                DownloadError::Transcode(e.to_string())
            }
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            debug!(status = %result.status, stderr = %stderr.trim(), "transcoder failed");
            return Err(DownloadError::Transcode(format!(
                "{} exited with {}: {}",
                self.ffmpeg_path.display(),
                result.status,
                last_line.trim()
            )));
        }

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(DownloadError::Transcode(format!(
                "transcoder reported success but {} is missing",
                output.display()
            )));
        }

        tokio::fs::remove_file(input).await.map_err(|e| {
            DownloadError::Transcode(format!("could not remove {}: {}", input.display(), e))
        })?;

        info!(output = %output.display(), "transcode finished");
        Ok(output)
    }
}
