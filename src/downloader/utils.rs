// Helper functions shared by the pipeline stages

use std::ffi::OsStr;
use std::process::Stdio;

use regex::Regex;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::models::AudioBitrate;

lazy_static::lazy_static! {
    static ref RESOLUTION_RE: Regex = Regex::new(r"^(\d+)p(?:\d+)?$").unwrap();
    static ref BITRATE_RE: Regex = Regex::new(r"(\d+)\s*kbps").unwrap();
    static ref UNSAFE_FILENAME_RE: Regex =
        Regex::new(r##"[\x00-\x1f\x7f"#$%'*,/:;<>?\\^|~]"##).unwrap();
    static ref SPACES_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Longest file stem in bytes; leaves room for an extension under the common
/// 255 byte file name limit
const MAX_STEM_BYTES: usize = 200;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },
}

impl ProcessError {
    /// The executable could not be found at all
    pub fn is_missing_program(&self) -> bool {
        matches!(
            self,
            Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Run a command to completion, collecting stdout/stderr, killing it on timeout
pub async fn run_output_with_timeout<I, S>(
    program: &OsStr,
    args: I,
    timeout_secs: u64,
) -> Result<std::process::Output, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.to_string_lossy().to_string();
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: name.clone(),
            source,
        })?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res.map_err(|source| ProcessError::Wait {
                program: name.clone(),
                source,
            })?;
            let stdout = stdout_task.await.unwrap_or_default();
            let stderr = stderr_task.await.unwrap_or_default();
            debug!(program = %name, ?status, "process finished");
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(ProcessError::TimedOut {
                program: name,
                secs: timeout_secs,
            })
        }
    }
}

/// "720p" -> 720, "1080p60" -> 1080
pub fn parse_resolution_label(label: &str) -> Option<u32> {
    RESOLUTION_RE
        .captures(label.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// "192kbps" -> 192, also finds the value inside "high (192kbps)"
pub fn parse_bitrate_label(label: &str) -> Option<u32> {
    BITRATE_RE
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Nominal label for a measured audio bitrate.
///
/// Platforms report measured averages (129.5, 160.1, ...), so a value within
/// 10% of a known tier gets that tier's label; anything else is rounded.
pub fn bitrate_label(abr: f64) -> String {
    // windows of neighbouring tiers overlap (160 and 192), nearest one wins
    let nominal = AudioBitrate::ALL
        .into_iter()
        .map(|tier| (tier, (abr - tier.kbps() as f64).abs()))
        .filter(|(tier, distance)| *distance <= tier.kbps() as f64 / 10.0)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(tier, _)| tier);

    match nominal {
        Some(tier) => tier.label().to_string(),
        None => format!("{:.0}kbps", abr),
    }
}

/// Turn a video title into a file stem safe on every common filesystem
pub fn sanitize_file_stem(title: &str) -> String {
    let cleaned = UNSAFE_FILENAME_RE.replace_all(title, "");
    let collapsed = SPACES_RE.replace_all(cleaned.trim(), " ");
    let trimmed = collapsed.trim_matches(|c: char| c == '.' || c.is_whitespace());
    truncate_to_bytes(trimmed, MAX_STEM_BYTES).trim_end().to_string()
}

/// Longest prefix of `s` within `max_bytes`, cut on a char boundary
fn truncate_to_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Build proxy arguments for yt-dlp
pub fn get_proxy_args(proxy: Option<&str>) -> Vec<String> {
    match proxy {
        Some(p) if !p.trim().is_empty() => vec!["--proxy".to_string(), p.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Build timeout arguments for yt-dlp
pub fn get_timeout_args(socket_timeout_secs: u32) -> Vec<String> {
    vec![
        "--socket-timeout".to_string(),
        socket_timeout_secs.to_string(),
    ]
}
