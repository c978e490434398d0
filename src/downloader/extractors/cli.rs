// CLI platform client - uses the native `yt-dlp` binary
//
// One process per call, no retries:
// - resolve: `--dump-json --no-playlist` gives title + formats of one video
// - expand:  `--flat-playlist --dump-single-json` lists playlist members
//   without resolving each of them

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use super::diagnostics::{diagnose_error, error_context};
use crate::downloader::config::DownloaderConfig;
use crate::downloader::errors::{DownloadError, ResolutionFailure};
use crate::downloader::models::{
    MediaReference, PlaylistListing, StreamDescriptor, StreamHandle, StreamKind, VideoCatalog,
};
use crate::downloader::traits::PlatformClient;
use crate::downloader::utils::{
    bitrate_label, get_proxy_args, get_timeout_args, parse_resolution_label,
    run_output_with_timeout, ProcessError,
};

/// Watch URL used when a flat playlist entry only carries an id
const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// CLI-based platform client using the yt-dlp binary
pub struct CliInfoExtractor {
    ytdlp_path: PathBuf,
    proxy: Option<String>,
    socket_timeout_secs: u32,
    timeout_secs: u64,
}

impl CliInfoExtractor {
    pub fn new(config: &DownloaderConfig) -> Self {
        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            proxy: config.proxy.clone(),
            socket_timeout_secs: config.socket_timeout_secs,
            timeout_secs: config.resolve_timeout_secs,
        }
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string()];
        args.extend(get_timeout_args(self.socket_timeout_secs));
        args.extend(get_proxy_args(self.proxy.as_deref()));
        args
    }

    fn build_resolve_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["--dump-json".to_string(), "--no-playlist".to_string()];
        args.extend(self.common_args());
        args.push(url.to_string());
        args
    }

    fn build_playlist_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--flat-playlist".to_string(),
            "--dump-single-json".to_string(),
        ];
        args.extend(self.common_args());
        args.push(url.to_string());
        args
    }

    /// Run yt-dlp and return its stdout, turning any failure into a resolution error
    async fn run(&self, url: &str, args: Vec<String>) -> Result<Vec<u8>, DownloadError> {
        debug!(
            program = %self.ytdlp_path.display(),
            args = %args.join(" "),
            "running yt-dlp"
        );

        let output = run_output_with_timeout(self.ytdlp_path.as_os_str(), args, self.timeout_secs)
            .await
            .map_err(|e| {
                debug!(url, error = %e, "yt-dlp failed to run");
                let detail = match &e {
                    ProcessError::Spawn { .. } if e.is_missing_program() => format!(
                        "yt-dlp not found at {}",
                        self.ytdlp_path.display()
                    ),
                    _ => e.to_string(),
                };
                DownloadError::resolution(url, ResolutionFailure::Unreachable, detail)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(url, status = %output.status, stderr = %stderr.trim(), "yt-dlp failed");
            return Err(DownloadError::resolution(
                url,
                diagnose_error(&stderr),
                error_context(&stderr),
            ));
        }

        Ok(output.stdout)
    }

    /// Parse `--dump-json` output into a catalog
    pub fn parse_catalog(url: &str, stdout: &[u8]) -> Result<VideoCatalog, DownloadError> {
        let json = parse_json(url, stdout)?;

        let formats = json["formats"].as_array().ok_or_else(|| {
            DownloadError::resolution(url, ResolutionFailure::NoStreams, "No formats array in JSON")
        })?;

        let streams = Self::parse_formats(formats);
        if streams.is_empty() {
            return Err(DownloadError::resolution(
                url,
                ResolutionFailure::NoStreams,
                "No downloadable formats",
            ));
        }

        Ok(VideoCatalog {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            streams,
        })
    }

    /// Map yt-dlp formats to descriptors, keeping platform order.
    ///
    /// Formats without a direct URL (storyboards, fragmented HLS/DASH) are
    /// skipped: the fetcher downloads with a single GET.
    pub fn parse_formats(formats: &[serde_json::Value]) -> Vec<StreamDescriptor> {
        let present = |v: Option<&str>| v.map_or(false, |c| c != "none" && !c.is_empty());

        formats
            .iter()
            .filter_map(|f| {
                let handle = f["url"].as_str()?;
                let protocol = f["protocol"].as_str().unwrap_or("https");
                if !protocol.starts_with("http") || protocol == "http_dash_segments" {
                    return None;
                }

                let has_video = present(f["vcodec"].as_str());
                let has_audio = present(f["acodec"].as_str());
                let kind = match (has_video, has_audio) {
                    (true, true) => StreamKind::Progressive,
                    (false, true) => StreamKind::AudioOnly,
                    (true, false) => StreamKind::VideoOnly,
                    (false, false) => return None,
                };

                Some(StreamDescriptor {
                    format_id: f["format_id"].as_str().unwrap_or("").to_string(),
                    kind,
                    container: f["ext"].as_str().unwrap_or("bin").to_string(),
                    resolution: if has_video {
                        nominal_resolution(f)
                    } else {
                        None
                    },
                    bitrate: if has_audio {
                        f["abr"].as_f64().filter(|a| *a > 0.0).map(bitrate_label)
                    } else {
                        None
                    },
                    handle: StreamHandle::new(handle).with_headers(http_headers(f)),
                })
            })
            .collect()
    }

    /// Parse `--flat-playlist --dump-single-json` output
    pub fn parse_playlist(url: &str, stdout: &[u8]) -> Result<PlaylistListing, DownloadError> {
        let json = parse_json(url, stdout)?;

        let entries = json["entries"].as_array().ok_or_else(|| {
            DownloadError::resolution(url, ResolutionFailure::Malformed, "No entries array in JSON")
        })?;

        let entries = entries
            .iter()
            .filter_map(|entry| {
                entry["url"]
                    .as_str()
                    .or_else(|| entry["webpage_url"].as_str())
                    .map(str::to_string)
                    .or_else(|| {
                        entry["id"]
                            .as_str()
                            .map(|id| format!("{}{}", WATCH_URL_PREFIX, id))
                    })
            })
            .map(MediaReference::video)
            .collect();

        Ok(PlaylistListing {
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            entries,
        })
    }
}

fn parse_json(url: &str, stdout: &[u8]) -> Result<serde_json::Value, DownloadError> {
    serde_json::from_slice(stdout).map_err(|e| {
        DownloadError::resolution(url, ResolutionFailure::Malformed, format!("Invalid JSON: {}", e))
    })
}

/// Nominal label like "720p".
///
/// `format_note` carries the platform's own label; without it the short
/// side of the frame is used, so portrait 1080x1920 is "1080p" and not
/// "1920p".
fn nominal_resolution(format: &serde_json::Value) -> Option<String> {
    if let Some(height) = format["format_note"].as_str().and_then(parse_resolution_label) {
        return Some(format!("{}p", height));
    }

    let height = format["height"].as_u64();
    let short_side = match (format["width"].as_u64(), height) {
        (Some(w), Some(h)) => Some(w.min(h)),
        _ => height,
    };
    short_side.map(|h| format!("{}p", h))
}

/// Request headers yt-dlp says the media URL needs (User-Agent, Referer, ...)
fn http_headers(format: &serde_json::Value) -> BTreeMap<String, String> {
    format["http_headers"]
        .as_object()
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PlatformClient for CliInfoExtractor {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn resolve(&self, reference: &MediaReference) -> Result<VideoCatalog, DownloadError> {
        let url = reference.url();
        let stdout = self.run(url, self.build_resolve_args(url)).await?;
        let catalog = Self::parse_catalog(url, &stdout)?;
        info!(
            url,
            title = %catalog.title,
            streams = catalog.streams.len(),
            "resolved video"
        );
        Ok(catalog)
    }

    async fn expand_playlist(
        &self,
        reference: &MediaReference,
    ) -> Result<PlaylistListing, DownloadError> {
        let url = reference.url();
        let stdout = self.run(url, self.build_playlist_args(url)).await?;
        let listing = Self::parse_playlist(url, &stdout)?;
        info!(
            url,
            title = %listing.title,
            videos = listing.entries.len(),
            "expanded playlist"
        );
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_video_json() -> serde_json::Value {
        json!({
            "id": "abc",
            "title": "Sample Title",
            "formats": [
                {
                    "format_id": "sb0", "ext": "mhtml", "protocol": "mhtml",
                    "vcodec": "none", "acodec": "none", "url": "https://sb"
                },
                {
                    "format_id": "139", "ext": "m4a", "protocol": "https",
                    "vcodec": "none", "acodec": "mp4a.40.5", "abr": 48.8,
                    "url": "https://cdn/139"
                },
                {
                    "format_id": "140", "ext": "m4a", "protocol": "https",
                    "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5,
                    "url": "https://cdn/140",
                    "http_headers": {
                        "User-Agent": "Mozilla/5.0",
                        "Referer": "https://host/watch?id=abc",
                        "X-Ignored": 1
                    }
                },
                {
                    "format_id": "137", "ext": "mp4", "protocol": "https",
                    "vcodec": "avc1.640028", "acodec": "none",
                    "width": 1920, "height": 1080, "url": "https://cdn/137"
                },
                {
                    "format_id": "18", "ext": "mp4", "protocol": "https",
                    "vcodec": "avc1.42001E", "acodec": "mp4a.40.2",
                    "height": 360, "abr": 96.0, "url": "https://cdn/18"
                },
                {
                    "format_id": "hls-720", "ext": "mp4", "protocol": "m3u8_native",
                    "vcodec": "avc1", "acodec": "mp4a", "height": 720,
                    "url": "https://cdn/hls"
                }
            ]
        })
    }

    #[test]
    fn test_parse_catalog() {
        let stdout = serde_json::to_vec(&sample_video_json()).unwrap();
        let catalog =
            CliInfoExtractor::parse_catalog("https://host/watch?id=abc", &stdout).unwrap();

        assert_eq!(catalog.id, "abc");
        assert_eq!(catalog.title, "Sample Title");
        let ids: Vec<&str> = catalog.streams.iter().map(|s| s.format_id.as_str()).collect();
        assert_eq!(ids, vec!["139", "140", "137", "18"]);

        let aac = &catalog.streams[1];
        assert_eq!(aac.kind, StreamKind::AudioOnly);
        assert_eq!(aac.bitrate.as_deref(), Some("128kbps"));
        assert_eq!(aac.resolution, None);
        assert_eq!(aac.handle.as_str(), "https://cdn/140");
        let headers = aac.handle.headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["User-Agent"], "Mozilla/5.0");
        assert_eq!(headers["Referer"], "https://host/watch?id=abc");
        assert!(catalog.streams[0].handle.headers().is_empty());

        let video_only = &catalog.streams[2];
        assert_eq!(video_only.kind, StreamKind::VideoOnly);
        assert_eq!(video_only.resolution.as_deref(), Some("1080p"));

        let muxed = &catalog.streams[3];
        assert_eq!(muxed.kind, StreamKind::Progressive);
        assert_eq!(muxed.container, "mp4");
        assert_eq!(muxed.resolution.as_deref(), Some("360p"));
    }

    #[test]
    fn test_nominal_resolution() {
        let portrait = json!({"width": 1080, "height": 1920});
        assert_eq!(nominal_resolution(&portrait).as_deref(), Some("1080p"));

        let letterboxed = json!({"format_note": "720p", "width": 1280, "height": 536});
        assert_eq!(nominal_resolution(&letterboxed).as_deref(), Some("720p"));

        let high_fps = json!({"format_note": "1080p60", "height": 1080});
        assert_eq!(nominal_resolution(&high_fps).as_deref(), Some("1080p"));

        let noted_oddly = json!({"format_note": "medium", "height": 480});
        assert_eq!(nominal_resolution(&noted_oddly).as_deref(), Some("480p"));

        assert_eq!(nominal_resolution(&json!({})), None);
    }

    #[test]
    fn test_parse_catalog_without_streams() {
        let stdout = serde_json::to_vec(&json!({"id": "x", "title": "t", "formats": []})).unwrap();
        let err = CliInfoExtractor::parse_catalog("u", &stdout).unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Resolution { cause: ResolutionFailure::NoStreams, .. }
        ));
    }

    #[test]
    fn test_parse_catalog_invalid_json() {
        let err = CliInfoExtractor::parse_catalog("u", b"not json").unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Resolution { cause: ResolutionFailure::Malformed, .. }
        ));
    }

    #[test]
    fn test_parse_playlist_keeps_order() {
        let stdout = serde_json::to_vec(&json!({
            "_type": "playlist",
            "title": "Mix",
            "entries": [
                {"id": "b", "url": "https://www.youtube.com/watch?v=b"},
                {"id": "a"},
                {"id": "b", "url": "https://www.youtube.com/watch?v=b"}
            ]
        }))
        .unwrap();

        let listing =
            CliInfoExtractor::parse_playlist("https://host/playlist?list=1", &stdout).unwrap();
        assert_eq!(listing.title, "Mix");
        let urls: Vec<&str> = listing.entries.iter().map(|e| e.url()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=b",
                "https://www.youtube.com/watch?v=a",
                "https://www.youtube.com/watch?v=b",
            ]
        );
        assert!(listing.entries.iter().all(|e| !e.is_playlist()));
    }

    #[test]
    fn test_build_args() {
        let config = DownloaderConfig::default()
            .with_proxy(Some("socks5h://127.0.0.1:1080".to_string()))
            .with_socket_timeout(15);
        let extractor = CliInfoExtractor::new(&config);

        let args = extractor.build_resolve_args("https://host/watch?id=abc");
        assert_eq!(args[0], "--dump-json");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "--socket-timeout" && w[1] == "15"));
        assert!(args.windows(2).any(|w| w[0] == "--proxy" && w[1] == "socks5h://127.0.0.1:1080"));
        assert_eq!(args.last().unwrap(), "https://host/watch?id=abc");

        let args = extractor.build_playlist_args("https://host/playlist?list=1");
        assert_eq!(args[0], "--flat-playlist");
        assert_eq!(args.last().unwrap(), "https://host/playlist?list=1");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unreachable() {
        let config = DownloaderConfig::default().with_ytdlp_path("/nonexistent/yt-dlp");
        let extractor = CliInfoExtractor::new(&config);
        let err = extractor
            .resolve(&MediaReference::parse("https://host/watch?id=abc"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Resolution { cause: ResolutionFailure::Unreachable, .. }
        ));
    }

    #[cfg(unix)]
    mod stub {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn install_ytdlp_stub(dir: &Path, script: &str) -> PathBuf {
            let path = dir.join("yt-dlp");
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_resolve_through_stub() {
            let temp = tempfile::tempdir().unwrap();
            let script = r#"#!/bin/sh
cat <<'JSON'
{"id": "abc", "title": "Stub", "formats": [
  {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
   "abr": 191.0, "url": "https://cdn/140"}
]}
JSON
"#;
            let stub = install_ytdlp_stub(temp.path(), script);
            let config = DownloaderConfig::default().with_ytdlp_path(stub);
            let extractor = CliInfoExtractor::new(&config);

            let catalog = extractor
                .resolve(&MediaReference::parse("https://host/watch?id=abc"))
                .await
                .unwrap();
            assert_eq!(catalog.title, "Stub");
            assert_eq!(catalog.streams[0].bitrate.as_deref(), Some("192kbps"));
        }

        #[tokio::test]
        async fn test_stub_failure_is_classified() {
            let temp = tempfile::tempdir().unwrap();
            let script = "#!/bin/sh\necho 'ERROR: [youtube] abc: Private video' >&2\nexit 1\n";
            let stub = install_ytdlp_stub(temp.path(), script);
            let config = DownloaderConfig::default().with_ytdlp_path(stub);
            let extractor = CliInfoExtractor::new(&config);

            let err = extractor
                .resolve(&MediaReference::parse("https://host/watch?id=abc"))
                .await
                .unwrap_err();
            match err {
                DownloadError::Resolution { cause, detail, .. } => {
                    assert_eq!(cause, ResolutionFailure::Unavailable);
                    assert_eq!(detail, "[youtube] abc: Private video");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_hanging_client_times_out() {
            let temp = tempfile::tempdir().unwrap();
            let stub = install_ytdlp_stub(temp.path(), "#!/bin/sh\nsleep 10\n");
            let config = DownloaderConfig::default()
                .with_ytdlp_path(stub)
                .with_resolve_timeout(1);
            let extractor = CliInfoExtractor::new(&config);

            let err = extractor
                .expand_playlist(&MediaReference::parse("https://host/playlist?list=1"))
                .await
                .unwrap_err();
            match err {
                DownloadError::Resolution { cause, detail, .. } => {
                    assert_eq!(cause, ResolutionFailure::Unreachable);
                    assert!(detail.contains("timed out"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
