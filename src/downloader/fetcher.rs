// HTTP fetcher - streams a selected stream to disk

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::config::DownloaderConfig;
use super::errors::DownloadError;
use super::models::StreamDescriptor;
use super::traits::MediaFetcher;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.socket_timeout_secs as u64));

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| DownloadError::Fetch(format!("Invalid proxy {}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        target_dir: &Path,
        file_stem: &str,
    ) -> Result<PathBuf, DownloadError> {
        tokio::fs::create_dir_all(target_dir).await?;
        let target_dir = tokio::fs::canonicalize(target_dir).await?;
        let path = target_dir.join(format!("{}.{}", file_stem, stream.container));

        info!(format_id = %stream.format_id, path = %path.display(), "starting download");

        let mut request = self.client.get(stream.handle.as_str());
        for (name, value) in stream.handle.headers() {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(DownloadError::Fetch(format!("HTTP error: {}", response.status())));
        }

        let total = response.content_length();
        let mut file = File::create(&path).await?;
        let mut body = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_update = Instant::now();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if last_update.elapsed() >= PROGRESS_INTERVAL {
                debug!(
                    bytes = downloaded,
                    total = ?total,
                    path = %path.display(),
                    "download progress"
                );
                last_update = Instant::now();
            }
        }

        file.flush().await?;

        if let Some(expected) = total {
            if downloaded < expected {
                return Err(DownloadError::Fetch(format!(
                    "Connection closed after {} of {} bytes",
                    downloaded, expected
                )));
            }
        }

        info!(bytes = downloaded, path = %path.display(), "download finished");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::{StreamHandle, StreamKind};
    use std::collections::BTreeMap;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a local port; the handle
    /// yields the raw request head
    async fn serve_once(
        status_line: &'static str,
        body: &'static [u8],
    ) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let head = format!(
                "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });

        (format!("http://{}/media", addr), server)
    }

    fn stream(url: String) -> StreamDescriptor {
        StreamDescriptor {
            format_id: "140".to_string(),
            kind: StreamKind::AudioOnly,
            container: "m4a".to_string(),
            resolution: None,
            bitrate: Some("128kbps".to_string()),
            handle: StreamHandle::new(url),
        }
    }

    #[tokio::test]
    async fn test_fetch_writes_file() {
        let (url, _server) = serve_once("HTTP/1.1 200 OK", b"audio-bytes").await;
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("nested").join("out");

        let fetcher = HttpFetcher::new(&DownloaderConfig::default()).unwrap();
        let path = fetcher.fetch(&stream(url), &target, "abc").await.unwrap();

        assert!(path.is_absolute());
        assert_eq!(path.file_name().unwrap(), "abc.m4a");
        assert_eq!(std::fs::read(&path).unwrap(), b"audio-bytes");
    }

    #[tokio::test]
    async fn test_fetch_sends_stream_headers() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", b"ok").await;
        let temp = tempfile::tempdir().unwrap();

        let mut descriptor = stream(url.clone());
        descriptor.handle = StreamHandle::new(url).with_headers(BTreeMap::from([
            ("User-Agent".to_string(), "Mozilla/5.0 (test)".to_string()),
            ("Referer".to_string(), "https://host/watch?id=abc".to_string()),
        ]));

        let fetcher = HttpFetcher::new(&DownloaderConfig::default()).unwrap();
        fetcher.fetch(&descriptor, temp.path(), "abc").await.unwrap();

        let head = String::from_utf8(server.await.unwrap()).unwrap().to_lowercase();
        assert!(head.contains("user-agent: mozilla/5.0 (test)"));
        assert!(head.contains("referer: https://host/watch?id=abc"));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let (url, _server) = serve_once("HTTP/1.1 404 Not Found", b"").await;
        let temp = tempfile::tempdir().unwrap();

        let fetcher = HttpFetcher::new(&DownloaderConfig::default()).unwrap();
        let err = fetcher.fetch(&stream(url), temp.path(), "abc").await.unwrap_err();

        assert_eq!(err.kind(), "fetch");
        assert!(!temp.path().join("abc.m4a").exists());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let temp = tempfile::tempdir().unwrap();
        let fetcher = HttpFetcher::new(&DownloaderConfig::default()).unwrap();
        let result = fetcher
            .fetch(&stream(format!("http://{}/media", addr)), temp.path(), "abc")
            .await;

        assert!(matches!(result, Err(DownloadError::Fetch(_))));
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let config = DownloaderConfig::default().with_proxy(Some("::not a proxy::".to_string()));
        assert!(HttpFetcher::new(&config).is_err());
    }
}
