// Discovery of the external executables the pipeline depends on.
//
// Paths are resolved once and handed to the components that need them;
// nothing here edits the process environment.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    /// Transcoder used for audio conversion
    Ffmpeg,
    /// Platform client used to resolve videos and playlists
    YtDlp,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "ffmpeg",
            ToolType::YtDlp => "yt-dlp",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "-version",
            ToolType::YtDlp => "--version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

#[derive(Debug, Default)]
pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.detect_tool(tool_type);
        let version = path.as_deref().and_then(|p| self.get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            // found on disk but refusing to run counts as unavailable
            is_available: version.is_some(),
            version,
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::Ffmpeg),
            self.get_tool_info(ToolType::YtDlp),
        ]
    }

    /// Detected path, or the bare binary name left for the OS to look up
    pub fn resolve_path(&self, tool_type: ToolType) -> PathBuf {
        self.detect_tool(tool_type)
            .unwrap_or_else(|| PathBuf::from(tool_type.as_str()))
    }

    fn detect_tool(&self, tool_type: ToolType) -> Option<PathBuf> {
        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];

        for path in common_paths {
            if Path::new(&path).exists() {
                debug!(tool = binary_name, %path, "found tool in common location");
                return Some(PathBuf::from(path));
            }
        }

        // 2. Try PATH
        let locator = if cfg!(windows) { "where" } else { "which" };
        if let Ok(output) = Command::new(locator).arg(binary_name).output() {
            if output.status.success() {
                let found = String::from_utf8_lossy(&output.stdout);
                if let Some(first) = found.lines().map(str::trim).find(|l| !l.is_empty()) {
                    debug!(tool = binary_name, path = first, "found tool on PATH");
                    return Some(PathBuf::from(first));
                }
            }
        }

        None
    }

    fn get_version(&self, path: &Path, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; the first line carries the version
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(|l| l.trim().to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names() {
        assert_eq!(ToolType::Ffmpeg.as_str(), "ffmpeg");
        assert_eq!(ToolType::YtDlp.as_str(), "yt-dlp");
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        let manager = ToolManager::new();
        assert!(manager
            .get_version(Path::new("/nonexistent/ffmpeg"), ToolType::Ffmpeg)
            .is_none());
    }

    #[test]
    fn test_resolve_path_never_empty() {
        let manager = ToolManager::new();
        let path = manager.resolve_path(ToolType::YtDlp);
        assert!(!path.as_os_str().is_empty());
        assert!(path.to_string_lossy().contains("yt-dlp"));
    }
}
