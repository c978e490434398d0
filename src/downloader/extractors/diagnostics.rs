// Failure diagnostics - maps platform client error output to a cause
//
// yt-dlp reports everything on stderr as free text; the orchestrator and
// the front end only need to know which of the resolution failure causes
// applies, plus a one-line context to show the user.

use crate::downloader::errors::ResolutionFailure;

/// Analyze an error message and return the failure cause
pub fn diagnose_error(error: &str) -> ResolutionFailure {
    let lower = error.to_lowercase();

    // Restrictions and removals
    if lower.contains("video unavailable")
        || lower.contains("video is unavailable")
        || lower.contains("video has been removed")
        || lower.contains("no longer available")
        || lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age-restricted")
        || lower.contains("available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("members only")
        || lower.contains("members-only")
        || lower.contains("drm")
        || lower.contains("requires payment")
        || lower.contains("does not exist")
        || lower.contains("403")
        || lower.contains("forbidden")
    {
        return ResolutionFailure::Unavailable;
    }

    // Nothing to download
    if lower.contains("no video formats")
        || lower.contains("requested format is not available")
        || lower.contains("no formats")
    {
        return ResolutionFailure::NoStreams;
    }

    // Network level
    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("network is unreachable")
        || lower.contains("name or service not known")
        || lower.contains("failed to resolve")
        || lower.contains("temporary failure in name resolution")
        || lower.contains("unable to download webpage")
        || lower.contains("429")
        || lower.contains("too many requests")
    {
        return ResolutionFailure::Unreachable;
    }

    // Unsupported or malformed URLs never reach any stream
    if lower.contains("unsupported url") || lower.contains("is not a valid url") {
        return ResolutionFailure::Unavailable;
    }

    ResolutionFailure::Malformed
}

/// First useful line of an error dump, for display
pub fn error_context(error: &str) -> String {
    let lines = || error.lines().map(str::trim).filter(|l| !l.is_empty());

    lines()
        .find(|l| l.to_lowercase().starts_with("error:"))
        .or_else(|| lines().last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| "no error output".to_string())
}
