// Platform clients - turn a URL into a stream catalog or a playlist listing
//
// The yt-dlp binary does the talking to the platform; this module owns the
// invocation and the mapping of its JSON and error output.

mod cli;
mod diagnostics;

pub use cli::CliInfoExtractor;
pub use diagnostics::{diagnose_error, error_context};
