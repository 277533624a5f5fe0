// Extraction providers
//
// Only the native yt-dlp CLI is wired up; other providers plug in through
// `ExtractionProvider`.

mod cli;
pub mod progress;

pub use cli::YtDlpProvider;
