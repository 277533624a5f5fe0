// Extraction provider and progress sink traits

use async_trait::async_trait;

use super::errors::DownloadError;
use super::models::{FetchOutcome, FetchRequest, MediaInfo, ProgressEvent};

/// External collaborator that resolves URLs and performs the actual fetch
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Provider version, if it can be determined
    async fn version(&self) -> Option<String>;

    /// Resolve metadata and raw streams without downloading
    async fn extract_info(&self, url: &str) -> Result<MediaInfo, DownloadError>;

    /// Fetch media, reporting transfer progress to `sink` as it happens.
    ///
    /// Failures reported by the provider itself come back as
    /// `DownloadError::Provider` and are classified by the caller.
    async fn fetch(
        &self,
        url: &str,
        request: &FetchRequest,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutcome, DownloadError>;
}

/// Receives progress events from the provider's transfer loop.
///
/// Called on the task driving the transfer; implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

