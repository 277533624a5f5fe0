// Downloader module - download core behind the HTTP surface

pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod sanitize;
pub mod traits;
pub mod utils;

pub use errors::DownloadError;
pub use format_selector::{FormatSelector, SelectionPolicy};
pub use jobs::{InMemoryJobStore, JobProgressSink, JobStore};
pub use models::{DownloadOutcome, DownloadRequest, InspectResult, Job, JobStatus, QualityTier};
pub use orchestrator::DownloadOrchestrator;
pub use traits::{ExtractionProvider, ProgressSink};
