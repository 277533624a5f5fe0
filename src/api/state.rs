use crate::downloader::orchestrator::DownloadOrchestrator;

/// Shared application state
pub struct AppState {
    orchestrator: DownloadOrchestrator,
    /// Provider version resolved once at startup
    provider_version: Option<String>,
}

impl AppState {
    pub fn new(orchestrator: DownloadOrchestrator, provider_version: Option<String>) -> Self {
        Self {
            orchestrator,
            provider_version,
        }
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator {
        &self.orchestrator
    }

    pub fn provider_version(&self) -> Option<&str> {
        self.provider_version.as_deref()
    }
}
