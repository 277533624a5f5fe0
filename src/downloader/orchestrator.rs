// Download orchestrator - inspect, start, poll, serve and clean up
//
// Owns the managed output directory. The extraction provider and the job
// store are injected, so either can be swapped without touching this file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::format_selector::{format_duration, FormatSelector, SelectionPolicy};
use super::jobs::{JobProgressSink, JobStore};
use super::models::{DownloadOutcome, DownloadRequest, FetchRequest, InspectResult, Job};
use super::sanitize::{build_output_path, sanitize_title, OutputPath};
use super::traits::ExtractionProvider;

/// Artifacts left behind by an unfinished or interrupted transfer
const PARTIAL_SUFFIXES: [&str; 3] = [".part", ".ytdl", ".temp"];

pub struct DownloadOrchestrator {
    provider: Arc<dyn ExtractionProvider>,
    jobs: Arc<dyn JobStore>,
    download_dir: PathBuf,
}

impl DownloadOrchestrator {
    pub fn new(
        provider: Arc<dyn ExtractionProvider>,
        jobs: Arc<dyn JobStore>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            jobs,
            download_dir: download_dir.into(),
        }
    }

    pub fn provider(&self) -> &dyn ExtractionProvider {
        self.provider.as_ref()
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.jobs
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Resolve metadata and the ranked quality tiers for a URL
    pub async fn inspect(&self, url: &str) -> Result<InspectResult, DownloadError> {
        let url = require_url(url)?;
        debug!(url, provider = self.provider.name(), "inspecting");

        let info = self
            .provider
            .extract_info(url)
            .await
            .map_err(DownloadError::classify_inspect_failure)?;

        let formats = FormatSelector::rank(&info.formats);
        info!(url, id = %info.id, tiers = formats.len(), "inspected");

        Ok(InspectResult {
            duration_str: format_duration(info.duration),
            id: info.id,
            title: info.title,
            thumbnail: info.thumbnail,
            duration: info.duration,
            channel: info.channel,
            view_count: info.view_count.unwrap_or(0),
            formats,
        })
    }

    /// Download one media item, tracking progress under its media id.
    ///
    /// Runs to completion; callers poll `progress` from elsewhere meanwhile.
    pub async fn start(&self, request: &DownloadRequest) -> Result<DownloadOutcome, DownloadError> {
        let url = require_url(&request.url)?;

        let info = self
            .provider
            .extract_info(url)
            .await
            .map_err(DownloadError::classify_download_failure)?;
        let job_id = info.id;
        let title = sanitize_title(&info.title);
        self.jobs.create(&job_id);

        let policy = SelectionPolicy::from_request(
            request.format_id.as_deref(),
            request.quality.as_deref(),
            request.audio_only,
        );
        let output = build_output_path(&self.download_dir, &title, policy.is_audio_only());
        info!(
            job_id = %job_id,
            format = %policy.format_spec(),
            output = %output.template(),
            "starting download"
        );

        match self.fetch_and_locate(url, &job_id, policy, output).await {
            Ok(filename) => {
                self.jobs.complete(&job_id, &filename);
                info!(job_id = %job_id, filename = %filename, "download finished");
                Ok(DownloadOutcome {
                    success: true,
                    video_id: job_id,
                    filename,
                    message: "Download concluído!".to_string(),
                })
            }
            Err(e) => {
                let e = e.classify_download_failure();
                warn!(job_id = %job_id, error = %e, "download failed");
                self.jobs.fail(&job_id, &e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch_and_locate(
        &self,
        url: &str,
        job_id: &str,
        policy: SelectionPolicy,
        output: OutputPath,
    ) -> Result<String, DownloadError> {
        let sink = JobProgressSink::new(job_id, Arc::clone(&self.jobs));
        let request = FetchRequest { policy, output };
        let outcome = self.provider.fetch(url, &request, &sink).await?;

        if let Some(name) = self.reported_file(outcome.file_path.as_deref()).await {
            return Ok(name);
        }

        debug!(job_id, prefix = %request.output.match_prefix(), "scanning for produced file");
        match self.scan_for_output(&request.output).await? {
            Some(name) => Ok(name),
            None => Err(DownloadError::FileNotFound(
                "Arquivo não encontrado após download".to_string(),
            )),
        }
    }

    /// File name of the provider-reported path, if it landed in the managed directory
    async fn reported_file(&self, reported: Option<&Path>) -> Option<String> {
        let name = reported?.file_name()?.to_str()?.to_string();
        let candidate = self.download_dir.join(&name);
        match tokio::fs::metadata(&candidate).await {
            Ok(meta) if meta.is_file() => Some(name),
            _ => None,
        }
    }

    /// Newest finished file whose name contains the title prefix
    async fn scan_for_output(&self, output: &OutputPath) -> Result<Option<String>, DownloadError> {
        let prefix = output.match_prefix();
        let mut best: Option<(SystemTime, String)> = None;

        let mut entries = tokio::fs::read_dir(&self.download_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if !name.contains(&prefix) || PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            if best.as_ref().map_or(true, |(t, _)| modified > *t) {
                best = Some((modified, name));
            }
        }

        Ok(best.map(|(_, name)| name))
    }

    /// Current progress record; unknown ids read back as `unknown`
    pub fn progress(&self, job_id: &str) -> Job {
        self.jobs.get(job_id)
    }

    /// Path of a finished file in the managed directory.
    ///
    /// Only bare file names are accepted.
    pub async fn resolve_file(&self, name: &str) -> Result<PathBuf, DownloadError> {
        let not_found = || DownloadError::NoSuchFile("Arquivo não encontrado".to_string());

        if name.is_empty()
            || name.starts_with('.')
            || name.contains("..")
            || name.contains(['/', '\\'])
        {
            warn!(name, "rejected file request");
            return Err(not_found());
        }

        let path = self.download_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(not_found()),
        }
    }

    /// Remove every regular file in the managed directory
    pub async fn cleanup(&self) -> Result<usize, DownloadError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.download_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        info!(removed, dir = %self.download_dir.display(), "cleaned download directory");
        Ok(removed)
    }
}

fn require_url(url: &str) -> Result<&str, DownloadError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DownloadError::Validation("URL não fornecida".to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::jobs::InMemoryJobStore;
    use crate::downloader::models::{JobStatus, ProgressEvent, ProgressStatus};
    use crate::testing::{sample_info, MockProvider, ProducedFile};
    use tempfile::TempDir;

    fn orchestrator(provider: MockProvider, dir: &TempDir) -> DownloadOrchestrator {
        DownloadOrchestrator::new(
            Arc::new(provider),
            Arc::new(InMemoryJobStore::new()),
            dir.path(),
        )
    }

    fn video_request(quality: &str) -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            format_id: Some("136".to_string()),
            quality: Some(quality.to_string()),
            audio_only: false,
        }
    }

    #[tokio::test]
    async fn test_inspect() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(MockProvider::new(sample_info("abc", "Clip")), &dir);

        let result = orch.inspect("  https://youtu.be/abc ").await.unwrap();
        assert_eq!(result.id, "abc");
        assert_eq!(result.duration_str, "03:32");
        assert_eq!(result.view_count, 1_000);
        let heights: Vec<u32> = result.formats.iter().map(|t| t.height_px).collect();
        assert_eq!(heights, vec![1080, 720, 360, 0]);
        assert!(result.formats.last().unwrap().audio_only);
    }

    #[tokio::test]
    async fn test_inspect_requires_url() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(MockProvider::new(sample_info("abc", "Clip")), &dir);

        let err = orch.inspect("   ").await.unwrap_err();
        assert!(matches!(err, DownloadError::Validation(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_inspect_provider_failure_is_extraction() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::new(sample_info("abc", "Clip"))
            .with_info_error("ERROR: [youtube] abc: Private video");
        let orch = orchestrator(provider, &dir);

        let err = orch.inspect("https://youtu.be/abc").await.unwrap_err();
        assert!(matches!(err, DownloadError::Extraction(_)));
        assert!(err.to_string().starts_with("Erro ao obter informações: "));
    }

    #[tokio::test]
    async fn test_start_video() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::new(sample_info("abc", "My: Clip"));
        let orch = orchestrator(provider.clone(), &dir);

        let outcome = orch.start(&video_request("720p")).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.video_id, "abc");
        assert_eq!(outcome.filename, "My_ Clip_720p.mp4");
        assert_eq!(outcome.message, "Download concluído!");
        assert!(dir.path().join(&outcome.filename).is_file());

        let job = orch.progress("abc");
        assert_eq!(job.status, JobStatus::Finished);
        assert_eq!(job.percent, 100.0);
        assert_eq!(job.result_path.as_deref(), Some("My_ Clip_720p.mp4"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].policy, SelectionPolicy::MaxHeight(720));
    }

    #[tokio::test]
    async fn test_start_audio_only() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::new(sample_info("abc", "Song")).producing(
            ProducedFile::Expected {
                height: "NA".to_string(),
                ext: "mp3".to_string(),
            },
        );
        let orch = orchestrator(provider.clone(), &dir);

        let request = DownloadRequest {
            url: "https://youtu.be/abc".to_string(),
            format_id: Some("bestaudio".to_string()),
            ..DownloadRequest::default()
        };
        let outcome = orch.start(&request).await.unwrap();
        assert_eq!(outcome.filename, "Song.mp3");
        assert!(provider.requests()[0].policy.is_audio_only());
    }

    #[tokio::test]
    async fn test_start_falls_back_to_scan() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Other video.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("Clip_1080p.f137.mp4.part"), b"x").unwrap();

        let provider = MockProvider::new(sample_info("abc", "Clip"))
            .producing(ProducedFile::Named("Clip_1080p.mkv".to_string()))
            .reporting_path(false);
        let orch = orchestrator(provider, &dir);

        let outcome = orch.start(&video_request("1080")).await.unwrap();
        assert_eq!(outcome.filename, "Clip_1080p.mkv");
    }

    #[tokio::test]
    async fn test_start_file_not_found() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::new(sample_info("abc", "Clip")).producing(ProducedFile::Nothing);
        let orch = orchestrator(provider, &dir);

        let err = orch.start(&video_request("720p")).await.unwrap_err();
        assert!(matches!(err, DownloadError::FileNotFound(_)));
        assert_eq!(err.to_string(), "Arquivo não encontrado após download");
        assert_eq!(err.status_code(), 500);
        assert_eq!(orch.progress("abc").status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_start_invalid_filename_classified() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::new(sample_info("abc", "Clip"))
            .with_events(vec![ProgressEvent {
                status: ProgressStatus::Downloading,
                downloaded: 30,
                total: Some(100),
                speed: Some(10.0),
                eta: Some(7),
            }])
            .with_fetch_error(DownloadError::Provider(
                "ERROR: unable to open for writing: [Errno 22] Invalid argument".to_string(),
            ));
        let orch = orchestrator(provider, &dir);

        let err = orch.start(&video_request("720p")).await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidFilename(_)));
        assert_eq!(err.status_code(), 400);

        let job = orch.progress("abc");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.percent, 30.0);
    }

    #[tokio::test]
    async fn test_start_os_errno_22() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::new(sample_info("abc", "Clip"))
            .with_fetch_error(DownloadError::Io(std::io::Error::from_raw_os_error(22)));
        let orch = orchestrator(provider, &dir);

        let err = orch.start(&video_request("720p")).await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidFilename(_)));
    }

    #[tokio::test]
    async fn test_start_provider_failure_is_extraction() {
        let dir = TempDir::new().unwrap();
        let provider = MockProvider::new(sample_info("abc", "Clip"))
            .with_fetch_error(DownloadError::Provider("ERROR: HTTP Error 403".to_string()));
        let orch = orchestrator(provider, &dir);

        let err = orch.start(&video_request("720p")).await.unwrap_err();
        assert_eq!(err.to_string(), "Erro no download: ERROR: HTTP Error 403");
    }

    #[tokio::test]
    async fn test_unknown_progress() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(MockProvider::new(sample_info("abc", "Clip")), &dir);
        let job = orch.progress("never-started");
        assert_eq!(job.status, JobStatus::Unknown);
        assert_eq!(job.percent, 0.0);
    }

    #[tokio::test]
    async fn test_resolve_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let orch = orchestrator(MockProvider::new(sample_info("abc", "Clip")), &dir);

        assert_eq!(
            orch.resolve_file("clip.mp4").await.unwrap(),
            dir.path().join("clip.mp4")
        );
        for bad in ["", "missing.mp4", "sub", "../clip.mp4", "a/b", ".hidden", "a\\b"] {
            let err = orch.resolve_file(bad).await.unwrap_err();
            assert!(matches!(err, DownloadError::NoSuchFile(_)), "{bad}");
            assert_eq!(err.status_code(), 404);
        }
    }

    #[tokio::test]
    async fn test_cleanup_removes_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("keep")).unwrap();
        let orch = orchestrator(MockProvider::new(sample_info("abc", "Clip")), &dir);

        assert_eq!(orch.cleanup().await.unwrap(), 2);
        assert!(dir.path().join("keep").is_dir());
        assert_eq!(orch.cleanup().await.unwrap(), 0);
    }
}
