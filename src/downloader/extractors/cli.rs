// CLI extraction provider - drives the native `yt-dlp` binary
//
// Metadata: `--dump-json`, decoded into `MediaInfo`.
// Fetch: progress and the final path come back on stdout through marker
// templates (see `progress.rs`); stderr becomes the failure message.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command as StdCommand;
use tracing::{debug, info, warn};

use super::progress::{final_path_template, parse_line, progress_template, OutputLine};
use crate::config::ExtractorConfig;
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{FetchOutcome, FetchRequest, MediaInfo, StreamDescriptor};
use crate::downloader::traits::{ExtractionProvider, ProgressSink};
use crate::downloader::utils::{run_output_with_timeout, run_streaming_lines, summarize_stderr};

/// Subset of the `--dump-json` document we care about
#[derive(Debug, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    channel: Option<String>,
    uploader: Option<String>,
    view_count: Option<u64>,
    #[serde(default)]
    formats: Vec<StreamDescriptor>,
}

pub struct YtDlpProvider {
    ytdlp_path: String,
    config: ExtractorConfig,
}

impl YtDlpProvider {
    pub fn new(config: ExtractorConfig) -> Self {
        let ytdlp_path = config.binary.clone().unwrap_or_else(Self::find_ytdlp);
        info!(path = %ytdlp_path, "using yt-dlp");
        Self { ytdlp_path, config }
    }

    /// Find yt-dlp binary
    fn find_ytdlp() -> String {
        let common_paths = [
            "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
            "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac
            "/usr/bin/yt-dlp",          // System installation
        ];

        for path in common_paths {
            if std::path::Path::new(path).exists() {
                return path.to_string();
            }
        }

        if let Ok(output) = StdCommand::new("which").arg("yt-dlp").output() {
            if output.status.success() {
                if let Ok(path) = String::from_utf8(output.stdout) {
                    let trimmed = path.trim();
                    if !trimmed.is_empty() {
                        return trimmed.to_string();
                    }
                }
            }
        }

        // Last resort: hope it's in PATH
        "yt-dlp".to_string()
    }

    /// Arguments shared by metadata and fetch invocations
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
        ];

        if let Some(path) = &self.config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }

    fn info_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["--dump-json".to_string()];
        args.extend(self.common_args());
        args.push(url.to_string());
        args
    }

    fn fetch_args(&self, url: &str, request: &FetchRequest) -> Vec<String> {
        let policy = &request.policy;
        let mut args = vec![
            "-f".to_string(),
            policy.format_spec(),
            "-o".to_string(),
            request.output.template(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            progress_template(),
            "--no-simulate".to_string(),
            "--print".to_string(),
            final_path_template(),
        ];
        args.extend(self.common_args());

        if let Some(container) = policy.merge_container() {
            args.push("--merge-output-format".to_string());
            args.push(container.to_string());
        }
        args.extend(policy.postprocess_args());

        args.push(url.to_string());
        args
    }

    fn parse_info(stdout: &[u8]) -> Result<MediaInfo, DownloadError> {
        let raw: RawInfo = serde_json::from_slice(stdout)
            .map_err(|e| DownloadError::Internal(format!("Invalid JSON from yt-dlp: {}", e)))?;

        Ok(MediaInfo {
            id: raw.id.unwrap_or_else(|| "unknown".to_string()),
            title: raw.title.unwrap_or_else(|| "video".to_string()),
            thumbnail: raw.thumbnail,
            duration: raw.duration,
            channel: raw.channel.or(raw.uploader),
            view_count: raw.view_count,
            formats: raw.formats,
        })
    }
}

#[async_trait]
impl ExtractionProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }

    async fn version(&self) -> Option<String> {
        let output = run_output_with_timeout(&self.ytdlp_path, &["--version".to_string()], 10)
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }

    async fn extract_info(&self, url: &str) -> Result<MediaInfo, DownloadError> {
        let args = self.info_args(url);
        debug!(url, "extracting metadata");

        let output =
            run_output_with_timeout(&self.ytdlp_path, &args, self.config.info_timeout_secs).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(url, "metadata extraction failed");
            return Err(DownloadError::Provider(summarize_stderr(&stderr)));
        }

        Self::parse_info(&output.stdout)
    }

    async fn fetch(
        &self,
        url: &str,
        request: &FetchRequest,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutcome, DownloadError> {
        let args = self.fetch_args(url, request);
        debug!(url, format = %request.policy.format_spec(), "starting yt-dlp fetch");

        let mut file_path: Option<PathBuf> = None;
        let (status, stderr) = run_streaming_lines(&self.ytdlp_path, &args, |line| {
            match parse_line(line) {
                OutputLine::Progress(event) => sink.on_event(event),
                OutputLine::FinalPath(path) => file_path = Some(path),
                OutputLine::Other => {}
            }
        })
        .await?;

        if !status.success() {
            return Err(DownloadError::Provider(summarize_stderr(&stderr)));
        }

        Ok(FetchOutcome { file_path })
    }
}
