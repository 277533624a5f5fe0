// Scriptable in-memory extraction provider.
//
// Used by unit tests and by the router tests under `tests/`; it never
// touches the network. A successful fetch writes a small file into the
// requested output directory so file location can be exercised for real.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{
    FetchOutcome, FetchRequest, MediaInfo, ProgressEvent, ProgressStatus, StreamDescriptor,
};
use crate::downloader::traits::{ExtractionProvider, ProgressSink};

/// What a successful mock fetch leaves on disk
#[derive(Debug, Clone)]
pub enum ProducedFile {
    /// The file yt-dlp would produce for this height/extension
    Expected { height: String, ext: String },
    /// A file with an arbitrary name
    Named(String),
    Nothing,
}

#[derive(Clone)]
pub struct MockProvider {
    info: MediaInfo,
    info_error: Option<String>,
    fetch_error: Option<Arc<DownloadError>>,
    events: Vec<ProgressEvent>,
    produce: ProducedFile,
    report_path: bool,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl MockProvider {
    pub fn new(info: MediaInfo) -> Self {
        Self {
            info,
            info_error: None,
            fetch_error: None,
            events: transfer_events(4096),
            produce: ProducedFile::Expected {
                height: "720".to_string(),
                ext: "mp4".to_string(),
            },
            report_path: true,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Metadata resolution fails with this provider message
    pub fn with_info_error(mut self, message: &str) -> Self {
        self.info_error = Some(message.to_string());
        self
    }

    /// Fetch fails with this error after emitting its events
    pub fn with_fetch_error(mut self, error: DownloadError) -> Self {
        self.fetch_error = Some(Arc::new(error));
        self
    }

    pub fn with_events(mut self, events: Vec<ProgressEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn producing(mut self, produce: ProducedFile) -> Self {
        self.produce = produce;
        self
    }

    /// Whether the final path is reported back (yt-dlp's `after_move` print)
    pub fn reporting_path(mut self, report: bool) -> Self {
        self.report_path = report;
        self
    }

    /// Fetch requests seen so far
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Metadata with a typical spread of streams
pub fn sample_info(id: &str, title: &str) -> MediaInfo {
    let video = |format_id: &str, height: u32, vbr: f64, size: u64| StreamDescriptor {
        format_id: format_id.to_string(),
        ext: "mp4".to_string(),
        height: Some(height),
        vcodec: Some("avc1".to_string()),
        acodec: Some("none".to_string()),
        filesize: Some(size),
        vbr: Some(vbr),
        ..StreamDescriptor::default()
    };

    MediaInfo {
        id: id.to_string(),
        title: title.to_string(),
        thumbnail: Some(format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id)),
        duration: Some(212.0),
        channel: Some("Channel".to_string()),
        view_count: Some(1_000),
        formats: vec![
            video("137", 1080, 4000.0, 80_000_000),
            video("136", 720, 2500.0, 40_000_000),
            video("18", 360, 500.0, 9_000_000),
            StreamDescriptor {
                format_id: "140".to_string(),
                ext: "m4a".to_string(),
                vcodec: Some("none".to_string()),
                acodec: Some("mp4a.40.2".to_string()),
                tbr: Some(129.0),
                ..StreamDescriptor::default()
            },
        ],
    }
}

/// A downloading ramp to `total` bytes followed by a finished event
pub fn transfer_events(total: u64) -> Vec<ProgressEvent> {
    let mut events: Vec<ProgressEvent> = [0, total / 4, total / 2]
        .into_iter()
        .map(|downloaded| ProgressEvent {
            status: ProgressStatus::Downloading,
            downloaded,
            total: Some(total),
            speed: Some(1024.0),
            eta: Some(2),
        })
        .collect();
    events.push(ProgressEvent {
        status: ProgressStatus::Finished,
        downloaded: total,
        total: Some(total),
        speed: None,
        eta: None,
    });
    events
}

#[async_trait]
impl ExtractionProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn version(&self) -> Option<String> {
        Some("0.0-test".to_string())
    }

    async fn extract_info(&self, _url: &str) -> Result<MediaInfo, DownloadError> {
        match &self.info_error {
            Some(message) => Err(DownloadError::Provider(message.clone())),
            None => Ok(self.info.clone()),
        }
    }

    async fn fetch(
        &self,
        _url: &str,
        request: &FetchRequest,
        sink: &dyn ProgressSink,
    ) -> Result<FetchOutcome, DownloadError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        for event in &self.events {
            sink.on_event(event.clone());
        }

        if let Some(error) = &self.fetch_error {
            return Err(clone_error(error));
        }

        let path: Option<PathBuf> = match &self.produce {
            ProducedFile::Expected { height, ext } => Some(request.output.resolve(height, ext)),
            ProducedFile::Named(name) => Some(request.output.dir().join(name)),
            ProducedFile::Nothing => None,
        };

        if let Some(path) = &path {
            tokio::fs::write(path, b"media").await?;
        }

        Ok(FetchOutcome {
            file_path: path.filter(|_| self.report_path),
        })
    }
}

fn clone_error(error: &DownloadError) -> DownloadError {
    match error {
        DownloadError::Validation(m) => DownloadError::Validation(m.clone()),
        DownloadError::Extraction(m) => DownloadError::Extraction(m.clone()),
        DownloadError::InvalidFilename(m) => DownloadError::InvalidFilename(m.clone()),
        DownloadError::FileNotFound(m) => DownloadError::FileNotFound(m.clone()),
        DownloadError::NoSuchFile(m) => DownloadError::NoSuchFile(m.clone()),
        DownloadError::Provider(m) => DownloadError::Provider(m.clone()),
        DownloadError::Io(e) => match e.raw_os_error() {
            Some(code) => DownloadError::Io(std::io::Error::from_raw_os_error(code)),
            None => DownloadError::Io(std::io::Error::new(e.kind(), e.to_string())),
        },
        DownloadError::Internal(m) => DownloadError::Internal(m.clone()),
    }
}
