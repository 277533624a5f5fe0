// Common data models for the download core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

use super::format_selector::SelectionPolicy;
use super::sanitize::OutputPath;

/// Raw stream descriptor as reported by the extraction provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamDescriptor {
    /// Format ID (e.g., "137", "140")
    pub format_id: String,
    /// Container extension (mp4, webm, m4a)
    pub ext: String,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Video codec ("none" for audio-only streams)
    pub vcodec: Option<String>,
    /// Audio codec ("none" for video-only streams)
    pub acodec: Option<String>,
    /// Exact file size in bytes
    pub filesize: Option<u64>,
    /// Approximate file size (when exact is unknown)
    pub filesize_approx: Option<u64>,
    /// Video bitrate in kbps
    pub vbr: Option<f64>,
    /// Total bitrate in kbps
    pub tbr: Option<f64>,
}

impl StreamDescriptor {
    /// A missing codec field counts as present; only an explicit "none" rules it out.
    pub fn has_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    /// Exact size, else approximate size, else 0
    pub fn effective_size(&self) -> u64 {
        self.filesize
            .filter(|s| *s > 0)
            .or(self.filesize_approx)
            .unwrap_or(0)
    }

    /// Video bitrate, falling back to total bitrate
    pub fn bitrate(&self) -> f64 {
        self.vbr
            .filter(|b| *b > 0.0)
            .or(self.tbr)
            .unwrap_or(0.0)
    }
}

/// Media metadata resolved by the provider (metadata-only mode)
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub channel: Option<String>,
    pub view_count: Option<u64>,
    pub formats: Vec<StreamDescriptor>,
}

/// User-facing quality option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityTier {
    pub format_id: String,
    #[serde(rename = "quality")]
    pub label: String,
    #[serde(rename = "height")]
    pub height_px: u32,
    #[serde(rename = "ext")]
    pub container: String,
    #[serde(rename = "filesize")]
    pub size_bytes: u64,
    #[serde(rename = "filesize_str")]
    pub size_label: String,
    pub has_audio: bool,
    #[serde(default)]
    pub audio_only: bool,
}

/// Result of inspecting a URL
#[derive(Debug, Clone, Serialize)]
pub struct InspectResult {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub duration_str: String,
    pub channel: Option<String>,
    pub view_count: u64,
    pub formats: Vec<QualityTier>,
}

/// A download request as received from the caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub audio_only: bool,
}

/// Successful download result
#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub video_id: String,
    pub filename: String,
    pub message: String,
}

/// What the provider should fetch and where to put it
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub policy: SelectionPolicy,
    pub output: OutputPath,
}

/// What the provider reports after a successful fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Final file path, when the provider reports one
    pub file_path: Option<PathBuf>,
}

/// Progress event status emitted by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
}

/// Single progress event from the provider's transfer loop
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub downloaded: u64,
    /// Total bytes (exact or estimated); `None` when unknown
    pub total: Option<u64>,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Seconds remaining
    pub eta: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Downloading,
    Finished,
    Failed,
    Unknown,
}

/// Progress record for one download
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub status: JobStatus,
    pub percent: f64,
    #[serde(rename = "speed", skip_serializing_if = "Option::is_none")]
    pub speed_bytes_per_sec: Option<u64>,
    #[serde(rename = "eta", skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub updated_at: Option<Instant>,
}

impl Job {
    pub fn starting(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: JobStatus::Starting,
            percent: 0.0,
            speed_bytes_per_sec: None,
            eta_seconds: None,
            result_path: None,
            error: None,
            updated_at: Some(Instant::now()),
        }
    }

    /// Record returned for ids that were never created
    pub fn unknown() -> Self {
        Self {
            id: String::new(),
            status: JobStatus::Unknown,
            percent: 0.0,
            speed_bytes_per_sec: None,
            eta_seconds: None,
            result_path: None,
            error: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate_falls_back_to_total() {
        let f = StreamDescriptor {
            vbr: None,
            tbr: Some(1200.0),
            ..Default::default()
        };
        assert_eq!(f.bitrate(), 1200.0);

        let zero_vbr = StreamDescriptor {
            vbr: Some(0.0),
            tbr: Some(900.0),
            ..Default::default()
        };
        assert_eq!(zero_vbr.bitrate(), 900.0);
        assert_eq!(StreamDescriptor::default().bitrate(), 0.0);
    }

    #[test]
    fn test_codec_presence() {
        let audio = StreamDescriptor {
            vcodec: Some("none".into()),
            acodec: Some("opus".into()),
            ..Default::default()
        };
        assert!(!audio.has_video());
        assert!(audio.has_audio());

        let unknown = StreamDescriptor::default();
        assert!(unknown.has_video());
        assert!(unknown.has_audio());
    }

    #[test]
    fn test_unknown_job_serialization() {
        let json = serde_json::to_value(Job::unknown()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unknown", "percent": 0.0}));
    }

    #[test]
    fn test_tier_uses_client_keys() {
        let tier = QualityTier {
            format_id: "137".into(),
            label: "1080p".into(),
            height_px: 1080,
            container: "mp4".into(),
            size_bytes: 0,
            size_label: "Tamanho desconhecido".into(),
            has_audio: false,
            audio_only: false,
        };
        let json = serde_json::to_value(&tier).unwrap();
        assert_eq!(json["quality"], "1080p");
        assert_eq!(json["height"], 1080);
        assert_eq!(json["filesize_str"], "Tamanho desconhecido");
    }
}
