// FormatSelector - ranking and selection of quality tiers
//
// Converts raw provider formats into UI-friendly tiers:
// - One representative stream per height (highest bitrate, then size)
// - Standard resolution ladder 2160p .. 240p, highest first
// - A synthetic audio-only (MP3) tier, always last
//
// The inverse direction lives here too: `SelectionPolicy` turns a chosen
// tier back into a provider format selector.

use std::collections::BTreeMap;

use super::models::{QualityTier, StreamDescriptor};

/// Target heights, in the order tiers are presented
pub const TARGET_HEIGHTS: [u32; 7] = [2160, 1440, 1080, 720, 480, 360, 240];

/// Reserved format id for the synthetic audio-only tier
pub const AUDIO_FORMAT_ID: &str = "bestaudio";

const AUDIO_LABEL: &str = "Apenas Áudio";
const UNKNOWN_SIZE_LABEL: &str = "Tamanho desconhecido";

/// Format selector with per-height best-stream reduction
pub struct FormatSelector;

impl FormatSelector {
    /// Rank raw descriptors into at most 7 video tiers plus the audio tier.
    pub fn rank(descriptors: &[StreamDescriptor]) -> Vec<QualityTier> {
        let mut best_by_height: BTreeMap<u32, &StreamDescriptor> = BTreeMap::new();

        for f in descriptors {
            if !f.has_video() {
                continue;
            }
            let height = match f.height {
                Some(h) if h > 0 => h,
                _ => continue,
            };

            match best_by_height.get(&height) {
                Some(existing) if !Self::outranks(f, existing) => {}
                _ => {
                    best_by_height.insert(height, f);
                }
            }
        }

        let mut tiers: Vec<QualityTier> = TARGET_HEIGHTS
            .iter()
            .filter_map(|h| best_by_height.get(h))
            .map(|f| Self::video_tier(f))
            .collect();

        tiers.push(Self::audio_tier());
        tiers
    }

    /// Bitrate first, file size breaks ties. Equal on both keeps the earlier stream.
    fn outranks(candidate: &StreamDescriptor, existing: &StreamDescriptor) -> bool {
        let (cb, eb) = (candidate.bitrate(), existing.bitrate());
        cb > eb || (cb == eb && candidate.effective_size() > existing.effective_size())
    }

    fn video_tier(f: &StreamDescriptor) -> QualityTier {
        let height = f.height.unwrap_or(0);
        let size = f.effective_size();
        QualityTier {
            format_id: f.format_id.clone(),
            label: format!("{}p", height),
            height_px: height,
            container: if f.ext.is_empty() {
                "mp4".to_string()
            } else {
                f.ext.clone()
            },
            size_bytes: size,
            size_label: if size > 0 {
                format_byte_size(size)
            } else {
                UNKNOWN_SIZE_LABEL.to_string()
            },
            has_audio: f.has_audio(),
            audio_only: false,
        }
    }

    /// Synthetic best-audio tier converted to MP3
    pub fn audio_tier() -> QualityTier {
        QualityTier {
            format_id: AUDIO_FORMAT_ID.to_string(),
            label: AUDIO_LABEL.to_string(),
            height_px: 0,
            container: "mp3".to_string(),
            size_bytes: 0,
            size_label: "MP3".to_string(),
            has_audio: true,
            audio_only: true,
        }
    }
}

/// Format file size for display ("15.3 MB")
pub fn format_byte_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Format duration as HH:MM:SS, or MM:SS under an hour
pub fn format_duration(seconds: Option<f64>) -> String {
    let total = match seconds {
        Some(s) if s >= 1.0 => s as u64,
        _ => return "00:00".to_string(),
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Which streams the provider should fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Best audio, transcoded to `codec` at `kbps`
    AudioOnly { codec: &'static str, kbps: u32 },
    /// Best video with height <= ceiling plus best audio
    MaxHeight(u32),
    /// Best available, no ceiling
    Best,
}

impl SelectionPolicy {
    /// Derive the policy from a download request.
    ///
    /// Audio wins if either the flag or the reserved format id asks for it;
    /// otherwise the quality label ("720p" or "720") sets the ceiling.
    pub fn from_request(format_id: Option<&str>, quality: Option<&str>, audio_only: bool) -> Self {
        if audio_only || format_id == Some(AUDIO_FORMAT_ID) {
            return Self::audio_mp3();
        }

        quality
            .map(|q| q.trim().trim_end_matches(['p', 'P']))
            .and_then(|q| q.parse::<u32>().ok())
            .filter(|h| *h > 0)
            .map(Self::MaxHeight)
            .unwrap_or(Self::Best)
    }

    pub fn audio_mp3() -> Self {
        Self::AudioOnly {
            codec: "mp3",
            kbps: 320,
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::AudioOnly { .. })
    }

    /// Provider format selector
    pub fn format_spec(&self) -> String {
        match self {
            Self::AudioOnly { .. } => "bestaudio/best".to_string(),
            Self::MaxHeight(h) => format!(
                "bestvideo[height<={h}]+bestaudio/best[height<={h}]/best",
                h = h
            ),
            Self::Best => "bestvideo+bestaudio/best".to_string(),
        }
    }

    /// Container for merged video output
    pub fn merge_container(&self) -> Option<&'static str> {
        match self {
            Self::AudioOnly { .. } => None,
            _ => Some("mp4"),
        }
    }

    /// Provider arguments for post-processing (audio extraction)
    pub fn postprocess_args(&self) -> Vec<String> {
        match self {
            Self::AudioOnly { codec, kbps } => vec![
                "-x".to_string(),
                "--audio-format".to_string(),
                codec.to_string(),
                "--audio-quality".to_string(),
                format!("{}K", kbps),
            ],
            _ => Vec::new(),
        }
    }
}
