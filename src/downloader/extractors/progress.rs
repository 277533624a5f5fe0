// yt-dlp output line parsing
//
// yt-dlp is asked to print progress through a fixed template and to print
// the final file path after post-processing, each behind its own marker:
//
//   [vdl-progress] downloading 1048576 10485760 NA 524288.5 18
//   [vdl-file] /downloads/Some title_720p.mp4

use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;

use crate::downloader::models::{ProgressEvent, ProgressStatus};

pub const PROGRESS_MARKER: &str = "[vdl-progress]";
pub const FILE_MARKER: &str = "[vdl-file]";

/// Value for `--progress-template`
pub fn progress_template() -> String {
    format!(
        "download:{} %(progress.status)s %(progress.downloaded_bytes)s \
         %(progress.total_bytes)s %(progress.total_bytes_estimate)s \
         %(progress.speed)s %(progress.eta)s",
        PROGRESS_MARKER
    )
}

/// Value for `--print`, emitted once the file reached its final name
pub fn final_path_template() -> String {
    format!("after_move:{} %(filepath)s", FILE_MARKER)
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressEvent),
    FinalPath(PathBuf),
    Other,
}

lazy_static! {
    static ref PROGRESS_RE: Regex = Regex::new(
        r"^\[vdl-progress\]\s+(\w+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s*$"
    )
    .unwrap();
    static ref FILE_RE: Regex = Regex::new(r"^\[vdl-file\]\s+(.+?)\s*$").unwrap();
}

/// Numeric template field; yt-dlp prints "NA" (or "None") when unknown
fn parse_number(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

pub fn parse_line(line: &str) -> OutputLine {
    let line = line.trim();

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let status = match &caps[1] {
            "downloading" => ProgressStatus::Downloading,
            "finished" => ProgressStatus::Finished,
            _ => return OutputLine::Other,
        };
        let downloaded = parse_number(&caps[2]).unwrap_or(0.0) as u64;
        let total = parse_number(&caps[3])
            .filter(|t| *t > 0.0)
            .or_else(|| parse_number(&caps[4]))
            .map(|t| t as u64);
        let speed = parse_number(&caps[5]);
        let eta = parse_number(&caps[6]).map(|e| e.round() as u64);

        return OutputLine::Progress(ProgressEvent {
            status,
            downloaded,
            total,
            speed,
            eta,
        });
    }

    if let Some(caps) = FILE_RE.captures(line) {
        return OutputLine::FinalPath(PathBuf::from(&caps[1]));
    }

    OutputLine::Other
}
