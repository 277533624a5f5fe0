// Filesystem-safe titles and bounded output paths
//
// Titles come straight from the provider and may contain anything. The
// rules here target the strictest common filesystem (Windows): no reserved
// characters, no control characters, no trailing dots, bounded length.

use std::path::{Path, PathBuf};

/// Characters rejected by Windows filesystems
const RESERVED_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Returned whenever sanitization leaves nothing usable
pub const FALLBACK_TITLE: &str = "video";

/// Upper bound for a sanitized title, in characters
pub const MAX_TITLE_CHARS: usize = 200;

/// Titles are pre-capped to this before the full-path check
const OUTPUT_TITLE_CHARS: usize = 150;

/// Ceiling for the fully-qualified output path, in characters
pub const MAX_PATH_CHARS: usize = 250;

/// Room left for the `_{height}p.{ext}` suffix when shortening
const SUFFIX_RESERVE: usize = 20;

/// Byte bound keeping the final component under NAME_MAX with provider suffixes (.part, .fNNN)
const MAX_TITLE_BYTES: usize = 200;

/// Worst-case placeholder values for the path-length check
const REPRESENTATIVE_HEIGHT: &str = "1080";
const REPRESENTATIVE_EXT: &str = "mp4";

/// How many leading title characters identify a produced file
const MATCH_PREFIX_CHARS: usize = 30;

/// Convert an arbitrary title into a filesystem-safe, non-empty fragment.
///
/// Idempotent: sanitizing an already sanitized title returns it unchanged.
pub fn sanitize_title(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || (c as u32) < 32 {
                '_'
            } else {
                c
            }
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut title = trim_title_end(&collapsed).to_string();

    if title.chars().count() > MAX_TITLE_CHARS {
        let truncated: String = title.chars().take(MAX_TITLE_CHARS).collect();
        title = trim_title_end(&truncated).to_string();
    }

    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

fn trim_title_end(s: &str) -> &str {
    s.trim_end_matches(|c: char| c == '.' || c.is_whitespace())
}

fn truncate_chars(s: &str, max: usize) -> String {
    let truncated: String = s.chars().take(max).collect();
    trim_title_end(&truncated).to_string()
}

fn truncate_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    trim_title_end(&s[..end]).to_string()
}

fn non_empty(title: String) -> String {
    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

/// Output location for one download attempt.
///
/// Height and extension are left as provider placeholders; the provider
/// substitutes them once the actual stream is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    dir: PathBuf,
    title: String,
    audio_only: bool,
}

impl OutputPath {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Title as it will appear in the filename (possibly shortened)
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn audio_only(&self) -> bool {
        self.audio_only
    }

    pub fn file_name(&self, height: &str, ext: &str) -> String {
        if self.audio_only {
            format!("{}.{}", self.title, ext)
        } else {
            format!("{}_{}p.{}", self.title, height, ext)
        }
    }

    /// Concrete path for the given height/extension
    pub fn resolve(&self, height: &str, ext: &str) -> PathBuf {
        self.dir.join(self.file_name(height, ext))
    }

    /// Provider output template. Literal `%` is escaped as `%%`.
    pub fn template(&self) -> String {
        let title = self.title.replace('%', "%%");
        let name = if self.audio_only {
            format!("{}.%(ext)s", title)
        } else {
            format!("{}_%(height)sp.%(ext)s", title)
        };
        let dir = self.dir.to_string_lossy().replace('%', "%%");
        Path::new(&dir).join(name).to_string_lossy().into_owned()
    }

    /// Leading title fragment used to recognise the produced file
    pub fn match_prefix(&self) -> String {
        self.title.chars().take(MATCH_PREFIX_CHARS).collect()
    }

    fn representative_len(&self) -> usize {
        self.resolve(REPRESENTATIVE_HEIGHT, REPRESENTATIVE_EXT)
            .to_string_lossy()
            .chars()
            .count()
    }
}

/// Build the output location for a sanitized title.
///
/// The resulting path stays within `MAX_PATH_CHARS` whenever the directory
/// itself leaves room for the fallback name.
pub fn build_output_path(dir: &Path, safe_title: &str, audio_only: bool) -> OutputPath {
    let title = truncate_chars(safe_title, OUTPUT_TITLE_CHARS);
    let title = non_empty(truncate_bytes(&title, MAX_TITLE_BYTES));

    let mut output = OutputPath {
        dir: dir.to_path_buf(),
        title,
        audio_only,
    };

    if output.representative_len() > MAX_PATH_CHARS {
        let dir_len = dir.to_string_lossy().chars().count();
        let remaining = MAX_PATH_CHARS as isize - dir_len as isize - SUFFIX_RESERVE as isize;
        output.title = if remaining > 0 {
            non_empty(truncate_chars(&output.title, remaining as usize))
        } else {
            FALLBACK_TITLE.to_string()
        };
    }

    output
}
