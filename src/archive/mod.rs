//! Archive loading.
//!
//! An exported archive stores posts as a JavaScript file that assigns a JSON
//! array to a global, e.g.
//!
//! ```text
//! window.YTD.tweets.part0 = [ { "tweet": { "id_str": "...", ... } }, ... ]
//! ```
//!
//! Older exports use `window.YTD.tweet.partN`, and hand-made files are often a
//! bare JSON array. The loader tries the known wrappers in order and falls
//! back to everything after the first `[`.

mod error;

use std::{path::Path, sync::LazyLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

pub use error::ArchiveError;

use crate::config::ArchiveConfig;

/// One archived post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Numeric identifier, kept as a string to avoid precision loss.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
}

impl Record {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at,
            text: text.into(),
        }
    }
}

/// Which wrapper the archive content was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `window.YTD.tweets.partN = [...]`
    TweetsPart,
    /// `window.YTD.tweet.partN = [...]`
    TweetPart,
    /// The whole document is a JSON array.
    BareArray,
    /// Everything from the first `[` onwards.
    Fallback,
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ArchiveFormat::TweetsPart => "window.YTD.tweets.partN",
            ArchiveFormat::TweetPart => "window.YTD.tweet.partN",
            ArchiveFormat::BareArray => "bare array",
            ArchiveFormat::Fallback => "first bracket",
        };
        f.write_str(name)
    }
}

/// Result of parsing an archive.
#[derive(Debug, Clone)]
pub struct LoadedArchive {
    pub records: Vec<Record>,
    pub format: ArchiveFormat,
    /// Entries that were present but failed validation.
    pub dropped: usize,
}

static WRAPPERS: LazyLock<Vec<(Regex, ArchiveFormat)>> = LazyLock::new(|| {
    [
        (
            r"(?s)window\.YTD\.tweets\.part\d+\s*=\s*(\[.*\])",
            ArchiveFormat::TweetsPart,
        ),
        (
            r"(?s)window\.YTD\.tweet\.part\d+\s*=\s*(\[.*\])",
            ArchiveFormat::TweetPart,
        ),
        (r"(?s)\A(\[.*\])\z", ArchiveFormat::BareArray),
    ]
    .into_iter()
    .map(|(pattern, format)| {
        (
            Regex::new(pattern).expect("archive wrapper pattern is valid"),
            format,
        )
    })
    .collect()
});

/// Read and parse an archive file.
pub async fn load_file(
    path: impl AsRef<Path>,
    config: &ArchiveConfig,
) -> Result<LoadedArchive, ArchiveError> {
    let path = path.as_ref();
    let io_err = |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    };

    let size = tokio::fs::metadata(path).await.map_err(io_err)?.len();
    if size > config.max_bytes {
        return Err(ArchiveError::TooLarge {
            size,
            limit: config.max_bytes,
        });
    }

    let content = tokio::fs::read_to_string(path).await.map_err(io_err)?;
    tracing::debug!(path = %path.display(), bytes = size, "Read archive file");

    parse(&content)
}

/// Parse archive content.
pub fn parse(content: &str) -> Result<LoadedArchive, ArchiveError> {
    let (json, format) = extract_json(content).ok_or(ArchiveError::NoJson)?;
    tracing::debug!(format = %format, "Archive format detected");

    let value: Value = serde_json::from_str(json)?;
    let Value::Array(entries) = value else {
        return Err(ArchiveError::NotArray);
    };

    let total = entries.len();
    let records: Vec<Record> = entries.iter().filter_map(parse_entry).collect();
    let dropped = total - records.len();

    if records.is_empty() {
        return Err(ArchiveError::Empty { entries: total });
    }

    if dropped > 0 {
        tracing::debug!(dropped, total, "Dropped archive entries that failed validation");
    }

    Ok(LoadedArchive {
        records,
        format,
        dropped,
    })
}

fn extract_json(content: &str) -> Option<(&str, ArchiveFormat)> {
    let trimmed = content.trim();

    for (pattern, format) in WRAPPERS.iter() {
        if let Some(found) = pattern.captures(trimmed).and_then(|caps| caps.get(1)) {
            return Some((found.as_str(), *format));
        }
    }

    trimmed
        .find('[')
        .map(|start| (&trimmed[start..], ArchiveFormat::Fallback))
}

fn parse_entry(item: &Value) -> Option<Record> {
    let post = item.get("tweet").filter(|v| v.is_object()).unwrap_or(item);

    // A null or empty `id_str` falls through to `id`.
    let id_str = post
        .get("id_str")
        .filter(|v| !v.is_null() && v.as_str() != Some(""));
    let id = match id_str.or_else(|| post.get("id"))? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_u64()?.to_string(),
        _ => return None,
    };
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let created_at = parse_timestamp(post.get("created_at")?.as_str()?)?;

    let text = post
        .get("full_text")
        .and_then(Value::as_str)
        .or_else(|| post.get("text").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    Some(Record {
        id,
        created_at,
        text,
    })
}

/// Parse a creation timestamp.
///
/// Accepts the archive's native format (`Wed Oct 10 20:19:24 +0000 2018`),
/// RFC 3339, RFC 2822 and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}
