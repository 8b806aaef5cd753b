use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

/// Oldest entries are dropped once an append would grow the log past this.
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Self-documenting header written at the top of a new recovery log.
const FILE_HEADER: &str = "\
<!-- ordo recovery log: append-only copies of data that could not be saved.
     If a reorder went missing after a failed save, the full store
     document from that moment is here.
     View with: ordo recovery
     Safe to delete if empty or stale. -->

---
";

/// Category of a recovery entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// The backing store file could not be written
    Write,
    /// A store document could not be parsed and was set aside
    Parse,
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryCategory::Write => write!(f, "write"),
            RecoveryCategory::Parse => write!(f, "parse"),
        }
    }
}

impl RecoveryCategory {
    pub fn parse_category(s: &str) -> Option<Self> {
        match s {
            "write" => Some(RecoveryCategory::Write),
            "parse" => Some(RecoveryCategory::Parse),
            _ => None,
        }
    }
}

/// A single entry in the recovery log.
#[derive(Debug, Clone)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

pub fn recovery_log_path(store_dir: &Path) -> PathBuf {
    store_dir.join(".recovery.log")
}

// ---------------------------------------------------------------------------
// File writes
// ---------------------------------------------------------------------------

/// Write `content` to `path` atomically using a temp file + rename.
///
/// The rename is atomic but not durable on its own; see [`sync_path`].
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Flush `path` and its parent directory entry to stable storage.
pub fn sync_path(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    file.sync_all()?;
    #[cfg(unix)]
    if let Some(dir) = path.parent() {
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry formatting
// ---------------------------------------------------------------------------

impl RecoveryEntry {
    fn to_markdown(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "## {} | {}: {}\n",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.category,
            self.description,
        ));
        out.push('\n');

        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }

        if !self.body.is_empty() {
            out.push('\n');
            out.push_str("```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }

        out.push('\n');
        out.push_str("---\n");
        out
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Append a recovery entry to the log. Errors are swallowed and reported
/// through tracing.
pub fn log_recovery(store_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = log_recovery_inner(store_dir, entry) {
        tracing::warn!(error = %e, "could not write to recovery log");
    }
}

fn log_recovery_inner(store_dir: &Path, entry: RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(store_dir);
    let markdown = entry.to_markdown();
    if let Ok(meta) = std::fs::metadata(&path)
        && meta.len() + markdown.len() as u64 > MAX_LOG_SIZE
    {
        trim_oldest(&path, MAX_LOG_SIZE.saturating_sub(markdown.len() as u64))?;
    }
    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(markdown.as_bytes())?;
    Ok(())
}

/// Rewrite the log without its oldest entries until it fits in `budget`
/// bytes. Returns how many entries were dropped.
fn trim_oldest(path: &Path, budget: u64) -> io::Result<usize> {
    let content = std::fs::read_to_string(path)?;
    let rendered: Vec<String> = parse_entries(&content)
        .iter()
        .map(RecoveryEntry::to_markdown)
        .collect();

    let mut total = FILE_HEADER.len() as u64 + rendered.iter().map(|r| r.len() as u64).sum::<u64>();
    let mut dropped = 0;
    while dropped < rendered.len() && total > budget {
        total -= rendered[dropped].len() as u64;
        dropped += 1;
    }

    let mut out = String::from(FILE_HEADER);
    for r in &rendered[dropped..] {
        out.push_str(r);
    }
    atomic_write(path, out.as_bytes())?;
    tracing::debug!(dropped, "trimmed recovery log");
    Ok(dropped)
}

// ---------------------------------------------------------------------------
// Reading entries
// ---------------------------------------------------------------------------

/// Read recovery entries, most recent first.
pub fn read_recovery_entries(store_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let content = match std::fs::read_to_string(recovery_log_path(store_dir)) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut entries = parse_entries(&content);
    if let Some(n) = limit {
        let skip = entries.len().saturating_sub(n);
        entries = entries.into_iter().skip(skip).collect();
    }
    entries.reverse();
    entries
}

/// Remove the recovery log. Returns how many entries it held.
pub fn clear_recovery(store_dir: &Path) -> io::Result<usize> {
    let path = recovery_log_path(store_dir);
    let content = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let count = parse_entries(&content).len();
    std::fs::remove_file(&path)?;
    Ok(count)
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some(header) = line.strip_prefix("## ") else {
            continue;
        };
        let Some((timestamp, category, description)) = parse_entry_header(header) else {
            continue;
        };

        let mut fields = Vec::new();
        let mut body = String::new();
        let mut in_code_block = false;

        for line in lines.by_ref() {
            if in_code_block {
                if line == "```" {
                    in_code_block = false;
                } else {
                    if !body.is_empty() {
                        body.push('\n');
                    }
                    body.push_str(line);
                }
                continue;
            }
            if line == "---" {
                break;
            }
            if line.starts_with("```") {
                in_code_block = true;
                continue;
            }
            if let Some((key, value)) = line.trim().split_once(": ") {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        entries.push(RecoveryEntry {
            timestamp,
            category,
            description,
            fields,
            body,
        });
    }

    entries
}

/// Parse an entry header: `<timestamp> | <category>: <description>`
fn parse_entry_header(header: &str) -> Option<(DateTime<Utc>, RecoveryCategory, String)> {
    let (timestamp_str, rest) = header.split_once(" | ")?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
        .ok()?
        .with_timezone(&Utc);
    let (category_str, description) = rest.split_once(": ")?;
    let category = RecoveryCategory::parse_category(category_str)?;
    Some((timestamp, category, description.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(description: &str, body: &str) -> RecoveryEntry {
        RecoveryEntry {
            timestamp: Utc::now(),
            category: RecoveryCategory::Write,
            description: description.to_string(),
            fields: vec![("Target".to_string(), "store.json".to_string())],
            body: body.to_string(),
        }
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        sync_path(&path).unwrap();
    }

    #[test]
    fn test_sync_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(sync_path(&tmp.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_logged_entries_read_back_newest_first() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry("first", "{\n  \"a\": 1\n}"));
        log_recovery(tmp.path(), entry("second", ""));

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "second");
        assert_eq!(entries[1].description, "first");
        assert_eq!(entries[1].body, "{\n  \"a\": 1\n}");
        assert_eq!(
            entries[1].fields,
            vec![("Target".to_string(), "store.json".to_string())]
        );

        let limited = read_recovery_entries(tmp.path(), Some(1));
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].description, "second");
    }

    #[test]
    fn test_trim_drops_oldest_entries_first() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry("first", "one"));
        log_recovery(tmp.path(), entry("second", "two"));
        log_recovery(tmp.path(), entry("third", "three"));
        let path = recovery_log_path(tmp.path());
        let len = std::fs::metadata(&path).unwrap().len();

        assert_eq!(trim_oldest(&path, len - 1).unwrap(), 1);
        let descriptions: Vec<String> = read_recovery_entries(tmp.path(), None)
            .into_iter()
            .map(|e| e.description)
            .collect();
        assert_eq!(descriptions, vec!["third", "second"]);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with(FILE_HEADER));
    }

    #[test]
    fn test_log_stays_under_size_cap() {
        let tmp = TempDir::new().unwrap();
        let big = "x".repeat(600_000);
        log_recovery(tmp.path(), entry("big-1", &big));
        log_recovery(tmp.path(), entry("big-2", &big));
        log_recovery(tmp.path(), entry("small", "{}"));

        let size = std::fs::metadata(recovery_log_path(tmp.path())).unwrap().len();
        assert!(size <= MAX_LOG_SIZE);
        let descriptions: Vec<String> = read_recovery_entries(tmp.path(), None)
            .into_iter()
            .map(|e| e.description)
            .collect();
        assert_eq!(descriptions, vec!["small", "big-2"]);
    }

    #[test]
    fn test_clear_counts_and_removes() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(clear_recovery(tmp.path()).unwrap(), 0);
        log_recovery(tmp.path(), entry("x", "body"));
        assert_eq!(clear_recovery(tmp.path()).unwrap(), 1);
        assert!(read_recovery_entries(tmp.path(), None).is_empty());
    }
}
