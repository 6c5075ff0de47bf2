//! Request history log
//!
//! One JSON line per request, appended best-effort. The shell only ever
//! writes this file; nothing in the core reads it back.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    /// RFC 3339 timestamp.
    pub time: String,
    /// "ask" or "shell".
    pub kind: String,
    pub endpoint: String,
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_hashes: Vec<String>,
    pub response_preview: String,
    pub cwd: String,
}

impl Record {
    pub fn new(kind: &str, endpoint: &str, model: &str, prompt: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            time: chrono::Local::now().to_rfc3339(),
            kind: kind.to_string(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            prompt: prompt.to_string(),
            files: Vec::new(),
            file_hashes: Vec::new(),
            response_preview: String::new(),
            cwd: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Default log location under the project data dir.
pub fn default_history_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("sh", "orbit", "orbit")
        .context("failed to determine data directory")?;
    Ok(dirs.data_dir().join("history.jsonl"))
}

/// Append one record as a JSON line, creating parent directories as needed.
pub fn append(path: &Path, record: &Record) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let line = serde_json::to_string(record).context("failed to serialize history record")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{}", line).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_produces_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        let mut record = Record::new("ask", "http://127.0.0.1:8080", "llama", "why?");
        record.response_preview = "because".to_string();
        append(&path, &record).unwrap();
        append(&path, &record).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: Record = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.prompt, "why?");
            assert_eq!(parsed.response_preview, "because");
        }
    }

    #[test]
    fn test_record_ids_are_unique() {
        let a = Record::new("ask", "e", "m", "p");
        let b = Record::new("ask", "e", "m", "p");
        assert_ne!(a.id, b.id);
    }
}
