//! Index command - bulk-ingest a directory into the knowledge store

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use ignore::gitignore::Gitignore;
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use crate::config::Config;
use crate::knowledge::persist;

// ANSI color codes from design system
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const SUCCESS: &str = "\x1b[38;2;165;214;167m";
    pub const WARNING: &str = "\x1b[38;2;255;245;157m";
    pub const MUTED: &str = "\x1b[38;2;84;110;122m";
    pub const FG: &str = "\x1b[38;2;212;212;215m";
}

/// File extensions worth indexing as text.
const TEXT_EXTENSIONS: &[&str] = &[
    "md", "txt", "rst", "log", "rs", "py", "js", "ts", "go", "c", "h", "cpp", "hpp", "java",
    "rb", "sh", "toml", "yaml", "yml", "json", "ini", "cfg", "conf", "sql", "xml", "html", "css",
];

pub async fn run(config: Config, path: Option<&str>) -> Result<()> {
    let start = Instant::now();
    let root = PathBuf::from(path.unwrap_or("."));
    let root = root
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", root.display()))?;

    let files = collect_files(&root)?;
    if files.is_empty() {
        println!(
            "{}  no indexable files found under {}{}",
            colors::WARNING,
            root.display(),
            colors::RESET
        );
        return Ok(());
    }

    let store_path = persist::default_store_path()?;
    let mut store = persist::load(&store_path, true);

    let pb = create_progress_bar(files.len() as u64);
    let mut indexed = 0usize;
    let mut skipped = 0usize;

    for file in &files {
        let relative = file.strip_prefix(&root).unwrap_or(file);
        pb.set_message(relative.display().to_string());

        match store.upsert_file(
            &file.to_string_lossy(),
            config.files.max_bytes,
            config.files.max_chars,
        ) {
            Ok(_) => indexed += 1,
            Err(_) => skipped += 1,
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    persist::save(&store, &store_path)?;

    let elapsed = start.elapsed();
    println!();
    println!(
        "{}{}  {} Indexing complete{}",
        colors::SUCCESS,
        colors::BOLD,
        "✓",
        colors::RESET
    );
    println!(
        "{}  indexed {}{}{} files ({} skipped) in {:.2}s{}",
        colors::MUTED,
        colors::FG,
        indexed,
        colors::MUTED,
        skipped,
        elapsed.as_secs_f64(),
        colors::RESET
    );
    println!(
        "{}  store: {} ({} documents){}",
        colors::MUTED,
        store_path.display(),
        store.len(),
        colors::RESET
    );
    println!(
        "{}  try: orbit search \"your query\"{}",
        colors::MUTED,
        colors::RESET
    );
    Ok(())
}

/// Collect indexable files under `root`, honoring a top-level .gitignore.
fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let gitignore_path = root.join(".gitignore");
    let gitignore = if gitignore_path.exists() {
        Gitignore::new(&gitignore_path).0
    } else {
        Gitignore::empty()
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            if name == "node_modules" || name == "target" || name == "build" || name == "dist" {
                return false;
            }
            if gitignore.matched(e.path(), e.path().is_dir()).is_ignore() {
                return false;
            }
            true
        })
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_text_candidate(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn is_text_candidate(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Create a styled progress bar
fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} {prefix:.bold} [{bar:40.cyan/dim}] {pos}/{len} {msg:.dim}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    pb.set_prefix("Indexing");
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_candidates() {
        assert!(is_text_candidate(Path::new("notes.md")));
        assert!(is_text_candidate(Path::new("src/main.RS")));
        assert!(!is_text_candidate(Path::new("photo.png")));
        assert!(!is_text_candidate(Path::new("Makefile")));
    }

    #[test]
    fn test_collect_files_skips_hidden_and_binary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "text").unwrap();
        std::fs::write(dir.path().join("b.png"), [0u8, 1, 2]).unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("c.md"), "hidden").unwrap();

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.md"]);
    }
}
