//! On-disk persistence for the knowledge store
//!
//! Documents serialize to a flat JSON array. The file is a cache, not a
//! wire contract: a missing or unreadable file starts an empty store, and
//! writes are best-effort.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use super::{Document, KnowledgeStore};

/// Default store location under the project data dir.
pub fn default_store_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("sh", "orbit", "orbit")
        .context("failed to determine data directory")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    Ok(data_dir.join("knowledge.json"))
}

/// Write the store's documents to `path` as pretty JSON.
pub fn save(store: &KnowledgeStore, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(store.documents())
        .context("failed to serialize knowledge store")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Load a store from `path`.
///
/// A missing file yields an empty store. A file that fails to parse does
/// too; the cache is disposable and must never block startup.
pub fn load(path: &Path, enabled: bool) -> KnowledgeStore {
    let mut store = KnowledgeStore::new(enabled);
    let Ok(raw) = std::fs::read_to_string(path) else {
        return store;
    };
    match serde_json::from_str::<Vec<Document>>(&raw) {
        Ok(docs) => {
            for doc in docs {
                store.upsert(&doc.path, &doc.text, 0, 0);
            }
        }
        Err(e) => {
            warn!("discarding unreadable knowledge store {}: {}", path.display(), e);
        }
    }
    store
}
