//! Local knowledge store
//!
//! A content-addressable index over ingested text fragments (whole files,
//! pasted snippets, prior questions) searchable by lexical overlap. No
//! trained embeddings: a query is tokenized into word-class tokens and each
//! document is scored by occurrence counting. That is deliberately cheap:
//! the store runs inline with every ask and must never need a model.

pub mod persist;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::util::{expand_home, floor_char_boundary, sha256_hex, truncate_chars};

/// Word-class tokens: letter/digit/underscore/hyphen runs.
const WORD_PATTERN: &str = r"[\p{L}\p{N}_-]+";

/// Excerpt window when the caller does not size it.
const DEFAULT_EXCERPT_CHARS: usize = 800;

/// Results returned when the caller does not cap them.
const DEFAULT_TOP_K: usize = 3;

/// One indexed text fragment.
///
/// The store owns its documents outright; callers never mutate text after
/// insertion, only replace the whole document via [`KnowledgeStore::upsert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Source path or logical key.
    pub path: String,
    /// Stored text, truncated at ingest.
    pub text: String,
    /// SHA-256 over `path:text`, identifying this exact revision.
    pub fingerprint: String,
}

/// A ranked search hit: where it came from, how well it matched, and the
/// window of text around the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excerpt {
    pub path: String,
    pub score: usize,
    pub snippet: String,
}

/// Relevance scoring capability.
///
/// The shipped implementation counts substring occurrences; an embedding
/// scorer can replace it without touching document lifecycle code.
pub trait Scorer: Send + Sync {
    /// Score `text` against pre-tokenized, lowercased query tokens.
    fn score(&self, text: &str, query_tokens: &[String]) -> usize;
}

/// Case-insensitive substring occurrence counting.
#[derive(Debug, Clone, Copy, Default)]
pub struct OccurrenceScorer;

impl Scorer for OccurrenceScorer {
    fn score(&self, text: &str, query_tokens: &[String]) -> usize {
        let lower = text.to_lowercase();
        query_tokens
            .iter()
            .map(|token| lower.matches(token.as_str()).count())
            .sum()
    }
}

/// Mutable collection of indexed documents.
pub struct KnowledgeStore {
    enabled: bool,
    docs: Vec<Document>,
    scorer: Box<dyn Scorer>,
}

impl KnowledgeStore {
    pub fn new(enabled: bool) -> Self {
        Self::with_scorer(enabled, Box::new(OccurrenceScorer))
    }

    pub fn with_scorer(enabled: bool, scorer: Box<dyn Scorer>) -> Self {
        Self {
            enabled,
            docs: Vec::new(),
            scorer,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    pub fn clear(&mut self) {
        self.docs.clear();
    }

    /// Ingest or replace the document stored under `path`.
    ///
    /// Text is truncated at the byte ceiling first, then the char ceiling
    /// (zero disables either). Re-ingesting the same path replaces the
    /// prior entry in place; the store never holds two documents for one
    /// path.
    pub fn upsert(&mut self, path: &str, text: &str, max_bytes: usize, max_chars: usize) -> Document {
        let text = clamp_text(text, max_bytes, max_chars);
        let fingerprint = sha256_hex(format!("{}:{}", path, text).as_bytes());
        let doc = Document {
            path: path.to_string(),
            text: text.into_owned(),
            fingerprint,
        };
        match self.docs.iter_mut().find(|d| d.path == path) {
            Some(existing) => *existing = doc.clone(),
            None => self.docs.push(doc.clone()),
        }
        doc
    }

    /// Read `path` from disk (expanding a leading `~`) and ingest it.
    ///
    /// A read failure is returned to the caller and leaves the store
    /// unchanged.
    pub fn upsert_file(&mut self, path: &str, max_bytes: usize, max_chars: usize) -> Result<Document> {
        let path = path.trim();
        if path.is_empty() {
            bail!("empty path");
        }
        let resolved = expand_home(path);
        let bytes = std::fs::read(&resolved)
            .with_context(|| format!("failed to read {}", resolved.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.upsert(&resolved.to_string_lossy(), &text, max_bytes, max_chars))
    }

    /// Return the `top_k` best-matching excerpts for `query`.
    ///
    /// A disabled or empty store yields an empty result, never an error.
    /// Ranking is deterministic: score descending, then path ascending.
    pub fn search(&self, query: &str, top_k: usize, excerpt_chars: usize) -> Vec<Excerpt> {
        if !self.enabled || self.docs.is_empty() {
            return Vec::new();
        }
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        let tokens = word_tokens(&query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(usize, &Document)> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let score = self.scorer.score(&doc.text, &tokens);
                (score > 0).then_some((score, doc))
            })
            .collect();

        hits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.path.cmp(&b.1.path)));

        let top_k = if top_k == 0 { DEFAULT_TOP_K } else { top_k };
        hits.truncate(top_k);

        hits.into_iter()
            .map(|(score, doc)| Excerpt {
                path: doc.path.clone(),
                score,
                snippet: build_excerpt(&doc.text, &tokens, excerpt_chars),
            })
            .collect()
    }

    /// (enabled, document count) for status displays.
    pub fn stats(&self) -> (bool, usize) {
        (self.enabled, self.docs.len())
    }
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("enabled", &self.enabled)
            .field("docs", &self.docs.len())
            .finish()
    }
}

/// Tokenize an already-lowercased query into word-class tokens.
fn word_tokens(query: &str) -> Vec<String> {
    let Ok(re) = Regex::new(WORD_PATTERN) else {
        return Vec::new();
    };
    re.find_iter(query).map(|m| m.as_str().to_string()).collect()
}

/// Byte ceiling first, then char ceiling. Byte cuts snap down to a char
/// boundary so the stored text stays valid UTF-8.
fn clamp_text(text: &str, max_bytes: usize, max_chars: usize) -> std::borrow::Cow<'_, str> {
    let mut text = text;
    if max_bytes > 0 && text.len() > max_bytes {
        text = &text[..floor_char_boundary(text, max_bytes)];
    }
    std::borrow::Cow::Borrowed(truncate_chars(text, max_chars))
}

/// Window `excerpt_chars` of text around the earliest query-token match:
/// one third before the match, two thirds after, clipped to the document,
/// with `…` marking clipped edges. Falls back to the document head when no
/// token occurs in the text.
fn build_excerpt(text: &str, query_tokens: &[String], excerpt_chars: usize) -> String {
    let excerpt_chars = if excerpt_chars == 0 {
        DEFAULT_EXCERPT_CHARS
    } else {
        excerpt_chars
    };

    let lower = text.to_lowercase();
    let earliest = query_tokens
        .iter()
        .filter(|t| !t.is_empty())
        .filter_map(|t| lower.find(t.as_str()))
        .min();

    let Some(hit) = earliest else {
        return crate::util::truncate_chars_ellipsis(text, excerpt_chars);
    };

    // The lowercased copy can shift byte offsets for a few scripts; snap
    // into range on the original.
    let hit = floor_char_boundary(text, hit.min(text.len()));
    let start = floor_char_boundary(text, hit.saturating_sub(excerpt_chars / 3));
    let end = floor_char_boundary(text, (start + excerpt_chars).min(text.len()));

    let mut snippet = text[start..end].to_string();
    if start > 0 {
        snippet = format!("…{}", snippet);
    }
    if end < text.len() {
        snippet.push('…');
    }
    snippet
}
