//! Chunk splitting for oversized input
//!
//! Splits text that will not fit the active budget into ordered chunks,
//! preferring paragraph boundaries (blank-line blocks) and falling back to
//! line boundaries when a single paragraph is itself too large. Packing is
//! greedy: consecutive blocks accumulate into the pending chunk until the
//! next block would overflow it.

use super::estimate::TokenEstimator;

/// A bounded, ordered slice of a larger text.
///
/// Chunks are a view produced on demand; they are never stored apart from
/// the text they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text, trimmed of surrounding whitespace.
    pub text: String,
    /// Estimated token count of `text`.
    pub tokens: usize,
    /// Zero-based position within the split sequence.
    pub index: usize,
}

/// Greedy packing accumulator: the pending chunk plus its token count,
/// threaded through the fold over paragraphs and lines.
struct Packer<'e> {
    estimator: &'e dyn TokenEstimator,
    max_tokens: usize,
    pending: String,
    pending_tokens: usize,
    chunks: Vec<Chunk>,
}

impl<'e> Packer<'e> {
    fn new(estimator: &'e dyn TokenEstimator, max_tokens: usize) -> Self {
        Self {
            estimator,
            max_tokens,
            pending: String::new(),
            pending_tokens: 0,
            chunks: Vec::new(),
        }
    }

    /// Close the pending chunk, if it holds anything.
    fn flush(&mut self) {
        let text = self.pending.trim();
        if !text.is_empty() {
            self.chunks.push(Chunk {
                text: text.to_string(),
                tokens: self.estimator.estimate(text),
                index: self.chunks.len(),
            });
        }
        self.pending.clear();
        self.pending_tokens = 0;
    }

    /// Append `block` to the pending chunk, closing it first when the block
    /// (plus separator) would overflow the budget.
    fn push(&mut self, block: &str, separator: &str, separator_cost: usize) {
        let cost = self.estimator.estimate(block);
        if self.pending_tokens > 0 && self.pending_tokens + cost + separator_cost > self.max_tokens
        {
            self.flush();
        }
        if !self.pending.is_empty() {
            self.pending.push_str(separator);
            self.pending_tokens += separator_cost;
        }
        self.pending.push_str(block);
        self.pending_tokens += cost;
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush();
        self.chunks
    }
}

/// Split `text` into ordered chunks whose estimated size stays within
/// `max_tokens` whenever structurally possible.
///
/// Text that already fits comes back as a single chunk. A `max_tokens` of
/// zero disables splitting. The result is never empty for non-empty input:
/// if packing produced nothing, the original text is returned as one chunk
/// rather than dropping content.
pub fn split_by_tokens(
    text: &str,
    max_tokens: usize,
    estimator: &dyn TokenEstimator,
) -> Vec<Chunk> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if max_tokens == 0 || estimator.estimate(text) <= max_tokens {
        return vec![Chunk {
            text: text.to_string(),
            tokens: estimator.estimate(text),
            index: 0,
        }];
    }

    let mut packer = Packer::new(estimator, max_tokens);

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if estimator.estimate(paragraph) > max_tokens {
            // Oversized paragraph: repack its lines with the same rule.
            for line in paragraph.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                packer.push(line, "\n", 1);
            }
        } else {
            packer.push(paragraph, "\n\n", 2);
        }
    }

    let chunks = packer.finish();
    if chunks.is_empty() {
        return vec![Chunk {
            text: text.to_string(),
            tokens: estimator.estimate(text),
            index: 0,
        }];
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::estimate::{estimate_tokens, HeuristicEstimator};

    fn split(text: &str, max_tokens: usize) -> Vec<Chunk> {
        split_by_tokens(text, max_tokens, &HeuristicEstimator)
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = split("Hello, world!", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_empty_text() {
        assert!(split("", 100).is_empty());
        assert!(split("  \n\n  ", 100).is_empty());
    }

    #[test]
    fn test_zero_budget_disables_splitting() {
        let chunks = split("some text\n\nmore text", 0);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_paragraphs_packed_greedily() {
        let text = "aaaa aaaa aaaa\n\nbbbb bbbb bbbb\n\ncccc cccc cccc";
        let chunks = split(text, 5);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.tokens <= 5, "chunk over budget: {:?}", chunk);
        }
    }

    #[test]
    fn test_oversized_paragraph_splits_on_lines() {
        // One paragraph, many lines, far beyond the budget.
        let text = (0..20)
            .map(|i| format!("line number {} with some padding text", i))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = split(&text, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.tokens <= 20, "chunk over budget: {:?}", chunk);
        }
    }

    #[test]
    fn test_indices_contiguous_and_ordered() {
        let text = (0..30)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = split(&text, 8);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn test_no_content_loss() {
        let text = "alpha beta\n\ngamma delta\n\nepsilon zeta eta theta\niota kappa";
        let chunks = split(text, 4);
        let rejoined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let mut original: Vec<&str> = text.split_whitespace().collect();
        let mut recovered: Vec<&str> = rejoined.split_whitespace().collect();
        assert_eq!(original, recovered);
        // Order is preserved too, not just the multiset.
        original.dedup();
        recovered.dedup();
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let first = split(text, 2);
        let second = split(text, 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_chunk_token_estimates_match() {
        let chunks = split("one two three four\n\nfive six seven eight", 3);
        for chunk in &chunks {
            assert_eq!(chunk.tokens, estimate_tokens(&chunk.text));
        }
    }
}
