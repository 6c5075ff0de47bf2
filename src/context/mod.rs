//! Bounded-context assembly
//!
//! Builds the request body that actually gets sent to the completion
//! server: retrieved knowledge excerpts and attached-file blocks merged
//! with the question, checked against the active token budget, and, when
//! the result will not fit, compressed through the chunk splitter and the
//! iterative reducer before the final call goes out.

pub mod budget;
pub mod chunk;
pub mod estimate;
pub mod reduce;

use std::future::Future;

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::knowledge::KnowledgeStore;
use crate::util::{expand_home, sha256_hex, truncate_chars};

use budget::Budget;
use chunk::split_by_tokens;
use estimate::{estimate_tokens, HeuristicEstimator};
use reduce::reduce;

/// Fully assembled request content plus the audit trail of what went in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledInput {
    /// The user-message body: question, excerpts, file blocks.
    pub content: String,
    /// Resolved paths of the files that were actually attached.
    pub files: Vec<String>,
    /// SHA-256 of each attached file's original (pre-truncation) bytes,
    /// parallel to `files`.
    pub file_hashes: Vec<String>,
}

/// One completion call the assembler wants issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskCall {
    /// User-message content; the caller supplies the system message.
    pub user: String,
    /// Whether this call may stream. Fold calls never stream; only the
    /// final or direct call may.
    pub streaming: bool,
}

/// How an assembled input will be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Content fits (or no budget is known): send as-is.
    Direct,
    /// Content is over budget: split at `chunk_budget` tokens and reduce.
    Reduce { chunk_budget: usize },
}

/// Decide how to send `content` under `budget`.
pub fn plan(content: &str, budget: &Budget) -> Route {
    match budget.usable() {
        None => Route::Direct,
        Some(usable) => {
            if estimate_tokens(content) <= usable {
                Route::Direct
            } else {
                Route::Reduce {
                    chunk_budget: usable,
                }
            }
        }
    }
}

/// Merge the question with knowledge excerpts and attached files.
///
/// Excerpts and file blocks are folded in *before* any budget check so that
/// compression accounts for their size too. An unreadable attached file
/// fails the whole assembly: the request is never sent partially blind.
pub fn assemble(
    question: &str,
    files: &[String],
    store: &KnowledgeStore,
    config: &Config,
) -> Result<AssembledInput> {
    let question = question.trim();
    if question.is_empty() {
        bail!("empty prompt");
    }

    let mut content = String::from(question);

    let excerpts = store.search(
        question,
        config.knowledge.top_k,
        config.knowledge.excerpt_chars,
    );
    if !excerpts.is_empty() {
        content.push_str("\n\n---\nRelevant excerpts from the local knowledge base:\n\n");
        for excerpt in &excerpts {
            content.push_str(&format!(
                "### KNOWLEDGE: {}\n```\n{}\n```\n\n",
                excerpt.path, excerpt.snippet
            ));
        }
    }

    let mut used = Vec::new();
    let mut hashes = Vec::new();
    if !files.is_empty() {
        content.push_str(
            "\n\n---\nAttached file contents follow. Base your analysis and answer on them.\n\n",
        );
        for file in files {
            let (path, hash, block) =
                read_attached_file(file, config.files.max_bytes, config.files.max_chars)
                    .with_context(|| format!("failed to attach {}", file))?;
            used.push(path);
            hashes.push(hash);
            content.push_str(&block);
            content.push('\n');
        }
    }

    Ok(AssembledInput {
        content,
        files: used,
        file_hashes: hashes,
    })
}

/// Read one attached file, returning (resolved path, content hash, block).
///
/// The hash covers the original bytes so the audit log records what the
/// user attached even when ceilings truncated what was sent.
fn read_attached_file(
    path: &str,
    max_bytes: usize,
    max_chars: usize,
) -> Result<(String, String, String)> {
    let path = path.trim();
    if path.is_empty() {
        bail!("empty file path");
    }
    let resolved = expand_home(path);
    let bytes = std::fs::read(&resolved)
        .with_context(|| format!("failed to read {}", resolved.display()))?;
    let hash = sha256_hex(&bytes);

    let cut = if max_bytes > 0 && bytes.len() > max_bytes {
        &bytes[..max_bytes]
    } else {
        &bytes[..]
    };
    let text = String::from_utf8_lossy(cut);
    let text = truncate_chars(&text, max_chars);

    let resolved = resolved.to_string_lossy().to_string();
    let block = format!("### FILE: {} (sha256:{})\n```\n{}\n```\n", resolved, hash, text);
    Ok((resolved, hash, block))
}

/// Prompt for the final call after a reduction pass.
fn final_prompt(summary: &str, question: &str) -> String {
    format!(
        "Below is a running summary of a long input that was processed in parts.\n\n\
         [SUMMARY]\n{}\n\n\
         Using the summary, answer the user's original question:\n{}\n",
        summary.trim(),
        question.trim()
    )
}

/// Send assembled content through the budget gate.
///
/// Within budget (or with no budget known) this issues exactly one call
/// with the content untouched. Over budget it splits the content, folds
/// each chunk through `complete` without streaming, then issues one final
/// call carrying the running summary and the original question. Any error
/// from `complete` aborts the whole chain.
pub async fn run_ask<F, Fut>(
    question: &str,
    input: &AssembledInput,
    budget: &Budget,
    mut complete: F,
) -> Result<String>
where
    F: FnMut(AskCall) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    match plan(&input.content, budget) {
        Route::Direct => {
            complete(AskCall {
                user: input.content.clone(),
                streaming: true,
            })
            .await
        }
        Route::Reduce { chunk_budget } => {
            let chunks = split_by_tokens(&input.content, chunk_budget, &HeuristicEstimator);
            if chunks.len() <= 1 {
                // Splitting bought nothing; send as-is and let the server decide.
                return complete(AskCall {
                    user: input.content.clone(),
                    streaming: true,
                })
                .await;
            }
            tracing::debug!(
                chunks = chunks.len(),
                total_tokens = chunks.iter().map(|c| c.tokens).sum::<usize>(),
                chunk_budget,
                "input over budget, reducing"
            );
            let summary = reduce(&chunks, |prompt| {
                complete(AskCall {
                    user: prompt,
                    streaming: false,
                })
            })
            .await?;
            complete(AskCall {
                user: final_prompt(&summary, question),
                streaming: true,
            })
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn empty_store() -> KnowledgeStore {
        KnowledgeStore::new(false)
    }

    #[test]
    fn test_assemble_bare_question_unchanged() {
        let input = assemble("ping", &[], &empty_store(), &Config::default()).unwrap();
        assert_eq!(input.content, "ping");
        assert!(input.files.is_empty());
        assert!(input.file_hashes.is_empty());
    }

    #[test]
    fn test_assemble_rejects_empty_question() {
        assert!(assemble("   ", &[], &empty_store(), &Config::default()).is_err());
    }

    #[test]
    fn test_assemble_merges_knowledge_excerpts() {
        let mut store = KnowledgeStore::new(true);
        store.upsert("runbook.md", "when the disk is full, rotate the logs", 0, 0);
        let input = assemble("disk full", &[], &store, &Config::default()).unwrap();
        assert!(input.content.starts_with("disk full"));
        assert!(input.content.contains("### KNOWLEDGE: runbook.md"));
        assert!(input.content.contains("rotate the logs"));
    }

    #[test]
    fn test_assemble_attaches_files_with_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.txt");
        std::fs::write(&file, "all systems nominal").unwrap();

        let files = vec![file.to_string_lossy().to_string()];
        let input = assemble("what happened?", &files, &empty_store(), &Config::default()).unwrap();

        assert_eq!(input.files.len(), 1);
        assert_eq!(input.file_hashes.len(), 1);
        assert_eq!(input.file_hashes[0].len(), 64);
        assert!(input.content.contains("### FILE:"));
        assert!(input.content.contains("all systems nominal"));
    }

    #[test]
    fn test_assemble_fails_on_unreadable_file() {
        let files = vec!["/no/such/file.txt".to_string()];
        assert!(assemble("q", &files, &empty_store(), &Config::default()).is_err());
    }

    #[test]
    fn test_plan_without_budget_is_direct() {
        assert_eq!(plan("anything at all", &Budget::default()), Route::Direct);
    }

    #[test]
    fn test_plan_routes_by_estimate() {
        let budget = Budget::new(Some(4096), 768);
        assert_eq!(plan("short", &budget), Route::Direct);

        let long = "word ".repeat(20_000);
        assert_eq!(
            plan(&long, &budget),
            Route::Reduce {
                chunk_budget: 4096 - 768
            }
        );
    }

    #[tokio::test]
    async fn test_direct_path_sends_content_unchanged() {
        let input = AssembledInput {
            content: "ping".to_string(),
            files: Vec::new(),
            file_hashes: Vec::new(),
        };
        let calls = RefCell::new(Vec::new());
        let answer = run_ask("ping", &input, &Budget::default(), |call| {
            calls.borrow_mut().push(call);
            async { Ok("pong".to_string()) }
        })
        .await
        .unwrap();

        assert_eq!(answer, "pong");
        let calls = calls.into_inner();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].user, "ping");
        assert!(calls[0].streaming);
    }

    #[tokio::test]
    async fn test_reduce_path_call_counts() {
        // 1000-token budget with 500 reserve clamps to the 512-token floor;
        // ~5000 tokens of content has to split.
        let budget = Budget::new(Some(1000), 500);
        let content = (0..500)
            .map(|i| format!("paragraph {} with several words of filler text", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        assert!(estimate_tokens(&content) > 4000);

        let usable = budget.usable().unwrap();
        let chunks = split_by_tokens(&content, usable, &HeuristicEstimator);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.tokens <= usable);
        }

        let input = AssembledInput {
            content,
            files: Vec::new(),
            file_hashes: Vec::new(),
        };
        let fold_calls = RefCell::new(0usize);
        let final_calls = RefCell::new(0usize);
        let answer = run_ask("summarize the incident", &input, &budget, |call| {
            if call.streaming {
                *final_calls.borrow_mut() += 1;
            } else {
                *fold_calls.borrow_mut() += 1;
            }
            async { Ok("folded state".to_string()) }
        })
        .await
        .unwrap();

        assert_eq!(answer, "folded state");
        assert_eq!(*fold_calls.borrow(), chunks.len());
        assert_eq!(*final_calls.borrow(), 1);
    }

    fn oversized_content() -> String {
        (0..400)
            .map(|i| format!("paragraph {} with several words of filler text", i))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[tokio::test]
    async fn test_final_call_carries_summary_and_question() {
        let budget = Budget::new(Some(1000), 500);
        let input = AssembledInput {
            content: oversized_content(),
            files: Vec::new(),
            file_hashes: Vec::new(),
        };
        let last_user = RefCell::new(String::new());
        run_ask("why did it crash?", &input, &budget, |call| {
            if call.streaming {
                *last_user.borrow_mut() = call.user.clone();
            }
            async { Ok("the summary so far".to_string()) }
        })
        .await
        .unwrap();

        let last = last_user.into_inner();
        assert!(last.contains("[SUMMARY]"));
        assert!(last.contains("the summary so far"));
        assert!(last.contains("why did it crash?"));
    }

    #[tokio::test]
    async fn test_fold_error_aborts_chain() {
        let budget = Budget::new(Some(1000), 500);
        let input = AssembledInput {
            content: oversized_content(),
            files: Vec::new(),
            file_hashes: Vec::new(),
        };
        let final_calls = RefCell::new(0usize);
        let result = run_ask("q", &input, &budget, |call| {
            if call.streaming {
                *final_calls.borrow_mut() += 1;
            }
            async { anyhow::bail!("fold step failed") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(*final_calls.borrow(), 0);
    }
}
