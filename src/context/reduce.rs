//! Iterative reduction of oversized input
//!
//! Folds an ordered chunk sequence into a single bounded running summary by
//! calling the completion service once per chunk. Each fold prompt carries
//! the chunk, its position, and the summary so far; the response *replaces*
//! the summary rather than appending to it, which is what keeps the summary
//! bounded regardless of input size.
//!
//! The fold is strictly sequential: step N's prompt embeds step N-1's
//! output, so there is nothing to parallelize.

use std::future::Future;

use anyhow::Result;

use super::chunk::Chunk;

/// Stand-in summary when a fold step returns nothing, so a degenerate
/// completion can never silently wipe the accumulated state.
pub const EMPTY_SUMMARY_PLACEHOLDER: &str = "(empty summary)";

/// Sampling used for fold calls. Low temperature keeps the summary stable
/// across steps; the token cap is what bounds the running summary.
pub const FOLD_TEMPERATURE: f32 = 0.2;
pub const FOLD_MAX_TOKENS: u32 = 512;

/// Build the prompt for one fold step.
///
/// The first step has no summary yet and just asks for a condensation of
/// the chunk; later steps ask the model to update the carried summary.
fn fold_prompt(ordinal: usize, total: usize, chunk: &str, running: &str) -> String {
    let chunk = chunk.trim();
    let running = running.trim();
    if running.is_empty() {
        format!(
            "[PART {ordinal}/{total}]\n{chunk}\n\n\
             Your task: read the content above and summarize the key facts, \
             figures, errors, likely causes, and candidate actions in at most \
             10 lines. Output only the summary, no commentary.\n"
        )
    } else {
        format!(
            "[PART {ordinal}/{total}]\n{chunk}\n\n\
             [CURRENT SUMMARY]\n{running}\n\n\
             Your task: keep the existing summary, fold in anything new from \
             the part above, drop duplicates, and output the updated summary \
             in at most 12 lines. Output only the summary, no commentary.\n"
        )
    }
}

/// Fold `chunks` into one running summary via sequential completion calls.
///
/// `complete` receives the full fold prompt and returns the model's
/// response. Any error aborts the whole pass and propagates: a partially
/// folded summary would misrepresent the unprocessed tail as accounted for,
/// so nothing partial is ever returned.
pub async fn reduce<F, Fut>(chunks: &[Chunk], mut complete: F) -> Result<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let total = chunks.len();
    let mut running = String::new();

    for chunk in chunks {
        let prompt = fold_prompt(chunk.index + 1, total, &chunk.text, &running);
        let response = complete(prompt).await?;
        running = response.trim().to_string();
        if running.is_empty() {
            running = EMPTY_SUMMARY_PLACEHOLDER.to_string();
        }
    }

    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn chunk(text: &str, index: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            tokens: 1,
            index,
        }
    }

    #[tokio::test]
    async fn test_no_chunks_yields_empty_summary() {
        let summary = reduce(&[], |_| async { Ok("unused".to_string()) })
            .await
            .unwrap();
        assert_eq!(summary, "");
    }

    #[tokio::test]
    async fn test_one_call_per_chunk() {
        let chunks = vec![chunk("first", 0), chunk("second", 1), chunk("third", 2)];
        let calls = RefCell::new(0usize);
        let summary = reduce(&chunks, |_| {
            *calls.borrow_mut() += 1;
            let n = *calls.borrow();
            async move { Ok(format!("summary after step {}", n)) }
        })
        .await
        .unwrap();
        assert_eq!(*calls.borrow(), 3);
        assert_eq!(summary, "summary after step 3");
    }

    #[tokio::test]
    async fn test_prompt_carries_position_and_summary() {
        let chunks = vec![chunk("alpha", 0), chunk("beta", 1)];
        let prompts = RefCell::new(Vec::new());
        reduce(&chunks, |prompt| {
            prompts.borrow_mut().push(prompt);
            async { Ok("carried state".to_string()) }
        })
        .await
        .unwrap();

        let prompts = prompts.into_inner();
        assert!(prompts[0].contains("[PART 1/2]"));
        assert!(prompts[0].contains("alpha"));
        assert!(!prompts[0].contains("[CURRENT SUMMARY]"));
        assert!(prompts[1].contains("[PART 2/2]"));
        assert!(prompts[1].contains("beta"));
        assert!(prompts[1].contains("carried state"));
    }

    #[tokio::test]
    async fn test_empty_response_becomes_placeholder() {
        let chunks = vec![chunk("only", 0)];
        let summary = reduce(&chunks, |_| async { Ok("   \n".to_string()) })
            .await
            .unwrap();
        assert_eq!(summary, EMPTY_SUMMARY_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_error_aborts_immediately() {
        let chunks = vec![chunk("a", 0), chunk("b", 1), chunk("c", 2)];
        let calls = RefCell::new(0usize);
        let result = reduce(&chunks, |_| {
            *calls.borrow_mut() += 1;
            let n = *calls.borrow();
            async move {
                if n == 2 {
                    anyhow::bail!("backend fell over")
                }
                Ok("fine".to_string())
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 2);
    }
}
