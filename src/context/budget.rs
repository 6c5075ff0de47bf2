//! Context budget tracking
//!
//! A budget pairs the model's maximum context size with reserved headroom
//! for the system prompt and completion. Two sources feed it: the *target*
//! the user configured, and the *observed* size parsed out of a server
//! rejection. Once observed, the server's own figure wins.

use regex::Regex;

/// Minimum usable budget. Anything smaller produces fold prompts too small
/// to carry a chunk plus the running summary.
pub const BUDGET_FLOOR: usize = 512;

/// Default headroom reserved for the system prompt and response.
pub const DEFAULT_RESERVE: usize = 768;

/// Usable token allowance for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// User-declared context size, if any.
    pub target: Option<usize>,
    /// Context size learned from a server rejection, if any.
    pub observed: Option<usize>,
    /// Headroom subtracted from the context size.
    pub reserve: usize,
}

impl Budget {
    pub fn new(target: Option<usize>, reserve: usize) -> Self {
        Self {
            target: target.filter(|&n| n > 0),
            observed: None,
            reserve,
        }
    }

    /// The context size in effect: observed when known, target otherwise.
    pub fn effective(&self) -> Option<usize> {
        self.observed.or(self.target)
    }

    /// Usable tokens for one request: `max(context - reserve, floor)`.
    /// `None` when no context size is known at all.
    pub fn usable(&self) -> Option<usize> {
        self.effective()
            .map(|max_ctx| max_ctx.saturating_sub(self.reserve).max(BUDGET_FLOOR))
    }

    /// Record a context size reported by the server. Supersedes any prior
    /// observation and takes priority over the target from now on.
    pub fn observe(&mut self, tokens: usize) {
        if tokens > 0 {
            self.observed = Some(tokens);
        }
    }

    /// True when the configured target exceeds what the server actually
    /// runs with; the shell surfaces a restart hint in that case.
    pub fn target_exceeds_observed(&self) -> bool {
        matches!((self.target, self.observed), (Some(t), Some(o)) if t > o)
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::new(None, DEFAULT_RESERVE)
    }
}

/// Extract the context size from a budget-exceeded rejection.
///
/// llama.cpp-style servers phrase the overflow as
/// `... available context size (4096 tokens) ...`; the number is the ground
/// truth for the running instance.
pub fn parse_context_size(message: &str) -> Option<usize> {
    let re = Regex::new(r"available context size \((\d+) tokens\)").ok()?;
    re.captures(message)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_budget_known() {
        let budget = Budget::default();
        assert_eq!(budget.effective(), None);
        assert_eq!(budget.usable(), None);
    }

    #[test]
    fn test_usable_subtracts_reserve() {
        let budget = Budget::new(Some(4096), 768);
        assert_eq!(budget.usable(), Some(4096 - 768));
    }

    #[test]
    fn test_usable_clamps_to_floor() {
        let budget = Budget::new(Some(600), 768);
        assert_eq!(budget.usable(), Some(BUDGET_FLOOR));
    }

    #[test]
    fn test_observed_supersedes_target() {
        let mut budget = Budget::new(Some(8192), 768);
        budget.observe(4096);
        assert_eq!(budget.effective(), Some(4096));
        assert_eq!(budget.usable(), Some(4096 - 768));
        assert!(budget.target_exceeds_observed());
    }

    #[test]
    fn test_observation_applies_with_no_target() {
        let mut budget = Budget::default();
        budget.observe(2048);
        assert_eq!(budget.effective(), Some(2048));
    }

    #[test]
    fn test_zero_observation_ignored() {
        let mut budget = Budget::new(Some(4096), 768);
        budget.observe(0);
        assert_eq!(budget.effective(), Some(4096));
    }

    #[test]
    fn test_parse_rejection() {
        let msg = "request too large for the available context size (4096 tokens)";
        assert_eq!(parse_context_size(msg), Some(4096));
    }

    #[test]
    fn test_parse_rejection_embedded() {
        let msg = "API Error: the prompt exceeds the available context size (2048 tokens), \
                   reduce the prompt or restart with a larger --ctx-size";
        assert_eq!(parse_context_size(msg), Some(2048));
    }

    #[test]
    fn test_parse_unrelated_error() {
        assert_eq!(parse_context_size("connection refused"), None);
        assert_eq!(parse_context_size(""), None);
    }
}
