//! Interactive session state
//!
//! Everything a request needs beyond the static config lives here and is
//! passed explicitly: attached files, session notes, the learned budget,
//! the knowledge store. No ambient globals, so the ask flow stays testable
//! in isolation.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::context::budget::Budget;
use crate::knowledge::KnowledgeStore;

pub struct Session {
    /// Files attached to subsequent asks.
    pub files: Vec<String>,
    /// Key/value notes appended to the system prompt. BTreeMap keeps the
    /// rendering order stable across asks.
    pub notes: BTreeMap<String, String>,
    /// Current token budget (target from config, observed from rejections).
    pub budget: Budget,
    /// Stream responses for direct asks.
    pub stream: bool,
    /// Last answer, kept for follow-up commands.
    pub last_answer: String,
    pub knowledge: KnowledgeStore,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self::with_knowledge(config, KnowledgeStore::new(config.knowledge.enabled))
    }

    /// Build a session around an already-loaded knowledge store.
    pub fn with_knowledge(config: &Config, knowledge: KnowledgeStore) -> Self {
        let target = (config.context.ctx_target > 0).then_some(config.context.ctx_target);
        Self {
            files: Vec::new(),
            notes: BTreeMap::new(),
            budget: Budget::new(target, config.context.reserve),
            stream: config.llm.stream,
            last_answer: String::new(),
            knowledge,
        }
    }

    /// Attach a file path; duplicates are ignored.
    pub fn attach(&mut self, path: &str) -> bool {
        let path = path.trim().to_string();
        if path.is_empty() || self.files.contains(&path) {
            return false;
        }
        self.files.push(path);
        true
    }

    pub fn detach_all(&mut self) {
        self.files.clear();
    }

    pub fn note_set(&mut self, key: &str, value: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        self.notes.insert(key.to_string(), value.trim().to_string());
    }

    pub fn note_del(&mut self, key: &str) -> bool {
        self.notes.remove(key.trim()).is_some()
    }

    /// Base system prompt with session notes rendered as a sorted
    /// `[Context]` list.
    pub fn system_prompt(&self, base: &str) -> String {
        let base = base.trim();
        if self.notes.is_empty() {
            return base.to_string();
        }
        let mut out = String::from(base);
        out.push_str("\n\n[Context]\n");
        for (key, value) in &self.notes {
            out.push_str(&format!("- {}: {}\n", key, value));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_deduplicates() {
        let mut session = Session::new(&Config::default());
        assert!(session.attach("a.txt"));
        assert!(!session.attach("a.txt"));
        assert!(!session.attach("   "));
        assert_eq!(session.files, vec!["a.txt"]);
    }

    #[test]
    fn test_system_prompt_without_notes_is_base() {
        let session = Session::new(&Config::default());
        assert_eq!(session.system_prompt(" base "), "base");
    }

    #[test]
    fn test_system_prompt_renders_sorted_notes() {
        let mut session = Session::new(&Config::default());
        session.note_set("zone", "us-east");
        session.note_set("app", "billing");
        let prompt = session.system_prompt("base");
        let app_pos = prompt.find("- app: billing").unwrap();
        let zone_pos = prompt.find("- zone: us-east").unwrap();
        assert!(prompt.contains("[Context]"));
        assert!(app_pos < zone_pos);
    }

    #[test]
    fn test_budget_comes_from_config() {
        let mut config = Config::default();
        config.context.ctx_target = 4096;
        let session = Session::new(&config);
        assert_eq!(session.budget.target, Some(4096));

        let session = Session::new(&Config::default());
        assert_eq!(session.budget.target, None);
    }
}
