//! Prompt intent extraction
//!
//! A lexical fallback used only when the caller gave no explicit target.
//! Nothing here checks the extracted target against the dataset; callers
//! must treat it as unverified.

use crate::task::TaskKind;

/// Best-effort reading of a prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intent {
    pub target: Option<String>,
    pub task_type: Option<TaskKind>,
}

/// Maps a free-text prompt to a candidate target and task kind
pub trait IntentParser: Send + Sync {
    fn extract(&self, prompt: &str) -> Intent;
}

/// Substring-based parser: the word after "predict" is the target, and
/// "classification" / "regression" / "predict value" pick the task kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordIntentParser;

const PREDICT: &str = "predict";

impl KeywordIntentParser {
    pub fn new() -> Self {
        Self
    }

    /// The keyword match ignores case; the returned target keeps the
    /// prompt's casing so it can name a mixed-case column exactly.
    fn extract_target(prompt: &str) -> Option<String> {
        // ASCII lowercasing keeps byte offsets aligned with `prompt`
        let lowered = prompt.to_ascii_lowercase();
        let start = lowered.find(PREDICT)? + PREDICT.len();

        let token = prompt[start..].split_whitespace().next()?;
        let token = token.trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '"' | '\'' | '(' | ')')
        });

        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    fn extract_task_type(prompt: &str) -> Option<TaskKind> {
        let lowered = prompt.to_lowercase();
        if lowered.contains("classification") {
            Some(TaskKind::Classification)
        } else if lowered.contains("regression") || lowered.contains("predict value") {
            Some(TaskKind::Regression)
        } else {
            None
        }
    }
}

impl IntentParser for KeywordIntentParser {
    fn extract(&self, prompt: &str) -> Intent {
        Intent {
            target: Self::extract_target(prompt),
            task_type: Self::extract_task_type(prompt),
        }
    }
}
