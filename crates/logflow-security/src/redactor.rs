use logflow_core::RedactionRule;
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionInfo {
    pub redaction_type: String,
    pub count: usize,
}

struct CompiledRule {
    name: String,
    pattern: Regex,
    replacement: String,
}

/// Ordered pattern → token substitution engine
pub struct Redactor {
    rules: Vec<CompiledRule>,
}

impl Redactor {
    /// Compile rules in order. A rule whose pattern does not compile is logged
    /// and skipped so the remaining rules still apply.
    pub fn new(rules: &[RedactionRule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| match Regex::new(&rule.pattern) {
                Ok(pattern) => Some(CompiledRule {
                    name: rule.name.clone(),
                    pattern,
                    replacement: rule.replacement.clone(),
                }),
                Err(e) => {
                    warn!(rule = %rule.name, pattern = %rule.pattern, error = %e, "skipping invalid redaction pattern");
                    None
                }
            })
            .collect();

        Self { rules }
    }

    /// Number of rules that compiled
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn redact(&self, content: &str) -> String {
        self.redact_with_info(content).0
    }

    /// Redact and report how often each rule fired.
    ///
    /// Each rule runs over the output of the previous one, so text replaced by an
    /// earlier rule cannot be matched again by a later one.
    pub fn redact_with_info(&self, content: &str) -> (String, Vec<RedactionInfo>) {
        let mut result = content.to_string();
        let mut redactions = Vec::new();

        for rule in &self.rules {
            let count = rule.pattern.find_iter(&result).count();

            if count > 0 {
                result = rule
                    .pattern
                    .replace_all(&result, NoExpand(&rule.replacement))
                    .into_owned();

                redactions.push(RedactionInfo {
                    redaction_type: rule.name.clone(),
                    count,
                });
            }
        }

        (result, redactions)
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(&RedactionRule::defaults())
    }
}
