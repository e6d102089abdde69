use serde::{Deserialize, Serialize};

pub const DEFAULT_REDACTION_TOKEN: &str = "[REDACTED]";

/// One pattern → literal substitution, applied in configured order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionRule {
    pub name: String,
    pub pattern: String,
    #[serde(default = "default_replacement")]
    pub replacement: String,
}

impl RedactionRule {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            replacement: default_replacement(),
        }
    }

    /// Phone-number shapes: `555-0199`, `555-123-4567`, `(555) 123-4567`
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("PHONE_LOCAL", r"\d{3}-\d{4}"),
            Self::new("PHONE_DASHED", r"\d{3}-\d{3}-\d{4}"),
            Self::new("PHONE_PARENS", r"\(\d{3}\)\s*\d{3}-\d{4}"),
        ]
    }
}

fn default_replacement() -> String {
    DEFAULT_REDACTION_TOKEN.to_string()
}
