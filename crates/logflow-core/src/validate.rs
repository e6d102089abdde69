//! Request validation
//!
//! Pure checks against operator-tunable limits. Error messages are returned
//! verbatim to the client, so keep them readable.

use regex::Regex;
use thiserror::Error;

/// First rule an ingestion request violated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0}")]
    InvalidBody(String),

    #[error("Missing tenant_id in JSON payload")]
    MissingTenantId,

    #[error("Missing X-Tenant-ID header for text/plain")]
    MissingTenantHeader,

    #[error("Invalid tenant_id format")]
    InvalidTenantId,

    #[error("text must be a string")]
    TextNotString,

    #[error("text must be at least {min} characters, got {actual}")]
    TextTooShort { min: usize, actual: usize },

    #[error("text must be at most {max} characters, got {actual}")]
    TextTooLong { max: usize, actual: usize },

    #[error("log_id must be a non-empty string of at most {max} characters")]
    InvalidLogId { max: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationLimits {
    pub min_text_length: usize,
    pub max_text_length: usize,
    pub max_tenant_id_length: usize,
    pub max_log_id_length: usize,
    /// Charset a tenant id must match in full
    pub tenant_id_pattern: String,
}

/// Room for every JSON field of a message other than `text`
const MESSAGE_FIELDS_OVERHEAD: usize = 64 * 1024;

/// Longest JSON escape of one char: a `\uXXXX\uXXXX` surrogate pair
const MAX_ESCAPED_CHAR_LEN: usize = 12;

impl ValidationLimits {
    /// Upper bound in bytes on any body or message carrying text that passes
    /// these limits, whether raw UTF-8 or JSON-escaped.
    pub fn max_encoded_len(&self) -> usize {
        self.max_text_length
            .saturating_mul(MAX_ESCAPED_CHAR_LEN)
            .saturating_add(MESSAGE_FIELDS_OVERHEAD)
    }
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_text_length: 1,
            max_text_length: 10_000,
            max_tenant_id_length: 64,
            max_log_id_length: 128,
            tenant_id_pattern: "[A-Za-z0-9_-]+".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    limits: ValidationLimits,
    tenant_pattern: Regex,
}

impl Validator {
    pub fn new(limits: ValidationLimits) -> crate::Result<Self> {
        let tenant_pattern = Regex::new(&format!("^(?:{})$", limits.tenant_id_pattern))?;
        Ok(Self {
            limits,
            tenant_pattern,
        })
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    pub fn validate_tenant_id(&self, id: &str) -> bool {
        !id.is_empty()
            && id.chars().count() <= self.limits.max_tenant_id_length
            && self.tenant_pattern.is_match(id)
    }

    pub fn validate_text(&self, text: &str) -> Result<(), ValidationError> {
        let actual = text.chars().count();
        if actual < self.limits.min_text_length {
            return Err(ValidationError::TextTooShort {
                min: self.limits.min_text_length,
                actual,
            });
        }
        if actual > self.limits.max_text_length {
            return Err(ValidationError::TextTooLong {
                max: self.limits.max_text_length,
                actual,
            });
        }
        Ok(())
    }

    /// Absent ids are valid; the normalizer generates one.
    pub fn validate_log_id(&self, id: Option<&str>) -> bool {
        match id {
            None => true,
            Some(id) => !id.is_empty() && id.chars().count() <= self.limits.max_log_id_length,
        }
    }

    pub fn log_id_error(&self) -> ValidationError {
        ValidationError::InvalidLogId {
            max: self.limits.max_log_id_length,
        }
    }
}
