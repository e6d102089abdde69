//! Content redaction for processed logs

pub mod redactor;

pub use redactor::{RedactionInfo, Redactor};
