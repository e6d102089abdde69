//! Core domain models and logic for logflow
//!
//! This crate contains:
//! - The queue contract (`NormalizedMessage`) and the persisted unit (`ProcessedLogRecord`)
//! - Request validation against configurable limits
//! - Normalization of both wire formats into the canonical message
//! - Decoding of push deliveries back into canonical messages

pub mod envelope;
pub mod error;
pub mod message;
pub mod normalize;
pub mod redaction;
pub mod validate;

pub use envelope::{DecodeError, PushEnvelope, PushMessage, decode_message};
pub use error::{CoreError, Result};
pub use message::{
    LogSource, NormalizedMessage, ProcessedLogRecord, RecordKey, TENANT_ATTRIBUTE, TenantId,
};
pub use normalize::{Clock, IdSource, Normalizer, RawLog, SystemClock, UuidIds};
pub use redaction::{DEFAULT_REDACTION_TOKEN, RedactionRule};
pub use validate::{ValidationError, ValidationLimits, Validator};
