//! Normalization of both wire formats into [`NormalizedMessage`]

use std::sync::Arc;

use time::OffsetDateTime;

use crate::message::{LogSource, NormalizedMessage, TenantId};

/// Source of identifiers for requests that arrive without a `log_id`
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs. Collisions are not checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Validated request fields, independent of wire format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub tenant_id: TenantId,
    pub log_id: Option<String>,
    pub text: String,
}

#[derive(Clone)]
pub struct Normalizer {
    ids: Arc<dyn IdSource>,
    clock: Arc<dyn Clock>,
}

impl Normalizer {
    pub fn new(ids: Arc<dyn IdSource>, clock: Arc<dyn Clock>) -> Self {
        Self { ids, clock }
    }

    /// Stamps `received_at` with the acceptance time and fills a missing `log_id`.
    pub fn normalize(&self, raw: RawLog, source: LogSource) -> NormalizedMessage {
        let log_id = raw.log_id.unwrap_or_else(|| self.ids.next_id());

        NormalizedMessage {
            tenant_id: raw.tenant_id,
            log_id,
            text: raw.text,
            source,
            received_at: self.clock.now(),
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(UuidIds), Arc::new(SystemClock))
    }
}
