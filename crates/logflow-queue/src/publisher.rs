use std::collections::BTreeMap;

use async_trait::async_trait;
use logflow_core::{NormalizedMessage, TENANT_ATTRIBUTE};

use crate::Result;

/// Transport-assigned handle for a published message
pub type MessageId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub data: Vec<u8>,
    pub attributes: BTreeMap<String, String>,
}

impl OutboundMessage {
    /// JSON-encode a canonical message and tag it with its tenant
    pub fn from_normalized(message: &NormalizedMessage) -> Result<Self> {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            TENANT_ATTRIBUTE.to_string(),
            message.tenant_id.as_str().to_string(),
        );

        Ok(Self {
            data: message.to_json_bytes()?,
            attributes,
        })
    }
}

/// Publishing side of the queue.
///
/// `publish` resolves once the transport has accepted the message, not once
/// it has been processed.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<MessageId>;

    /// Topic or destination name, for logs
    fn destination(&self) -> &str;
}
