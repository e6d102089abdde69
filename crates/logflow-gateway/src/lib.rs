pub mod error;
pub mod ingest;
pub mod server;

pub use error::GatewayError;
pub use ingest::{IngestAccepted, WireFormat};
pub use server::Gateway;

/// Header carrying the tenant for `text/plain` uploads
pub const TENANT_HEADER: &str = "x-tenant-id";
