pub mod error;
pub mod processor;
pub mod pull;
pub mod push;

#[cfg(test)]
pub(crate) mod testing;

pub use error::WorkerError;
pub use processor::{Outcome, Processor, Stage};
pub use pull::PullWorker;
pub use push::ProcessResponse;
