//! Process wiring shared by the `logflow` binary and its integration tests

pub mod pipeline;

pub use pipeline::Pipeline;
