//! Pipeline orchestration: the run driver and the consumer-facing event
//! stream.

mod orchestrator;
mod stream;

pub use orchestrator::ScenePipeline;
pub use stream::EventStream;

#[cfg(test)]
mod integration_tests;
