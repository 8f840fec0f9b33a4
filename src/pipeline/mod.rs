//! Acquire, validate, assess, persist, sleep. Repeated until stopped.

pub mod controller;
pub mod cycle;
pub mod loop_worker;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::PipelineController;
pub use cycle::{CycleOutcome, CycleTiming, Pipeline, PipelineState};
pub use loop_worker::{pipeline_loop, PipelineStats};
