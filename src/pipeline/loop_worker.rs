use std::{any::Any, panic::AssertUnwindSafe};

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::{
    assessment::Assessor,
    db::RecordStore,
    log_error, log_info, log_warn,
    sensing::ReadingSource,
    utils::LogContext,
};

use super::cycle::{CycleOutcome, CycleTiming, Pipeline};

/// Per-outcome counters accumulated over the life of one loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub cycles: u64,
    pub persisted: u64,
    pub empty: u64,
    pub malformed: u64,
    pub invalid: u64,
    pub assessment_failures: u64,
    pub persist_failures: u64,
    pub unexpected: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        let counter = match outcome {
            CycleOutcome::SourceEmpty => &mut self.empty,
            CycleOutcome::SourceMalformed(_) => &mut self.malformed,
            CycleOutcome::ValidationFailed(_) => &mut self.invalid,
            CycleOutcome::AssessmentFailed(_) => &mut self.assessment_failures,
            CycleOutcome::Persisted { .. } => &mut self.persisted,
            CycleOutcome::PersistFailed(_) => &mut self.persist_failures,
            CycleOutcome::Unexpected(_) => &mut self.unexpected,
        };
        *counter += 1;
    }
}

/// Runs cycles until `cancel_token` fires. Cancellation is observed between
/// cycles only; a cycle in flight always runs to completion or timeout.
pub async fn pipeline_loop<S, A, K>(
    mut pipeline: Pipeline<S, A, K>,
    timing: CycleTiming,
    cancel_token: CancellationToken,
    log: LogContext,
) -> PipelineStats
where
    S: ReadingSource,
    A: Assessor,
    K: RecordStore,
{
    let mut stats = PipelineStats::default();

    loop {
        if cancel_token.is_cancelled() {
            log_info!(log, "pipeline loop shutting down");
            break;
        }

        let fut = AssertUnwindSafe(tokio::time::timeout(timing.cycle_timeout, pipeline.run_cycle()))
            .catch_unwind();
        let outcome = match fut.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                log_warn!(log, "pipeline cycle timeout (> {:?})", timing.cycle_timeout);
                CycleOutcome::Unexpected(format!("cycle exceeded {:?}", timing.cycle_timeout))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log_error!(log, "pipeline cycle panicked: {message}");
                CycleOutcome::Unexpected(message)
            }
        };
        stats.record(&outcome);

        let delay = pipeline.next_delay(&outcome, &timing);
        pipeline.enter_sleep();

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!(log, "pipeline loop shutting down");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        pipeline.wake();
    }

    log_info!(
        log,
        "pipeline stopped after {} cycles: {} persisted, {} empty, {} malformed, {} invalid, \
         {} assessment failures, {} persist failures, {} unexpected",
        stats.cycles,
        stats.persisted,
        stats.empty,
        stats.malformed,
        stats.invalid,
        stats.assessment_failures,
        stats.persist_failures,
        stats.unexpected
    );
    stats
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
