use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    assessment::Assessor, db::RecordStore, log_info, sensing::ReadingSource, utils::LogContext,
};

use super::{
    cycle::{CycleTiming, Pipeline},
    loop_worker::{pipeline_loop, PipelineStats},
};

/// Owns the background task that drives the pipeline loop.
pub struct PipelineController {
    handle: Option<JoinHandle<PipelineStats>>,
    cancel_token: Option<CancellationToken>,
    log: LogContext,
}

impl PipelineController {
    pub fn new(log: LogContext) -> Self {
        Self {
            handle: None,
            cancel_token: None,
            log,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start<S, A, K>(&mut self, pipeline: Pipeline<S, A, K>, timing: CycleTiming) -> Result<()>
    where
        S: ReadingSource + 'static,
        A: Assessor + 'static,
        K: RecordStore + 'static,
    {
        if self.handle.is_some() {
            bail!("pipeline already running");
        }

        log_info!(
            self.log,
            "starting pipeline loop (interval {:?}, cycle timeout {:?})",
            timing.interval,
            timing.cycle_timeout
        );

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(pipeline_loop(
            pipeline,
            timing,
            cancel_token.clone(),
            self.log,
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Signals the loop and waits for the in-flight cycle to finish.
    pub async fn stop(&mut self) -> Result<PipelineStats> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle.await.context("pipeline loop task failed to join")
        } else {
            Ok(PipelineStats::default())
        }
    }
}
