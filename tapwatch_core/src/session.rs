//! Session state machine: drives one sampling cycle at a time over all
//! tracked fields and publishes a [`CycleReport`] after each.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tapwatch_traits::{Capture, CaptureFailure, Clock, Recognizer};

use crate::builder::{Missing, SessionBuilder};
use crate::error::{BuildError, CollaboratorFailure, Result, SessionError};
use crate::estimator::EstimatorCfg;
use crate::field::{FieldPipeline, TrackedField};
use crate::report::CycleReport;
use crate::sampler::Sampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Sampling,
    Paused,
    Error,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Sampling => "sampling",
            SessionState::Paused => "paused",
            SessionState::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCfg {
    pub interval: Duration,
    pub collaborator_timeout: Duration,
    /// Consecutive all-fields-failed cycles before the session errors.
    pub failure_threshold: u32,
    /// Granularity of pause/stop checks while waiting for the next cycle.
    pub control_poll: Duration,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5_000),
            collaborator_timeout: Duration::from_millis(2_000),
            failure_threshold: 5,
            control_poll: Duration::from_millis(50),
        }
    }
}

/// Cooperative pause/stop requests, shared with other threads.
#[derive(Debug, Default)]
pub struct SessionControl {
    stop: AtomicBool,
    pause: AtomicBool,
}

impl SessionControl {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::Relaxed);
    }
    pub fn request_resume(&self) {
        self.pause.store(false, Ordering::Relaxed);
    }
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
    pub fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::Relaxed)
    }
    fn reset(&self) {
        self.stop.store(false, Ordering::Relaxed);
        self.pause.store(false, Ordering::Relaxed);
    }
}

pub struct SessionController {
    cfg: SessionCfg,
    fields: Vec<FieldPipeline>,
    sampler: Sampler,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    control: Arc<SessionControl>,
    state: SessionState,
    failed_cycles: u32,
    cycle: u64,
    fault: Option<SessionError>,
}

impl core::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("cycle", &self.cycle)
            .field("failed_cycles", &self.failed_cycles)
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

fn invalid(state: SessionState, action: &'static str) -> eyre::Report {
    eyre::Report::new(SessionError::InvalidTransition {
        state: state.name(),
        action,
    })
}

impl SessionController {
    pub fn builder() -> SessionBuilder<Missing, Missing> {
        SessionBuilder::default()
    }

    pub(crate) fn new(
        capture: Box<dyn Capture + Send>,
        recognizer: Box<dyn Recognizer + Send>,
        clock: Arc<dyn Clock + Send + Sync>,
        cfg: SessionCfg,
        estimator: EstimatorCfg,
        fields: Vec<TrackedField>,
    ) -> Result<Self> {
        let epoch = clock.now();
        let sampler = Sampler::spawn(capture, recognizer, clock.clone(), epoch)?;
        let fields = fields
            .into_iter()
            .map(|f| FieldPipeline::new(f, estimator.clone()))
            .collect();
        Ok(Self {
            cfg,
            fields,
            sampler,
            clock,
            epoch,
            control: Arc::new(SessionControl::default()),
            state: SessionState::Idle,
            failed_cycles: 0,
            cycle: 0,
            fault: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cfg(&self) -> &SessionCfg {
        &self.cfg
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Handle for requesting pause/stop from other threads.
    pub fn control(&self) -> Arc<SessionControl> {
        self.control.clone()
    }

    pub fn fault(&self) -> Option<&SessionError> {
        self.fault.as_ref()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn fields(&self) -> &[FieldPipeline] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldPipeline> {
        self.fields.iter().find(|p| p.name() == name)
    }

    /// Milliseconds since the session was built.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    fn transition(&mut self, to: SessionState) {
        if self.state != to {
            tracing::info!(from = self.state.name(), to = to.name(), "session state change");
            self.state = to;
        }
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle => {
                if !self.fields.iter().any(|p| p.field().region.is_valid()) {
                    return Err(eyre::Report::new(SessionError::NoCapturableFields));
                }
                self.control.reset();
                self.transition(SessionState::Sampling);
                Ok(())
            }
            SessionState::Sampling => Ok(()),
            s => Err(invalid(s, "start")),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.state {
            SessionState::Sampling | SessionState::Paused => {
                self.transition(SessionState::Paused);
                Ok(())
            }
            s => Err(invalid(s, "pause")),
        }
    }

    pub fn resume(&mut self) -> Result<()> {
        match self.state {
            SessionState::Paused | SessionState::Sampling => {
                self.transition(SessionState::Sampling);
                Ok(())
            }
            s => Err(invalid(s, "resume")),
        }
    }

    /// Back to `Idle` from any state. Buffers are kept for inspection;
    /// a fault and the failure streak are cleared.
    pub fn stop(&mut self) {
        self.failed_cycles = 0;
        self.fault = None;
        self.transition(SessionState::Idle);
    }

    /// Manual recovery: `stop` followed by `start`.
    pub fn restart(&mut self) -> Result<()> {
        self.stop();
        self.start()
    }

    /// Swap the definition of field `name`; its buffer starts empty.
    pub fn reconfigure_field(&mut self, name: &str, field: TrackedField) -> Result<()> {
        if field.name != name && self.field(&field.name).is_some() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(format!(
                "duplicate field name '{}'",
                field.name
            ))));
        }
        let pipeline = self
            .fields
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| eyre::Report::new(SessionError::UnknownField(name.to_string())))?;
        pipeline.reconfigure(field);
        Ok(())
    }

    /// Read every field once and fold the results into their pipelines.
    ///
    /// Stops early, without counting the skipped fields, when a pause or
    /// stop has been requested.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        if self.state != SessionState::Sampling {
            return Err(invalid(self.state, "run a cycle"));
        }
        self.cycle += 1;
        let timeout = self.cfg.collaborator_timeout;
        let mut attempted = 0usize;
        let mut failed = 0usize;

        for pipeline in &mut self.fields {
            if self.control.stop_requested() || self.control.pause_requested() {
                tracing::debug!(cycle = self.cycle, "cycle interrupted by control request");
                break;
            }
            attempted += 1;
            let field = pipeline.field();
            let result = if field.region.is_valid() {
                self.sampler.read(&field.region, &field.ocr, timeout)
            } else {
                Err(CollaboratorFailure::Capture(CaptureFailure::RegionInvalid(
                    format!("{}x{}", field.region.width, field.region.height),
                )))
            };
            match result {
                Ok(reading) => {
                    pipeline.ingest(&reading);
                }
                Err(failure) => {
                    failed += 1;
                    pipeline.record_failure(failure);
                }
            }
        }

        if attempted > 0 {
            if failed == attempted {
                self.failed_cycles += 1;
                tracing::warn!(
                    cycle = self.cycle,
                    failed_cycles = self.failed_cycles,
                    threshold = self.cfg.failure_threshold,
                    "every field failed this cycle"
                );
            } else {
                self.failed_cycles = 0;
            }
        }
        if self.failed_cycles >= self.cfg.failure_threshold {
            let err = SessionError::CollaboratorFailures {
                cycles: self.failed_cycles,
            };
            tracing::error!(error = %err, "session halted");
            self.fault = Some(err);
            self.transition(SessionState::Error);
        }
        Ok(self.report())
    }

    /// Snapshot of every field as of now.
    pub fn report(&self) -> CycleReport {
        CycleReport {
            cycle: self.cycle,
            at_ms: self.now_ms(),
            state: self.state,
            failed_cycles: self.failed_cycles,
            fault: self.fault.clone(),
            fields: self.fields.iter().map(FieldPipeline::report).collect(),
        }
    }
}
