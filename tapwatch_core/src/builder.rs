//! Type-state builder for `SessionController`.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tapwatch_traits::{Capture, Clock, MonotonicClock, Recognizer};

use crate::error::{BuildError, Result};
use crate::estimator::EstimatorCfg;
use crate::field::TrackedField;
use crate::session::{SessionCfg, SessionController};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `SessionController`. Everything is validated on `build()`.
pub struct SessionBuilder<C, R> {
    capture: Option<Box<dyn Capture + Send>>,
    recognizer: Option<Box<dyn Recognizer + Send>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    session: Option<SessionCfg>,
    estimator: Option<EstimatorCfg>,
    fields: Vec<TrackedField>,
    _c: PhantomData<C>,
    _r: PhantomData<R>,
}

impl Default for SessionBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            capture: None,
            recognizer: None,
            clock: None,
            session: None,
            estimator: None,
            fields: Vec::new(),
            _c: PhantomData,
            _r: PhantomData,
        }
    }
}

fn validate(session: &SessionCfg, estimator: &EstimatorCfg, fields: &[TrackedField]) -> Result<()> {
    if fields.is_empty() {
        return Err(eyre::Report::new(BuildError::NoFields));
    }
    for (i, f) in fields.iter().enumerate() {
        if fields[..i].iter().any(|other| other.name == f.name) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(format!(
                "duplicate field name '{}'",
                f.name
            ))));
        }
    }
    if session.interval.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "interval must be > 0".into(),
        )));
    }
    if session.collaborator_timeout.is_zero() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "collaborator timeout must be > 0".into(),
        )));
    }
    if session.failure_threshold == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "failure_threshold must be >= 1".into(),
        )));
    }
    if estimator.min_samples < 2 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "min_samples must be >= 2".into(),
        )));
    }
    Ok(())
}

impl<C, R> SessionBuilder<C, R> {
    /// Fallible build available in any type-state; reports missing pieces.
    pub fn try_build(self) -> Result<SessionController> {
        let capture = self
            .capture
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCapture))?;
        let recognizer = self
            .recognizer
            .ok_or_else(|| eyre::Report::new(BuildError::MissingRecognizer))?;
        let session = self.session.unwrap_or_default();
        let estimator = self.estimator.unwrap_or_default();
        validate(&session, &estimator, &self.fields)?;

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        SessionController::new(capture, recognizer, clock, session, estimator, self.fields)
    }
}

/// Chainable setters that do not affect type-state.
impl<C, R> SessionBuilder<C, R> {
    pub fn with_session(mut self, session: SessionCfg) -> Self {
        self.session = Some(session);
        self
    }
    pub fn with_estimator(mut self, estimator: EstimatorCfg) -> Self {
        self.estimator = Some(estimator);
        self
    }
    pub fn with_field(mut self, field: TrackedField) -> Self {
        self.fields.push(field);
        self
    }
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = TrackedField>) -> Self {
        self.fields.extend(fields);
        self
    }
    pub fn with_interval(mut self, interval: Duration) -> Self {
        let mut s = self.session.unwrap_or_default();
        s.interval = interval;
        self.session = Some(s);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
}

// Setters that advance type-state
impl<R> SessionBuilder<Missing, R> {
    pub fn with_capture(self, capture: impl Capture + Send + 'static) -> SessionBuilder<Set, R> {
        SessionBuilder {
            capture: Some(Box::new(capture)),
            recognizer: self.recognizer,
            clock: self.clock,
            session: self.session,
            estimator: self.estimator,
            fields: self.fields,
            _c: PhantomData,
            _r: PhantomData,
        }
    }
}

impl<C> SessionBuilder<C, Missing> {
    pub fn with_recognizer(
        self,
        recognizer: impl Recognizer + Send + 'static,
    ) -> SessionBuilder<C, Set> {
        SessionBuilder {
            capture: self.capture,
            recognizer: Some(Box::new(recognizer)),
            clock: self.clock,
            session: self.session,
            estimator: self.estimator,
            fields: self.fields,
            _c: PhantomData,
            _r: PhantomData,
        }
    }
}

impl SessionBuilder<Set, Set> {
    /// Infallible only with respect to collaborators; configuration is
    /// still validated.
    pub fn build(self) -> Result<SessionController> {
        self.try_build()
    }
}
