//! Trace files.
//!
//! A trace is a JSON document naming the silicon variant and listing events,
//! each optionally annotated with what was observed on the real chip:
//!
//! ```json
//! {
//!   "variant": "8254",
//!   "description": "mode 2 period",
//!   "steps": [
//!     { "event": { "op": "command", "byte": 52 } },
//!     { "event": { "op": "read", "channel": 0 }, "observed": { "byte": 16 } }
//!   ]
//! }
//! ```

use crate::harness::compare::{Checker, Divergence, Observation, Tally};
use crate::harness::event::Event;
use crate::pit::{PitType, CHANNEL_COUNT};
use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// One event and what the chip did after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub event: Event,
    #[serde(default, skip_serializing_if = "Observation::is_empty")]
    pub observed: Observation,
}

/// A recorded session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub variant: PitType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub steps: Vec<TraceStep>,
}

impl Trace {
    /// A trace of bare events with nothing observed.
    pub fn from_events(variant: PitType, events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            variant,
            description: String::new(),
            steps: events
                .into_iter()
                .map(|event| TraceStep { event, observed: Observation::default() })
                .collect(),
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> + '_ {
        self.steps.iter().map(|s| &s.event)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Reject traces the model can't run.
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.steps.is_empty() {
            return Err(TraceError::Empty);
        }
        for (step, s) in self.steps.iter().enumerate() {
            if let Some(channel) = s.event.channel().filter(|&c| c >= CHANNEL_COUNT) {
                return Err(TraceError::BadChannel { step, channel });
            }
        }
        Ok(())
    }
}

/// Errors that can occur while loading or saving a trace.
#[derive(Debug, Clone, Error)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("trace has no steps")]
    Empty,

    #[error("step {step}: no channel {channel}")]
    BadChannel { step: usize, channel: usize },
}

/// Load and validate a trace from disk.
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Trace, TraceError> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| TraceError::Io(e.to_string()))?;
    let trace: Trace = serde_json::from_str(&text).map_err(|e| TraceError::Parse(e.to_string()))?;
    trace.validate()?;
    debug!(
        path = %path.as_ref().display(),
        steps = trace.len(),
        variant = %trace.variant,
        "trace loaded"
    );
    Ok(trace)
}

/// Save a trace as pretty-printed JSON.
pub fn save_trace<P: AsRef<Path>>(trace: &Trace, path: P) -> Result<(), TraceError> {
    let text = serde_json::to_string_pretty(trace).map_err(|e| TraceError::Parse(e.to_string()))?;
    std::fs::write(path.as_ref(), text).map_err(|e| TraceError::Io(e.to_string()))?;
    Ok(())
}

/// Check every recorded observation against the model.
///
/// `variant` overrides the one stored in the trace.
pub fn replay(trace: &Trace, variant: Option<PitType>) -> Result<Tally, Divergence> {
    let variant = variant.unwrap_or(trace.variant);
    let mut checker = Checker::new(variant);
    for step in &trace.steps {
        checker.check(&step.event, &step.observed)?;
    }
    let tally = checker.tally();
    info!(
        %variant,
        matched = tally.matched,
        inconclusive = tally.inconclusive,
        "replay finished"
    );
    Ok(tally)
}

/// Run events through the model only, recording its reads and outputs.
pub fn record(variant: PitType, events: impl IntoIterator<Item = Event>) -> Trace {
    let mut checker = Checker::new(variant);
    let steps = events
        .into_iter()
        .map(|event| {
            let observed = checker.advance(&event);
            TraceStep { event, observed }
        })
        .collect();
    Trace { variant, description: String::new(), steps }
}
