//! Validation against real silicon.
//!
//! The chip is reached through a [`PitBus`]; this module only defines that
//! boundary. Everything else runs the model next to recorded or live
//! observations and reports where they part ways.

pub mod bus;
pub mod event;
pub mod compare;
pub mod lockstep;
pub mod trace;

pub use bus::PitBus;
pub use event::Event;
pub use compare::{Checker, Divergence, Observation, Tally, Verdict};
pub use lockstep::Lockstep;
pub use trace::{load_trace, record, replay, save_trace, Trace, TraceError, TraceStep};
