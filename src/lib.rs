//! # PIT Validate
//!
//! A cycle-accurate model of the Intel 8253/8254 programmable interval timer.
//!
//! The model is meant to be run next to real silicon: every bus transaction
//! is applied to both, and the model's read bytes and output levels are
//! compared with what the chip did. Known quirks of the real parts (odd
//! square-wave reloads, the undefined count before a gate trigger) are
//! modelled rather than smoothed over.

pub mod pit;
pub mod harness;

// Re-export commonly used types
pub use pit::{AccessMode, Channel, CountingState, Pit, PitType, TimerMode};
pub use harness::{Divergence, Event, Lockstep, PitBus, Trace, TraceError};
