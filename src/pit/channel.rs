//! One counter of the timer.
//!
//! A channel is a down-counter with a reload register, a latch, a gate input
//! and an output pin. Everything it does happens in response to one of five
//! inputs: a mode write, a data write, a data read, a gate edge or a clock
//! tick. Each input runs to completion before the next one is accepted.
//!
//! The state machine is modelled on observed silicon, quirks included:
//!
//! - Square-Wave-Generator handles odd reload values differently on the 8253
//!   and the 8254.
//! - The one-shot modes load a small garbage value into the counting element
//!   on the first tick after the initial write. [`Channel::is_count_undefined`]
//!   reports that window so comparisons can skip it.

use crate::pit::count;
use crate::pit::mode::{status_byte, AccessMode, GateFall, PitType, TimerMode};
use serde::{Serialize, Deserialize};
use std::fmt;
use tracing::{debug, trace};

/// Value observed in the counting element on the first tick after an initial
/// load in the gate-triggered modes.
pub const UNDEFINED_COUNT: u16 = 0x0003;

/// Where the counting state machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountingState {
    /// Mode set, no reload value written yet.
    WaitingForReload,
    /// Stopped by a falling gate edge.
    WaitingForGate,
    /// The next tick loads the counting element.
    WaitingForLoadCycle,
    /// Loaded, but counting starts on a rising gate edge.
    WaitingForLoadTrigger,
    /// Counting after a software load or terminal-count reload.
    Counting,
    /// Counting after a gate-triggered reload.
    CountingTriggered,
}

/// Progress of a reload value write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    AwaitingLsb,
    AwaitingMsb,
    Loaded,
}

/// Whether the next completed write is the first since the mode was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadPhase {
    Initial,
    Subsequent,
}

/// Where the next data read comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadState {
    /// Straight from the counting element.
    Live,
    /// LSB of the counting element was read; MSB comes next.
    LiveMsbPending,
    /// From the count latch.
    Latched,
    /// LSB of the latch was read; MSB comes next.
    LatchedMsbPending,
}

/// A single timer channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    index: usize,
    pit_type: PitType,
    mode: TimerMode,
    access_mode: AccessMode,
    bcd: bool,

    state: CountingState,
    cycles_in_state: u32,
    load_state: LoadState,
    load_phase: LoadPhase,
    read_state: ReadState,

    count_register: u16,
    counting_element: u16,
    load_mask: u16,
    count_latch: u16,
    status_latch: Option<u8>,
    null_count: bool,
    ce_undefined: bool,

    output: bool,
    gate: bool,
    armed: bool,
    /// The pending reload was caused by a rising gate edge.
    trigger_pending: bool,
    /// The pending reload toggles the output instead of using the mode's level.
    toggle_on_reload: bool,
    /// The value in the counting element came from an odd reload value.
    reload_odd: bool,
}

impl Channel {
    /// Create a channel in its power-on state.
    pub fn new(index: usize, pit_type: PitType) -> Self {
        Self {
            index,
            pit_type,
            mode: TimerMode::InterruptOnTerminalCount,
            access_mode: AccessMode::Lsb,
            bcd: false,
            state: CountingState::WaitingForReload,
            cycles_in_state: 0,
            load_state: LoadState::AwaitingLsb,
            load_phase: LoadPhase::Initial,
            read_state: ReadState::Live,
            count_register: 0,
            counting_element: 0,
            load_mask: 0xFFFF,
            count_latch: 0,
            status_latch: None,
            null_count: false,
            ce_undefined: false,
            output: false,
            gate: false,
            armed: false,
            trigger_pending: false,
            toggle_on_reload: false,
            reload_odd: false,
        }
    }

    /// Return to the power-on state.
    ///
    /// The gate is an input pin, so its level survives a reset.
    pub fn reset(&mut self) {
        let gate = self.gate;
        *self = Self::new(self.index, self.pit_type);
        self.gate = gate;
    }

    // ==================== Inspection ====================

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pit_type(&self) -> PitType {
        self.pit_type
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access_mode
    }

    pub fn is_bcd(&self) -> bool {
        self.bcd
    }

    pub fn state(&self) -> CountingState {
        self.state
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn read_state(&self) -> ReadState {
        self.read_state
    }

    pub fn count_register(&self) -> u16 {
        self.count_register
    }

    pub fn counting_element(&self) -> u16 {
        self.counting_element
    }

    pub fn load_mask(&self) -> u16 {
        self.load_mask
    }

    /// The latched value, if a latch is waiting to be read.
    pub fn count_latch(&self) -> Option<u16> {
        self.is_latched().then_some(self.count_latch)
    }

    pub fn is_latched(&self) -> bool {
        matches!(self.read_state, ReadState::Latched | ReadState::LatchedMsbPending)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn gate(&self) -> bool {
        self.gate
    }

    /// Current level of the output pin.
    pub fn output(&self) -> bool {
        self.output
    }

    /// The counting element holds a placeholder with no defined value.
    ///
    /// While this is true, reads and the output level may legitimately
    /// differ from real silicon.
    pub fn is_count_undefined(&self) -> bool {
        self.ce_undefined
    }

    /// The status byte as the read-back command would latch it now.
    pub fn status(&self) -> u8 {
        status_byte(self.output, self.null_count, self.access_mode, self.mode, self.bcd)
    }

    // ==================== Control ====================

    /// Program the channel.
    ///
    /// Accepts every combination, sensible or not. Counting stops until a
    /// reload value is written.
    pub fn set_mode(&mut self, access_mode: AccessMode, mode: TimerMode, bcd: bool) {
        self.access_mode = access_mode;
        self.mode = mode;
        self.bcd = bcd;

        self.counting_element = 0;
        self.count_latch = 0;
        self.read_state = ReadState::Live;
        self.status_latch = None;
        self.null_count = true;

        self.armed = false;
        self.ce_undefined = false;
        self.trigger_pending = false;
        self.toggle_on_reload = false;
        self.reload_odd = false;

        // Only even values reach the counting element in square-wave mode on the 8254.
        self.load_mask = match (mode, self.pit_type) {
            (TimerMode::SquareWaveGenerator, PitType::Model8254) => 0xFFFE,
            _ => 0xFFFF,
        };

        self.output = mode.initial_output();

        self.change_state(CountingState::WaitingForReload);
        self.load_state = LoadState::AwaitingLsb;
        self.load_phase = LoadPhase::Initial;

        debug!(
            channel = self.index,
            ?access_mode,
            ?mode,
            bcd,
            "mode set"
        );
    }

    /// Write one byte of the reload value.
    pub fn send_reload_byte(&mut self, byte: u8) {
        match self.access_mode {
            AccessMode::Latch => {
                trace!(channel = self.index, byte, "data write ignored: no access mode");
            }
            AccessMode::Lsb => {
                self.count_register = byte as u16;
                self.complete_load();
            }
            AccessMode::Msb => {
                self.count_register = (byte as u16) << 8;
                self.complete_load();
            }
            AccessMode::LsbMsb => match self.load_state {
                LoadState::AwaitingLsb | LoadState::Loaded => {
                    self.count_register = byte as u16;

                    // Starting a two-byte write stops mode 0 and drops its output.
                    if self.mode == TimerMode::InterruptOnTerminalCount {
                        self.output = false;
                        self.change_state(CountingState::WaitingForReload);
                    }

                    self.load_state = LoadState::AwaitingMsb;
                }
                LoadState::AwaitingMsb => {
                    self.count_register = (self.count_register & 0x00FF) | ((byte as u16) << 8);
                    self.complete_load();
                }
            },
        }
    }

    /// Write a whole reload value using the configured access mode.
    pub fn write_count(&mut self, value: u16) {
        match self.access_mode {
            AccessMode::Latch => {}
            AccessMode::Lsb => self.send_reload_byte(value as u8),
            AccessMode::Msb => self.send_reload_byte((value >> 8) as u8),
            AccessMode::LsbMsb => {
                self.send_reload_byte(value as u8);
                self.send_reload_byte((value >> 8) as u8);
            }
        }
    }

    /// Drive the gate input.
    ///
    /// Only edges have side effects, and only once a reload value exists.
    pub fn set_gate(&mut self, level: bool) {
        let previous = std::mem::replace(&mut self.gate, level);
        if previous == level || self.state == CountingState::WaitingForReload {
            return;
        }

        trace!(channel = self.index, level, state = ?self.state, "gate edge");

        if level {
            if self.mode.gate_rising_reloads() {
                // A retrigger restarts the period, so it takes the mode's level.
                self.toggle_on_reload = false;
                self.trigger_pending = true;
                self.change_state(CountingState::WaitingForLoadCycle);
            }
        } else {
            match self.mode.gate_fall() {
                GateFall::Ignore => {}
                GateFall::Stop => self.change_state(CountingState::WaitingForGate),
                GateFall::StopForceHigh => {
                    self.change_state(CountingState::WaitingForGate);
                    self.output = true;
                }
            }
        }
    }

    /// Snapshot the counting element. A pending latch is never overwritten.
    pub fn latch(&mut self) {
        self.read_state = match self.read_state {
            ReadState::Latched | ReadState::LatchedMsbPending => return,
            ReadState::Live => ReadState::Latched,
            ReadState::LiveMsbPending => ReadState::LatchedMsbPending,
        };
        self.count_latch = self.counting_element;
    }

    /// Snapshot the status byte. A pending status latch is never overwritten.
    pub fn latch_status(&mut self) {
        if self.status_latch.is_none() {
            self.status_latch = Some(self.status());
        }
    }

    /// Read one byte from the data port.
    pub fn read_byte(&mut self) -> u8 {
        if let Some(status) = self.status_latch.take() {
            return status;
        }

        let lsb = |v: u16| (v & 0xFF) as u8;
        let msb = |v: u16| (v >> 8) as u8;

        match self.read_state {
            ReadState::Live => match self.access_mode {
                AccessMode::Lsb => lsb(self.counting_element),
                AccessMode::Msb => msb(self.counting_element),
                AccessMode::LsbMsb => {
                    self.read_state = ReadState::LiveMsbPending;
                    lsb(self.counting_element)
                }
                AccessMode::Latch => 0,
            },
            ReadState::LiveMsbPending => {
                self.read_state = ReadState::Live;
                msb(self.counting_element)
            }
            ReadState::Latched => match self.access_mode {
                AccessMode::Lsb => {
                    self.read_state = ReadState::Live;
                    lsb(self.count_latch)
                }
                AccessMode::Msb => {
                    self.read_state = ReadState::Live;
                    msb(self.count_latch)
                }
                AccessMode::LsbMsb => {
                    self.read_state = ReadState::LatchedMsbPending;
                    lsb(self.count_latch)
                }
                AccessMode::Latch => {
                    self.read_state = ReadState::Live;
                    0
                }
            },
            ReadState::LatchedMsbPending => {
                self.read_state = ReadState::Live;
                msb(self.count_latch)
            }
        }
    }

    /// Read a whole count using the configured access mode.
    pub fn read_count(&mut self) -> u16 {
        match self.access_mode {
            AccessMode::Lsb => self.read_byte() as u16,
            AccessMode::Msb => (self.read_byte() as u16) << 8,
            AccessMode::LsbMsb => {
                let lo = self.read_byte() as u16;
                lo | ((self.read_byte() as u16) << 8)
            }
            AccessMode::Latch => 0,
        }
    }

    // ==================== Clock ====================

    /// Advance one clock pulse.
    pub fn tick(&mut self) {
        if self.state == CountingState::WaitingForLoadCycle {
            // Loading takes the whole cycle.
            self.reload();
            return;
        }

        if self.state == CountingState::WaitingForLoadTrigger
            && self.cycles_in_state == 0
            && self.armed
        {
            self.counting_element = UNDEFINED_COUNT;
            self.ce_undefined = true;
            self.cycles_in_state += 1;
            trace!(channel = self.index, "placeholder loaded before trigger");
            return;
        }

        let active = matches!(
            self.state,
            CountingState::Counting
                | CountingState::CountingTriggered
                | CountingState::WaitingForLoadTrigger
        );
        if active && (self.gate || !self.mode.is_gated()) {
            self.count_step();
        }

        self.cycles_in_state = self.cycles_in_state.saturating_add(1);
    }

    /// Per-mode decrement and output rule for one active tick.
    fn count_step(&mut self) {
        match self.mode {
            TimerMode::InterruptOnTerminalCount => {
                self.count(1);
                if self.counting_element == 0 {
                    self.output = true;
                }
            }
            TimerMode::HardwareRetriggerableOneShot => {
                self.count(1);
                if self.counting_element == 0 && self.armed {
                    self.output = true;
                }
            }
            TimerMode::RateGenerator => {
                self.count(1);
                // Low for the one cycle at count 1, then reload with output high.
                if self.counting_element == 1 {
                    self.output = false;
                    self.change_state(CountingState::WaitingForLoadCycle);
                }
            }
            TimerMode::SquareWaveGenerator => self.square_wave_step(),
            TimerMode::SoftwareTriggeredStrobe | TimerMode::HardwareTriggeredStrobe => {
                self.count(1);
                self.output = self.counting_element != 0;
            }
        }
    }

    fn square_wave_step(&mut self) {
        // Parity of the value being counted, not of a newer write.
        if !self.reload_odd {
            self.count(2);
            if self.counting_element == 0 {
                self.output = !self.output;
                self.reload_in_place();
            }
            return;
        }

        match self.pit_type {
            PitType::Model8254 => {
                self.count(2);
                if self.counting_element == 0 {
                    if self.output {
                        // High half of an odd period is one cycle longer.
                        self.toggle_on_reload = true;
                        self.change_state(CountingState::WaitingForLoadCycle);
                    } else {
                        self.output = true;
                        self.reload_in_place();
                    }
                }
            }
            PitType::Model8253 => {
                // Odd values reach the counting element. The first step of each
                // half period restores even parity: by 1 while high, by 3 while low.
                let odd = self.counting_element & 1 != 0;
                let steps = match (odd, self.output) {
                    (true, true) => 1,
                    (true, false) => 3,
                    (false, _) => 2,
                };
                self.count(steps);
                if self.counting_element == 0 {
                    self.output = !self.output;
                    self.reload_in_place();
                }
            }
        }
    }

    // ==================== Internals ====================

    fn change_state(&mut self, new_state: CountingState) {
        self.cycles_in_state = 0;
        self.state = new_state;
    }

    fn count(&mut self, steps: u8) {
        self.counting_element = count::count_by(self.counting_element, self.bcd, steps);
    }

    /// Load the counting element on a WaitingForLoadCycle tick.
    ///
    /// A reload between the two bytes of an LSB-then-MSB write ends that
    /// write: the next byte starts a new one as an LSB.
    fn reload(&mut self) {
        self.counting_element = self.count_register & self.load_mask;
        self.reload_odd = self.count_register & 1 != 0;
        self.load_state = LoadState::Loaded;
        self.null_count = false;
        self.ce_undefined = false;

        self.output = if self.toggle_on_reload {
            !self.output
        } else {
            self.mode.output_on_reload()
        };
        self.toggle_on_reload = false;

        let next = if self.trigger_pending {
            CountingState::CountingTriggered
        } else {
            CountingState::Counting
        };
        self.trigger_pending = false;
        self.change_state(next);

        trace!(
            channel = self.index,
            ce = self.counting_element,
            output = self.output,
            "counter reloaded"
        );
    }

    /// Square-wave reload at terminal count, without spending a cycle.
    fn reload_in_place(&mut self) {
        self.counting_element = self.count_register & self.load_mask;
        self.reload_odd = self.count_register & 1 != 0;
        self.null_count = false;
    }

    /// A complete reload value has been written.
    fn complete_load(&mut self) {
        self.null_count = true;

        match self.load_phase {
            LoadPhase::Initial => {
                let next = if self.mode.waits_for_trigger() {
                    CountingState::WaitingForLoadTrigger
                } else {
                    CountingState::WaitingForLoadCycle
                };
                self.change_state(next);
                self.armed = true;
                self.trigger_pending = false;
                self.load_phase = LoadPhase::Subsequent;
            }
            LoadPhase::Subsequent => {
                // Other modes keep counting and pick the value up at the next
                // terminal count or retrigger.
                if self.mode.reloads_on_write() {
                    self.change_state(CountingState::WaitingForLoadCycle);
                }
            }
        }
        self.load_state = LoadState::Loaded;

        debug!(
            channel = self.index,
            count_register = self.count_register,
            state = ?self.state,
            "reload value written"
        );
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ch{} {:?}/{:?}{} {:?} cr={:04X} ce={:04X}",
            self.index,
            self.mode,
            self.access_mode,
            if self.bcd { "/bcd" } else { "" },
            self.state,
            self.count_register,
            self.counting_element,
        )?;
        if let Some(latch) = self.count_latch() {
            write!(f, " latch={:04X}", latch)?;
        }
        write!(
            f,
            " gate={} out={}{}{}",
            self.gate as u8,
            self.output as u8,
            if self.armed { " armed" } else { "" },
            if self.ce_undefined { " undefined" } else { "" },
        )
    }
}
