//! Register family abstraction
//!
//! A register family owns the raw register file of one chip type, decodes
//! every field the engine needs, runs the shared LFO/noise generators and
//! knows the chip's phase-step formula. The engine is generic over this
//! trait and is monomorphized per family.

use super::cache::OpDataCache;
use crate::state::SavedState;

/// A key-on register write: the addressed channel and per-operator mask
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyOn {
    /// Channel index, or the family's rhythm pseudo-channel
    pub channel: u32,
    /// One bit per operator slot of the channel
    pub opmask: u32,
}

/// Operator indices for the four slots of a channel
pub type OperatorList = [Option<usize>; 4];

/// Build an [`OperatorList`] for a fully populated 4-operator channel
pub const fn operator_list(o1: usize, o2: usize, o3: usize, o4: usize) -> OperatorList {
    [Some(o1), Some(o2), Some(o3), Some(o4)]
}

/// Capability set every chip family provides to the engine
pub trait Registers: Clone {
    /// Number of output buses (1-4)
    const OUTPUTS: usize;
    /// Number of channels
    const CHANNELS: usize;
    /// Bitmask with one bit per channel
    const ALL_CHANNELS: u32 = (1u32 << Self::CHANNELS) - 1;
    /// Number of operators
    const OPERATORS: usize;
    /// Size of the raw register file
    const REGISTERS: usize;
    /// Register whose writes go through the host's mode-write hook
    const REG_MODE: u16;
    /// Clock prescale used until the host changes it
    const DEFAULT_PRESCALE: u32;
    /// Envelope generator ticks once every this many samples
    const EG_CLOCK_DIVIDER: u32;
    /// Channels keyed on when timer A fires in CSM mode
    const CSM_TRIGGER_MASK: u32;
    /// Pseudo-channel returned by `write` for rhythm key-on writes
    const RHYTHM_CHANNEL: u32 = 0xff;
    /// Operators whose phase bits drive the rhythm phase select
    const RHYTHM_PHASE_OPS: [usize; 2] = [13, 17];
    /// Family has a depress stage before attack
    const EG_HAS_DEPRESS: bool = false;
    /// Family has a reverb stage after release
    const EG_HAS_REVERB: bool = false;
    /// Family supports SSG-EG
    const EG_HAS_SSG: bool = false;
    /// Channel-to-operator mapping depends on register state
    const DYNAMIC_OPS: bool = false;
    /// Status bit set when timer A expires
    const STATUS_TIMERA: u8;
    /// Status bit set when timer B expires
    const STATUS_TIMERB: u8;
    /// Status busy bit
    const STATUS_BUSY: u8;
    /// Status IRQ bit (0 if the family has none)
    const STATUS_IRQ: u8;

    /// Register offset of a channel
    fn channel_offset(chnum: usize) -> u32;
    /// Register offset of an operator
    fn operator_offset(opnum: usize) -> u32;
    /// Operators assigned to a channel
    fn operator_list(&self, chnum: usize) -> OperatorList;

    /// Return the register file and latches to power-on state
    fn reset(&mut self);
    /// Save or restore the register file and latches
    fn save_restore(&mut self, state: &mut SavedState);
    /// Store a register byte; returns the key-on event if the write was one.
    /// Callers guarantee `index < REGISTERS`.
    fn write(&mut self, index: u16, data: u8) -> Option<KeyOn>;
    /// Raw register byte
    fn read(&self, index: u16) -> u8;
    /// Advance noise and LFO by one sample; returns the raw PM value
    fn clock_noise_and_lfo(&mut self) -> i32;
    /// AM attenuation offset for a channel, from the latched LFO value
    fn lfo_am_offset(&self, choffs: u32) -> u32;
    /// Current noise output bit
    fn noise_state(&self) -> u32;
    /// Status bits hidden from status reads
    fn status_mask(&self) -> u8 {
        0
    }
    /// Rebuild an operator's data cache
    fn cache_operator_data(&self, choffs: u32, opoffs: u32, cache: &mut OpDataCache);
    /// Bit-exact phase step for an operator given the raw LFO PM value
    fn compute_phase_step(&self, choffs: u32, opoffs: u32, cache: &OpDataCache, lfo_raw_pm: i32) -> u32;

    /// Mode write requests an IRQ reset
    fn irq_reset(&self) -> bool {
        false
    }
    /// Timer A load bit
    fn load_timer_a(&self) -> bool;
    /// Timer B load bit
    fn load_timer_b(&self) -> bool;
    /// Timer A enable bit
    fn enable_timer_a(&self) -> bool;
    /// Timer B enable bit
    fn enable_timer_b(&self) -> bool;
    /// Timer A status reset bit
    fn reset_timer_a(&self) -> bool;
    /// Timer B status reset bit
    fn reset_timer_b(&self) -> bool;
    /// Timer A period value
    fn timer_a_value(&self) -> u32;
    /// Timer B period value
    fn timer_b_value(&self) -> u32;
    /// CSM mode enabled
    fn csm(&self) -> bool;
    /// Rhythm mode enabled
    fn rhythm_enable(&self) -> bool {
        false
    }
    /// Noise replaces operator 4 of the noise channel
    fn noise_enable(&self) -> bool {
        false
    }

    /// Feedback amount of operator 1 (0 = none)
    fn ch_feedback(&self, choffs: u32) -> u32;
    /// Connection algorithm
    fn ch_algorithm(&self, choffs: u32) -> u32;
    /// Channel feeds output bus `index`
    fn ch_output(&self, choffs: u32, index: usize) -> bool;

    /// SSG-EG enabled for an operator
    fn op_ssg_eg_enable(&self, _opoffs: u32) -> bool {
        false
    }
    /// SSG-EG mode (3 bits)
    fn op_ssg_eg_mode(&self, _opoffs: u32) -> u32 {
        0
    }
    /// LFO AM applies to an operator
    fn op_lfo_am_enable(&self, opoffs: u32) -> bool;
}
