//! Per-operator data derived from the registers once per prepare pass

use super::constants::WAVEFORM_LENGTH;
use super::env::EnvelopeState;
use super::sin::Sin;

/// Phase increment applied each clock
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseStep {
    /// Precomputed step, valid until the next prepare
    Fixed(u32),
    /// Pitch LFO is active: recompute from the raw PM value every clock
    Dynamic,
}

/// Snapshot of everything an operator needs from the registers.
///
/// Only valid between two prepare passes; any register write marks the
/// channels modified so the engine rebuilds it before the next clock.
#[derive(Clone, Copy, Debug)]
pub struct OpDataCache {
    /// Waveform used to look up the log-sine attenuation
    pub waveform: &'static [u16; WAVEFORM_LENGTH],
    /// Phase step, or [`PhaseStep::Dynamic`]
    pub phase_step: PhaseStep,
    /// Total level scaled to envelope units (plus any key scale level)
    pub total_level: u32,
    /// Raw block/frequency code of the owning channel
    pub block_freq: u32,
    /// Signed detune adjustment for the current key code
    pub detune: i32,
    /// Frequency multiple in half-steps (1 means x0.5)
    pub multiple: u32,
    /// Attenuation at which decay hands over to sustain
    pub eg_sustain: u16,
    /// Effective 6-bit rate per envelope state
    pub eg_rate: [u8; EnvelopeState::COUNT],
    /// Right shift applied to the envelope attenuation
    pub eg_shift: u8,
}

impl Default for OpDataCache {
    fn default() -> Self {
        Self {
            waveform: Sin::waveform(),
            phase_step: PhaseStep::Fixed(0),
            total_level: 0,
            block_freq: 0,
            detune: 0,
            multiple: 0,
            eg_sustain: 0,
            eg_rate: [0; EnvelopeState::COUNT],
            eg_shift: 0,
        }
    }
}

impl OpDataCache {
    /// Rate for the given envelope state
    #[inline]
    pub fn rate(&self, state: EnvelopeState) -> u32 {
        u32::from(self.eg_rate[state as usize])
    }

    /// Store the rate for the given envelope state
    #[inline]
    pub fn set_rate(&mut self, state: EnvelopeState, rate: u32) {
        self.eg_rate[state as usize] = rate.min(63) as u8;
    }
}
