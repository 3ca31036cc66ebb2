// Copyright 2026 ymopm Contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.
//
// See http://creativecommons.org/licenses/MIT/ for more information.

//! FM operator: phase accumulator, envelope and volume computation
//!
//! Operators are owned by the engine in one flat array. Channels refer to
//! them by index and every method receives the register family explicitly,
//! so an operator never holds a reference back into the engine.

use super::cache::{OpDataCache, PhaseStep};
use super::constants::{bit, EG_MAX, EG_QUIET, PHASE_MASK};
use super::env::EnvelopeState;
use super::exp2::Exp2;
use super::registers::Registers;
use super::sin::SIGN_BIT;
use crate::state::SavedState;

/// Source of a key-on; each source owns one bit of the live key state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOnType {
    /// Key-on register write
    Normal = 0,
    /// Rhythm key-on register write
    Rhythm = 1,
    /// Timer A overflow in CSM mode
    Csm = 2,
}

/// Runtime state of a single FM operator
#[derive(Clone, Debug)]
pub struct Operator {
    pub(super) choffs: u32,
    pub(super) opoffs: u32,
    /// 10.10 phase accumulator
    pub(super) phase: u32,
    pub(super) env_attenuation: u16,
    pub(super) env_state: EnvelopeState,
    pub(super) ssg_inverted: bool,
    pub(super) key_state: u8,
    pub(super) keyon_live: u8,
    pub(super) cache: OpDataCache,
}

impl Operator {
    /// Create an operator at register offset `opoffs`, not yet attached to
    /// a channel
    pub fn new(opoffs: u32) -> Self {
        Self {
            choffs: 0,
            opoffs,
            phase: 0,
            env_attenuation: EG_MAX,
            env_state: EnvelopeState::Release,
            ssg_inverted: false,
            key_state: 0,
            keyon_live: 0,
            cache: OpDataCache::default(),
        }
    }

    /// Return to power-on state: silent, released, keyed off
    pub fn reset(&mut self) {
        self.phase = 0;
        self.env_attenuation = EG_MAX;
        self.env_state = EnvelopeState::Release;
        self.ssg_inverted = false;
        self.key_state = 0;
        self.keyon_live = 0;
    }

    /// Save or restore the mutable state (the cache is rebuilt instead)
    pub fn save_restore(&mut self, state: &mut SavedState) {
        state.save_restore(&mut self.phase);
        state.save_restore(&mut self.env_attenuation);

        let mut env_state = self.env_state as u8;
        state.save_restore(&mut env_state);
        match EnvelopeState::from_index(env_state) {
            Some(decoded) => self.env_state = decoded,
            None => state.mark_corrupt("invalid envelope state"),
        }
        if self.env_attenuation > EG_MAX {
            state.mark_corrupt("envelope attenuation out of range");
        }

        state.save_restore(&mut self.ssg_inverted);
        state.save_restore(&mut self.key_state);
        state.save_restore(&mut self.keyon_live);
    }

    /// Attach to the channel at register offset `choffs`
    pub fn set_choffs(&mut self, choffs: u32) {
        self.choffs = choffs;
    }

    /// Refresh the data cache and process pending key edges. Returns
    /// false once the operator has gone quiet after its final stage.
    pub fn prepare<R: Registers>(&mut self, regs: &R) -> bool {
        regs.cache_operator_data(self.choffs, self.opoffs, &mut self.cache);

        self.clock_keystate(regs, u8::from(self.keyon_live != 0));
        // CSM key-on lasts a single prepare
        self.keyon_live &= !(1 << KeyOnType::Csm as u8);

        let final_state = if R::EG_HAS_REVERB {
            EnvelopeState::Reverb
        } else {
            EnvelopeState::Release
        };
        self.env_state != final_state || self.env_attenuation < EG_QUIET
    }

    /// Advance one sample: SSG-EG, envelope (every fourth sub-tick of
    /// `env_counter`, a x.2 value) and phase
    pub fn clock<R: Registers>(&mut self, regs: &R, env_counter: u32, lfo_raw_pm: i32) {
        if regs.op_ssg_eg_enable(self.opoffs) {
            self.clock_ssg_eg_state(regs);
        } else {
            self.ssg_inverted = false;
        }

        if env_counter & 3 == 0 {
            self.clock_envelope(regs, env_counter >> 2);
        }

        self.clock_phase(regs, lfo_raw_pm);
    }

    fn clock_phase<R: Registers>(&mut self, regs: &R, lfo_raw_pm: i32) {
        let step = match self.cache.phase_step {
            PhaseStep::Fixed(step) => step,
            PhaseStep::Dynamic => {
                regs.compute_phase_step(self.choffs, self.opoffs, &self.cache, lfo_raw_pm)
            }
        };
        self.phase = self.phase.wrapping_add(step) & PHASE_MASK;
    }

    /// Integer part of the phase (10 bits)
    #[inline]
    pub fn phase(&self) -> u32 {
        self.phase >> 10
    }

    /// Raw envelope attenuation (0 loudest, 0x3ff silent)
    #[inline]
    pub fn env_attenuation(&self) -> u16 {
        self.env_attenuation
    }

    /// Current envelope stage
    #[inline]
    pub fn env_state(&self) -> EnvelopeState {
        self.env_state
    }

    /// SSG-EG inversion latch
    #[inline]
    pub fn ssg_inverted(&self) -> bool {
        self.ssg_inverted
    }

    /// Raw 20-bit phase accumulator
    #[inline]
    pub fn raw_phase(&self) -> u32 {
        self.phase
    }

    /// Register offset of the owning channel
    #[inline]
    pub fn choffs(&self) -> u32 {
        self.choffs
    }

    /// Register offset of this operator
    #[inline]
    pub fn opoffs(&self) -> u32 {
        self.opoffs
    }

    /// Record a key on/off for one key source; the edge is acted on at the
    /// next prepare
    pub fn keyonoff(&mut self, on: bool, kind: KeyOnType) {
        let mask = 1u8 << kind as u8;
        self.keyon_live = (self.keyon_live & !mask) | if on { mask } else { 0 };
    }

    /// Effective 10-bit attenuation: envelope (SSG-inverted if needed)
    /// plus AM and total level
    pub fn envelope_attenuation<R: Registers>(&self, regs: &R, am_offset: u32) -> u32 {
        let mut result = u32::from(self.env_attenuation >> self.cache.eg_shift);

        if R::EG_HAS_SSG && self.ssg_inverted {
            result = 0x200u32.wrapping_sub(result) & u32::from(EG_MAX);
        }

        if regs.op_lfo_am_enable(self.opoffs) {
            result += am_offset;
        }

        result += self.cache.total_level;
        result.min(u32::from(EG_MAX))
    }

    /// Signed 14-bit output for a 10-bit `phase` (already including any
    /// modulation)
    pub fn compute_volume<R: Registers>(&self, regs: &R, phase: u32, am_offset: u32) -> i32 {
        if self.env_attenuation > EG_QUIET {
            return 0;
        }

        let sin_attenuation = self.cache.waveform[(phase as usize) & (self.cache.waveform.len() - 1)];
        let env_attenuation = self.envelope_attenuation(regs, am_offset) << 2;
        let result = Exp2::lookup(u32::from(sin_attenuation & !SIGN_BIT) + env_attenuation);

        if sin_attenuation & SIGN_BIT != 0 {
            -result
        } else {
            result
        }
    }

    /// Signed noise output: the envelope level with the sign taken from
    /// the family's noise bit
    pub fn compute_noise_volume<R: Registers>(&self, regs: &R, am_offset: u32) -> i32 {
        let result = ((self.envelope_attenuation(regs, am_offset) ^ u32::from(EG_MAX)) << 1) as i32;
        if bit(regs.noise_state(), 0) {
            -result
        } else {
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fm::testing::TestRegisters;

    fn keyed_operator(regs: &TestRegisters) -> Operator {
        let mut op = Operator::new(0);
        op.keyonoff(true, KeyOnType::Normal);
        op.prepare(regs);
        op
    }

    #[test]
    fn test_reset_state() {
        let op = Operator::new(3);
        assert_eq!(op.env_attenuation(), EG_MAX);
        assert_eq!(op.env_state(), EnvelopeState::Release);
        assert_eq!(op.opoffs(), 3);
    }

    #[test]
    fn test_keyon_sources_combine() {
        let mut op = Operator::new(0);
        op.keyonoff(true, KeyOnType::Normal);
        op.keyonoff(true, KeyOnType::Rhythm);
        op.keyonoff(false, KeyOnType::Normal);
        assert_eq!(op.keyon_live, 0b010);
    }

    #[test]
    fn test_max_attack_rate_snaps_to_zero() {
        let mut regs = TestRegisters::new();
        regs.set_attack_rate(0, 15);
        // skip depress by starting at half scale
        let mut op = Operator::new(0);
        op.env_attenuation = 0x200;
        op.keyonoff(true, KeyOnType::Normal);
        op.prepare(&regs);
        assert_eq!(op.env_state(), EnvelopeState::Attack);
        assert_eq!(op.env_attenuation(), 0);
    }

    #[test]
    fn test_depress_precedes_attack() {
        let mut regs = TestRegisters::new();
        regs.set_attack_rate(0, 15);
        let mut op = Operator::new(0);
        op.env_attenuation = 0x100;
        op.keyonoff(true, KeyOnType::Normal);
        op.prepare(&regs);
        assert_eq!(op.env_state(), EnvelopeState::Depress);

        for counter in 0..4096u32 {
            op.clock(&regs, counter * 4, 0);
            if op.env_state() != EnvelopeState::Depress {
                break;
            }
        }
        assert_eq!(op.env_state(), EnvelopeState::Attack);
        assert_eq!(op.env_attenuation(), 0);
    }

    #[test]
    fn test_release_enters_reverb() {
        let mut regs = TestRegisters::new();
        regs.set_attack_rate(0, 15);
        regs.set_release_rate(0, 15);
        let mut op = Operator::new(0);
        op.env_attenuation = 0x200;
        op.keyonoff(true, KeyOnType::Normal);
        op.prepare(&regs);
        op.keyonoff(false, KeyOnType::Normal);
        op.prepare(&regs);
        assert_eq!(op.env_state(), EnvelopeState::Release);

        let mut counter = 0u32;
        while op.env_state() == EnvelopeState::Release && counter < 100_000 {
            op.clock(&regs, counter, 0);
            counter += 4;
        }
        assert_eq!(op.env_state(), EnvelopeState::Reverb);
        assert!(op.env_attenuation() >= 0xc0);
    }

    #[test]
    fn test_ssg_release_reflects_inversion() {
        let regs = TestRegisters::new();
        let mut op = keyed_operator(&regs);
        op.env_state = EnvelopeState::Sustain;
        op.env_attenuation = 0x80;
        op.ssg_inverted = true;
        op.start_release();
        assert_eq!(op.env_attenuation(), 0x180);
        assert!(!op.ssg_inverted());
    }

    #[test]
    fn test_ssg_hold_mode_latches() {
        let mut regs = TestRegisters::new();
        // mode 3: hold high
        regs.set_ssg(0, true, 3);
        let mut op = Operator::new(0);
        op.env_state = EnvelopeState::Decay;
        op.env_attenuation = 0x240;
        op.clock_ssg_eg_state(&regs);
        assert!(op.ssg_inverted());
        assert_eq!(op.env_attenuation(), 0x200);
    }

    #[test]
    fn test_ssg_continuous_mode_restarts_attack() {
        let mut regs = TestRegisters::new();
        regs.set_ssg(0, true, 0);
        let mut op = Operator::new(0);
        op.env_state = EnvelopeState::Sustain;
        op.env_attenuation = 0x300;
        op.phase = 0x1234;
        op.clock_ssg_eg_state(&regs);
        assert_eq!(op.env_state(), EnvelopeState::Attack);
        assert_eq!(op.raw_phase(), 0);
        assert!(!op.ssg_inverted());
    }

    #[test]
    fn test_quiet_volume_is_zero() {
        let regs = TestRegisters::new();
        let op = Operator::new(0);
        assert_eq!(op.compute_volume(&regs, 0x100, 0), 0);
    }

    #[test]
    fn test_volume_sign_follows_phase() {
        let mut regs = TestRegisters::new();
        regs.set_attack_rate(0, 15);
        let mut op = Operator::new(0);
        op.env_attenuation = 0x200;
        op.keyonoff(true, KeyOnType::Normal);
        op.prepare(&regs);
        let positive = op.compute_volume(&regs, 0x100, 0);
        let negative = op.compute_volume(&regs, 0x300, 0);
        assert_eq!(positive, 0x1fe8);
        assert_eq!(negative, -0x1fe8);
    }

    #[test]
    fn test_phase_wraps_at_20_bits() {
        let mut regs = TestRegisters::new();
        regs.set_frequency(0, 7, 0x3ff);
        regs.set_multiple(0, 15);
        let mut op = Operator::new(0);
        op.prepare(&regs);
        for counter in 0..10_000u32 {
            op.clock(&regs, counter, 0);
            assert!(op.raw_phase() <= PHASE_MASK);
            assert!(op.env_attenuation() <= EG_MAX);
        }
    }
}
