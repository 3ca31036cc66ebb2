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

//! Envelope generator
//!
//! Envelopes run entirely in the attenuation domain: 0 is full volume and
//! 0x3ff is silence. Attack converges geometrically towards 0, every other
//! stage adds a small linear increment chosen from a table indexed by the
//! 6-bit effective rate and a 3-bit sub-step of the global envelope counter.

use super::constants::{bit, bitfield, EG_MAX, EG_REVERB_THRESHOLD};
use super::operator::Operator;
use super::registers::Registers;

/// Envelope stage; the discriminant doubles as the index into the
/// per-state rate array of the operator cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnvelopeState {
    /// Ramp down to half scale before attack (families with a depress stage)
    Depress = 0,
    /// Ramp towards full volume
    Attack = 1,
    /// Ramp towards the sustain level
    Decay = 2,
    /// Ramp at the second decay rate while the key is held
    Sustain = 3,
    /// Ramp to silence after key-off
    Release = 4,
    /// Slow tail after release (families with a reverb stage)
    Reverb = 5,
}

impl EnvelopeState {
    /// Number of envelope states
    pub const COUNT: usize = 6;

    /// Decode a persisted state index
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Depress),
            1 => Some(Self::Attack),
            2 => Some(Self::Decay),
            3 => Some(Self::Sustain),
            4 => Some(Self::Release),
            5 => Some(Self::Reverb),
            _ => None,
        }
    }
}

// Eight 4-bit increments per rate, one for each sub-step of the counter.
// Rates 0-47 only ever add 0 or 1; 48 and up add larger steps every tick.
const INCREMENT_TABLE: [u32; 64] = [
    0x00000000, 0x00000000, 0x10101010, 0x10101010, // 0-3
    0x10101010, 0x10101010, 0x11101110, 0x11101110, // 4-7
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 8-11
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 12-15
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 16-19
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 20-23
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 24-27
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 28-31
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 32-35
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 36-39
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 40-43
    0x10101010, 0x10111010, 0x11101110, 0x11111110, // 44-47
    0x11111111, 0x21112111, 0x21212121, 0x22212221, // 48-51
    0x22222222, 0x42224222, 0x42424242, 0x44424442, // 52-55
    0x44444444, 0x84448444, 0x84848484, 0x88848884, // 56-59
    0x88888888, 0x88888888, 0x88888888, 0x88888888, // 60-63
];

/// Attenuation increment for a 6-bit rate at sub-step `index` (0-7)
#[inline]
pub fn attenuation_increment(rate: u32, index: u32) -> u32 {
    bitfield(INCREMENT_TABLE[(rate & 63) as usize], 4 * (index & 7) as usize, 4)
}

/// Combine a raw doubled rate with the key-scale adjustment. A raw rate of
/// 0 never advances, regardless of key scaling.
#[inline]
pub fn effective_rate(rawrate: u32, ksr: u32) -> u32 {
    if rawrate == 0 {
        0
    } else {
        (rawrate + ksr).min(63)
    }
}

impl Operator {
    /// Act on a change of the combined key state
    pub(super) fn clock_keystate<R: Registers>(&mut self, regs: &R, keystate: u8) {
        if keystate == self.key_state {
            return;
        }
        self.key_state = keystate;

        if keystate != 0 {
            if R::EG_HAS_DEPRESS && self.env_attenuation < 0x200 {
                self.env_state = EnvelopeState::Depress;
            } else {
                self.start_attack(regs, false);
            }
        } else {
            self.start_release();
        }
    }

    /// Enter the attack stage; `is_restart` marks an SSG-EG loop rather
    /// than a key-on
    pub(super) fn start_attack<R: Registers>(&mut self, regs: &R, is_restart: bool) {
        if self.env_state == EnvelopeState::Attack {
            return;
        }
        self.env_state = EnvelopeState::Attack;

        // inversion is owned by the SSG-EG clock on restarts
        if R::EG_HAS_SSG && !is_restart {
            self.ssg_inverted =
                regs.op_ssg_eg_enable(self.opoffs) && bit(regs.op_ssg_eg_mode(self.opoffs), 2);
        }

        if !is_restart {
            self.phase = 0;
        }

        // rates 62 and 63 jump straight to full volume
        if self.cache.rate(EnvelopeState::Attack) >= 62 {
            self.env_attenuation = 0;
        }
    }

    /// Enter the release stage
    pub(super) fn start_release(&mut self) {
        if self.env_state >= EnvelopeState::Release {
            return;
        }
        self.env_state = EnvelopeState::Release;

        // continue from the inverted level the listener actually heard
        if self.ssg_inverted {
            self.env_attenuation = 0x200u16.wrapping_sub(self.env_attenuation) & EG_MAX;
            self.ssg_inverted = false;
        }
    }

    /// SSG-EG bookkeeping; only does anything once attenuation passes
    /// half scale.
    ///
    /// Mode bits: bit 0 holds at the end instead of repeating, bit 1
    /// alternates direction, bit 2 starts inverted.
    pub(super) fn clock_ssg_eg_state<R: Registers>(&mut self, regs: &R) {
        if !bit(self.env_attenuation, 9) {
            return;
        }

        let mode = regs.op_ssg_eg_mode(self.opoffs);

        if bit(mode, 0) {
            // hold: latch the end state, low for modes 1/7 and high for 3/5
            self.ssg_inverted = bit(mode, 2) ^ bit(mode, 1);
            if self.env_state != EnvelopeState::Attack {
                self.env_attenuation = if self.ssg_inverted { 0x200 } else { EG_MAX };
            }
        } else {
            self.ssg_inverted ^= bit(mode, 1);
            if matches!(self.env_state, EnvelopeState::Decay | EnvelopeState::Sustain) {
                self.start_attack(regs, true);
            }
            if !bit(mode, 1) {
                self.phase = 0;
            }
        }

        if self.env_state == EnvelopeState::Release {
            self.env_attenuation = EG_MAX;
        }
    }

    /// Advance the envelope by one envelope tick; `env_counter` is the
    /// integer part of the engine's envelope counter
    pub(super) fn clock_envelope<R: Registers>(&mut self, regs: &R, env_counter: u32) {
        if self.env_state == EnvelopeState::Attack && self.env_attenuation == 0 {
            self.env_state = EnvelopeState::Decay;
        }

        // checked in the same tick so a zero sustain level skips decay
        if self.env_state == EnvelopeState::Decay && self.env_attenuation >= self.cache.eg_sustain {
            self.env_state = EnvelopeState::Sustain;
        }

        let rate = self.cache.rate(self.env_state);

        // shift the counter into 5.11 fixed point for this rate
        let rate_shift = rate >> 2;
        let env_counter = env_counter.wrapping_shl(rate_shift);
        if bitfield(env_counter, 0, 11) != 0 {
            return;
        }

        let relevant_bits = bitfield(env_counter, rate_shift.max(11) as usize, 3);
        let increment = attenuation_increment(rate, relevant_bits);

        if self.env_state == EnvelopeState::Attack {
            // 62/63 only snap at key-on; changing to them later stalls the attack
            if rate < 62 {
                let step = (!i32::from(self.env_attenuation) * increment as i32) >> 4;
                self.env_attenuation = (i32::from(self.env_attenuation) + step) as u16;
            }
            return;
        }

        if !regs.op_ssg_eg_enable(self.opoffs) {
            self.env_attenuation += increment as u16;
        } else if self.env_attenuation < 0x200 {
            self.env_attenuation += 4 * increment as u16;
        }

        if self.env_attenuation > EG_MAX {
            self.env_attenuation = EG_MAX;
        }

        if R::EG_HAS_DEPRESS
            && self.env_state == EnvelopeState::Depress
            && self.env_attenuation >= 0x200
        {
            self.start_attack(regs, false);
        }

        if R::EG_HAS_REVERB
            && self.env_state == EnvelopeState::Release
            && self.env_attenuation >= EG_REVERB_THRESHOLD
        {
            self.env_state = EnvelopeState::Reverb;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_rate() {
        assert_eq!(effective_rate(0, 31), 0);
        assert_eq!(effective_rate(2, 3), 5);
        assert_eq!(effective_rate(62, 31), 63);
    }

    #[test]
    fn test_increment_table() {
        assert_eq!(attenuation_increment(0, 3), 0);
        assert_eq!(attenuation_increment(2, 0), 0);
        assert_eq!(attenuation_increment(2, 1), 1);
        assert_eq!(attenuation_increment(49, 7), 2);
        assert_eq!(attenuation_increment(63, 5), 8);
    }

    #[test]
    fn test_state_index_roundtrip() {
        for index in 0..EnvelopeState::COUNT as u8 {
            let state = EnvelopeState::from_index(index).unwrap();
            assert_eq!(state as u8, index);
        }
        assert_eq!(EnvelopeState::from_index(6), None);
    }
}
