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

//! Channel: combines up to four operators into one output value
//!
//! A channel does not own its operators; it stores their indices into the
//! engine's operator array and is handed that array on every call.

use super::algorithms::Algorithm;
use super::constants::{bit, bitfield, EG_QUIET};
use super::operator::{KeyOnType, Operator};
use super::output::OutputFrame;
use super::registers::{OperatorList, Registers};
use crate::config::NoiseAmPolicy;
use crate::state::SavedState;

/// Channel offset of the family noise channel
const NOISE_CHANNEL: u32 = 7;

/// Output scaling shared by every channel in one output pass
#[derive(Clone, Copy, Debug)]
pub struct Mix {
    /// Right shift applied to each operator before summing
    pub rshift: u32,
    /// Symmetric clamp; sums are limited to `-clipmax - 1..=clipmax`
    pub clipmax: i32,
    /// Whether LFO AM reaches the noise output
    pub noise_am: NoiseAmPolicy,
}

impl Mix {
    #[inline]
    fn clamp(&self, value: i32) -> i32 {
        value.clamp(-self.clipmax - 1, self.clipmax)
    }
}

/// Runtime state of one channel
#[derive(Clone, Debug)]
pub struct Channel {
    choffs: u32,
    feedback: [i16; 2],
    feedback_in: i16,
    op: OperatorList,
}

impl Channel {
    /// Create a channel at register offset `choffs` with no operators
    pub fn new(choffs: u32) -> Self {
        Self {
            choffs,
            feedback: [0; 2],
            feedback_in: 0,
            op: [None; 4],
        }
    }

    /// Clear the feedback history
    pub fn reset(&mut self) {
        self.feedback = [0; 2];
        self.feedback_in = 0;
    }

    /// Save or restore the feedback history
    pub fn save_restore(&mut self, state: &mut SavedState) {
        state.save_restore(&mut self.feedback);
        state.save_restore(&mut self.feedback_in);
    }

    /// Register offset of this channel
    #[inline]
    pub fn choffs(&self) -> u32 {
        self.choffs
    }

    /// Last two operator 1 outputs, oldest first
    #[inline]
    pub fn feedback(&self) -> [i16; 2] {
        self.feedback
    }

    /// Operator index in slot `index`, if one is assigned
    #[inline]
    pub fn op(&self, index: usize) -> Option<usize> {
        self.op.get(index).copied().flatten()
    }

    /// Channel has a third operator and mixes as four-operator
    #[inline]
    pub fn is_4op(&self) -> bool {
        self.op[2].is_some()
    }

    /// Place `opnum` (or nothing) in slot `index`
    pub fn assign(&mut self, index: usize, opnum: Option<usize>, operators: &mut [Operator]) {
        self.op[index] = opnum;
        if let Some(opnum) = opnum {
            operators[opnum].set_choffs(self.choffs);
        }
    }

    /// Record key on/off for each slot from the low four bits of `states`
    pub fn keyonoff(&self, operators: &mut [Operator], states: u32, kind: KeyOnType) {
        for (slot, opnum) in self.op.iter().enumerate() {
            if let Some(opnum) = opnum {
                operators[*opnum].keyonoff(bit(states, slot), kind);
            }
        }
    }

    /// Prepare every operator; true while any of them is still audible
    pub fn prepare<R: Registers>(&self, regs: &R, operators: &mut [Operator]) -> bool {
        let mut active = false;
        for opnum in self.op.iter().flatten() {
            active |= operators[*opnum].prepare(regs);
        }
        active
    }

    /// Shift the feedback history, then clock every operator
    pub fn clock<R: Registers>(
        &mut self,
        regs: &R,
        operators: &mut [Operator],
        env_counter: u32,
        lfo_raw_pm: i32,
    ) {
        self.feedback[0] = self.feedback[1];
        self.feedback[1] = self.feedback_in;

        for opnum in self.op.iter().flatten() {
            operators[*opnum].clock(regs, env_counter, lfo_raw_pm);
        }
    }

    fn feedback_modulation<R: Registers>(&self, regs: &R) -> i32 {
        match regs.ch_feedback(self.choffs) {
            0 => 0,
            feedback => {
                (i32::from(self.feedback[0]) + i32::from(self.feedback[1])) >> (10 - feedback.min(10))
            }
        }
    }

    /// Compute operator 1 with feedback and latch its output for the next
    /// clock
    fn output_op1<R: Registers>(&mut self, regs: &R, op1: &Operator, am_offset: u32) -> i32 {
        let opmod = self.feedback_modulation(regs);
        let value = op1.compute_volume(regs, op1.phase().wrapping_add(opmod as u32), am_offset);
        self.feedback_in = value as i16;
        value
    }

    fn add_to_output<R: Registers, const N: usize>(
        &self,
        regs: &R,
        output: &mut OutputFrame<N>,
        value: i32,
    ) {
        let outputs = R::OUTPUTS.min(N);
        for index in 0..outputs {
            if (index == 0 && R::OUTPUTS == 1) || regs.ch_output(self.choffs, index) {
                output.data[index] += value;
            }
        }
    }

    fn operators<'a>(&self, operators: &'a [Operator]) -> Option<[&'a Operator; 2]> {
        match (self.op[0], self.op[1]) {
            (Some(op1), Some(op2)) => Some([&operators[op1], &operators[op2]]),
            _ => None,
        }
    }

    /// Mix a two-operator channel: algorithm bit 0 selects serial (0) or
    /// parallel (1)
    pub fn output_2op<R: Registers, const N: usize>(
        &mut self,
        regs: &R,
        operators: &[Operator],
        output: &mut OutputFrame<N>,
        mix: &Mix,
    ) {
        let Some([op1, op2]) = self.operators(operators) else {
            return;
        };
        let am_offset = regs.lfo_am_offset(self.choffs);
        let op1value = self.output_op1(regs, op1, am_offset);

        if !bit(regs.ch_algorithm(self.choffs), 0) {
            let opmod = op1value >> 1;
            let value = op2.compute_volume(regs, op2.phase().wrapping_add(opmod as u32), am_offset);
            self.add_to_output(regs, output, value >> mix.rshift);
        } else {
            let value = (op1value + op2.compute_volume(regs, op2.phase(), am_offset)) >> mix.rshift;
            self.add_to_output(regs, output, mix.clamp(value));
        }
    }

    /// Mix a four-operator channel according to its algorithm
    pub fn output_4op<R: Registers, const N: usize>(
        &mut self,
        regs: &R,
        operators: &[Operator],
        output: &mut OutputFrame<N>,
        mix: &Mix,
    ) {
        let [Some(o1), Some(o2), Some(o3), Some(o4)] = self.op else {
            return;
        };
        let (op1, op2, op3, op4) = (&operators[o1], &operators[o2], &operators[o3], &operators[o4]);
        let am_offset = regs.lfo_am_offset(self.choffs);

        let mut opout = [0i32; 8];
        opout[1] = self.output_op1(regs, op1, am_offset);

        // feedback is latched; nothing else to do if the rest are silent
        if op2.env_attenuation() > EG_QUIET
            && op3.env_attenuation() > EG_QUIET
            && op4.env_attenuation() > EG_QUIET
        {
            return;
        }

        let algorithm = Algorithm::get(regs.ch_algorithm(self.choffs));

        let opmod = opout[algorithm.op2_input()] >> 1;
        opout[2] = op2.compute_volume(regs, op2.phase().wrapping_add(opmod as u32), am_offset);
        opout[5] = opout[1] + opout[2];

        let opmod = opout[algorithm.op3_input()] >> 1;
        opout[3] = op3.compute_volume(regs, op3.phase().wrapping_add(opmod as u32), am_offset);
        opout[6] = opout[1] + opout[3];
        opout[7] = opout[2] + opout[3];

        let op4value = if regs.noise_enable() && self.choffs == NOISE_CHANNEL {
            let noise_am = match mix.noise_am {
                NoiseAmPolicy::Apply => am_offset,
                NoiseAmPolicy::Ignore => 0,
            };
            op4.compute_noise_volume(regs, noise_am)
        } else {
            let opmod = opout[algorithm.op4_input()] >> 1;
            op4.compute_volume(regs, op4.phase().wrapping_add(opmod as u32), am_offset)
        };

        // operator 4 is a carrier in every algorithm
        let mut result = op4value >> mix.rshift;
        if algorithm.op1_output() {
            result = mix.clamp(result + (opout[1] >> mix.rshift));
        }
        if algorithm.op2_output() {
            result = mix.clamp(result + (opout[2] >> mix.rshift));
        }
        if algorithm.op3_output() {
            result = mix.clamp(result + (opout[3] >> mix.rshift));
        }

        self.add_to_output(regs, output, result);
    }

    /// Rhythm channel 6: bass drum, always operator 1 into operator 2
    /// unless the algorithm bit selects parallel
    pub fn output_rhythm_ch6<R: Registers, const N: usize>(
        &mut self,
        regs: &R,
        operators: &[Operator],
        output: &mut OutputFrame<N>,
        mix: &Mix,
    ) {
        let Some([op1, op2]) = self.operators(operators) else {
            return;
        };
        let am_offset = regs.lfo_am_offset(self.choffs);
        let op1value = self.output_op1(regs, op1, am_offset);

        let opmod = if bit(regs.ch_algorithm(self.choffs), 0) {
            0
        } else {
            op1value >> 1
        };
        let value = op2.compute_volume(regs, op2.phase().wrapping_add(opmod as u32), am_offset);
        self.add_to_output(regs, output, (value >> mix.rshift) * 2);
    }

    /// Rhythm channel 7: hi-hat on operator 1, snare drum on operator 2
    pub fn output_rhythm_ch7<R: Registers, const N: usize>(
        &mut self,
        regs: &R,
        operators: &[Operator],
        phase_select: u32,
        output: &mut OutputFrame<N>,
        mix: &Mix,
    ) {
        let Some([op1, op2]) = self.operators(operators) else {
            return;
        };
        let am_offset = regs.lfo_am_offset(self.choffs);
        let noise_state = bitfield(regs.noise_state(), 0, 1);

        let hh_phase = (phase_select << 9) | (0xd0 >> (2 * (noise_state ^ phase_select)));
        let mut result = op1.compute_volume(regs, hh_phase, am_offset) >> mix.rshift;

        let sd_phase = (0x100 << bitfield(op1.phase(), 8, 1)) ^ (noise_state << 8);
        result += op2.compute_volume(regs, sd_phase, am_offset) >> mix.rshift;

        self.add_to_output(regs, output, mix.clamp(result) * 2);
    }

    /// Rhythm channel 8: tom-tom on operator 1, top cymbal on operator 2
    pub fn output_rhythm_ch8<R: Registers, const N: usize>(
        &mut self,
        regs: &R,
        operators: &[Operator],
        phase_select: u32,
        output: &mut OutputFrame<N>,
        mix: &Mix,
    ) {
        let Some([op1, op2]) = self.operators(operators) else {
            return;
        };
        let am_offset = regs.lfo_am_offset(self.choffs);

        let mut result = op1.compute_volume(regs, op1.phase(), am_offset) >> mix.rshift;

        let tc_phase = 0x100 | (phase_select << 9);
        result += op2.compute_volume(regs, tc_phase, am_offset) >> mix.rshift;

        self.add_to_output(regs, output, mix.clamp(result) * 2);
    }
}
