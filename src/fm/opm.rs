//! YM2151 (OPM) register family
//!
//! Register map (256 bytes, 8 channels, 32 operators):
//!
//! | reg       | bits    | field                                     |
//! |-----------|---------|-------------------------------------------|
//! | 01        | 1       | LFO reset (test register)                 |
//! | 08        | 0-2/3-6 | key-on channel / operator mask            |
//! | 0F        | 7, 0-4  | noise enable, noise frequency             |
//! | 10, 11    | 0-7/0-1 | timer A value (10 bits)                   |
//! | 12        | 0-7     | timer B value                             |
//! | 14        | 7       | CSM                                       |
//! |           | 5/4     | reset timer B/A status                    |
//! |           | 3/2     | enable timer B/A                          |
//! |           | 1/0     | load timer B/A                            |
//! | 18        | 0-7     | LFO rate                                  |
//! | 19        | 7, 0-6  | PM (1) or AM (0) depth                    |
//! | 1B        | 0-1     | LFO waveform; bits 6-7 drive CT1/CT2      |
//! | 20-27     | 7/6     | right/left enable                         |
//! |           | 3-5/0-2 | feedback, algorithm                       |
//! | 28-2F     | 0-6     | key code (block + note)                   |
//! | 30-37     | 2-7     | key fraction                              |
//! | 38-3F     | 4-6/0-1 | PM sensitivity, AM sensitivity            |
//! | 40-5F     | 4-6/0-3 | detune (DT1), multiple                    |
//! | 60-7F     | 0-6     | total level                               |
//! | 80-9F     | 6-7/0-4 | key scale rate, attack rate               |
//! | A0-BF     | 7, 0-4  | AM enable, decay rate                     |
//! | C0-DF     | 6-7/0-4 | detune 2 (DT2), sustain rate              |
//! | E0-FF     | 4-7/0-3 | sustain level, release rate               |
//!
//! Operators are numbered M1 C1 M2 C2 across the four operator banks, so
//! channel `n` owns operators `n`, `n + 16`, `n + 8` and `n + 24`.

use std::sync::OnceLock;

use super::cache::{OpDataCache, PhaseStep};
use super::constants::{bit, bitfield};
use super::env::{effective_rate, EnvelopeState};
use super::freqlut::{FreqLut, DETUNE2_DELTA};
use super::registers::{operator_list, KeyOn, OperatorList, Registers};
use super::sin::Sin;
use crate::state::SavedState;

const LFO_WAVEFORM_LENGTH: usize = 0x100;
const REGISTER_COUNT: usize = 0x100;

/// Register holding the LFO waveform and the CT1/CT2 output pins
pub const REG_LFO_WAVEFORM: u16 = 0x1b;

/// Key-on register
pub const REG_KEY_ON: u16 = 0x08;

// Sawtooth, square and triangle; AM in the low byte, signed PM in the high
static LFO_WAVEFORMS: OnceLock<[[i16; LFO_WAVEFORM_LENGTH]; 3]> = OnceLock::new();

fn pack_am_pm(am: u8, pm: u8) -> i16 {
    i16::from_le_bytes([am, pm])
}

fn lfo_waveforms() -> &'static [[i16; LFO_WAVEFORM_LENGTH]; 3] {
    LFO_WAVEFORMS.get_or_init(|| {
        let mut waves = [[0i16; LFO_WAVEFORM_LENGTH]; 3];
        for index in 0..LFO_WAVEFORM_LENGTH {
            let i = index as u8;

            waves[0][index] = pack_am_pm(i ^ 0xff, i);

            let am = if bit(i, 7) { 0 } else { 0xff };
            waves[1][index] = pack_am_pm(am, am ^ 0x80);

            let am = if bit(i, 7) { i << 1 } else { (i ^ 0xff) << 1 };
            let pm = if bit(i, 6) { am } else { !am };
            waves[2][index] = pack_am_pm(am, pm);
        }
        waves
    })
}

/// OPM register file plus LFO and noise generator state
#[derive(Clone, Debug)]
pub struct OpmRegisters {
    lfo_counter: u32,
    noise_lfsr: u32,
    noise_counter: u32,
    noise_state: u32,
    lfo_am: u32,
    /// Noise LFO waveform, filled one step ahead of the LFO position
    lfo_noise: [i16; LFO_WAVEFORM_LENGTH],
    regdata: [u8; REGISTER_COUNT],
}

impl Default for OpmRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl OpmRegisters {
    /// Create a register file in power-on state
    pub fn new() -> Self {
        let mut regs = Self {
            lfo_counter: 0,
            noise_lfsr: 1,
            noise_counter: 0,
            noise_state: 0,
            lfo_am: 0,
            lfo_noise: [0; LFO_WAVEFORM_LENGTH],
            regdata: [0; REGISTER_COUNT],
        };
        regs.reset();
        regs
    }

    #[inline]
    fn byte(&self, offset: u32, start: usize, count: usize, extra_offset: u32) -> u32 {
        bitfield(u32::from(self.regdata[((offset + extra_offset) & 0xff) as usize]), start, count)
    }

    /// Raw 17-bit noise LFSR plus history bits
    pub fn noise_lfsr(&self) -> u32 {
        self.noise_lfsr
    }

    /// Latched LFO AM value after depth scaling
    pub fn lfo_am(&self) -> u32 {
        self.lfo_am
    }

    // system-wide fields
    fn lfo_reset(&self) -> bool {
        self.byte(0x01, 1, 1, 0) != 0
    }
    fn noise_frequency(&self) -> u32 {
        self.byte(0x0f, 0, 5, 0) ^ 0x1f
    }
    fn lfo_rate(&self) -> u32 {
        self.byte(0x18, 0, 8, 0)
    }
    fn lfo_am_depth(&self) -> u32 {
        self.byte(0x19, 0, 7, 0)
    }
    fn lfo_pm_depth(&self) -> u32 {
        self.byte(0x1a, 0, 7, 0)
    }
    fn lfo_waveform(&self) -> u32 {
        self.byte(0x1b, 0, 2, 0)
    }

    // per-channel fields
    fn ch_block_freq(&self, choffs: u32) -> u32 {
        (self.byte(0x28, 0, 7, choffs) << 6) | self.byte(0x30, 2, 6, choffs)
    }
    fn ch_lfo_pm_sens(&self, choffs: u32) -> u32 {
        self.byte(0x38, 4, 3, choffs)
    }
    fn ch_lfo_am_sens(&self, choffs: u32) -> u32 {
        self.byte(0x38, 0, 2, choffs)
    }

    // per-operator fields
    fn op_detune(&self, opoffs: u32) -> u32 {
        self.byte(0x40, 4, 3, opoffs)
    }
    fn op_multiple(&self, opoffs: u32) -> u32 {
        self.byte(0x40, 0, 4, opoffs)
    }
    fn op_total_level(&self, opoffs: u32) -> u32 {
        self.byte(0x60, 0, 7, opoffs)
    }
    fn op_ksr(&self, opoffs: u32) -> u32 {
        self.byte(0x80, 6, 2, opoffs)
    }
    fn op_attack_rate(&self, opoffs: u32) -> u32 {
        self.byte(0x80, 0, 5, opoffs)
    }
    fn op_decay_rate(&self, opoffs: u32) -> u32 {
        self.byte(0xa0, 0, 5, opoffs)
    }
    fn op_detune2(&self, opoffs: u32) -> u32 {
        self.byte(0xc0, 6, 2, opoffs)
    }
    fn op_sustain_rate(&self, opoffs: u32) -> u32 {
        self.byte(0xc0, 0, 5, opoffs)
    }
    fn op_sustain_level(&self, opoffs: u32) -> u32 {
        self.byte(0xe0, 4, 4, opoffs)
    }
    fn op_release_rate(&self, opoffs: u32) -> u32 {
        self.byte(0xe0, 0, 4, opoffs)
    }
}

impl Registers for OpmRegisters {
    const OUTPUTS: usize = 2;
    const CHANNELS: usize = 8;
    const OPERATORS: usize = 32;
    const REGISTERS: usize = REGISTER_COUNT;
    const REG_MODE: u16 = 0x14;
    const DEFAULT_PRESCALE: u32 = 2;
    const EG_CLOCK_DIVIDER: u32 = 3;
    const CSM_TRIGGER_MASK: u32 = Self::ALL_CHANNELS;
    const STATUS_TIMERA: u8 = 0x01;
    const STATUS_TIMERB: u8 = 0x02;
    const STATUS_BUSY: u8 = 0x80;
    const STATUS_IRQ: u8 = 0;

    fn channel_offset(chnum: usize) -> u32 {
        chnum as u32
    }

    fn operator_offset(opnum: usize) -> u32 {
        opnum as u32
    }

    fn operator_list(&self, chnum: usize) -> OperatorList {
        operator_list(chnum, chnum + 16, chnum + 8, chnum + 24)
    }

    fn reset(&mut self) {
        self.regdata = [0; REGISTER_COUNT];
        // both outputs enabled on every channel
        self.regdata[0x20..0x28].fill(0xc0);

        self.lfo_counter = 0;
        self.noise_lfsr = 1;
        self.noise_counter = 0;
        self.noise_state = 0;
        self.lfo_am = 0;
        self.lfo_noise = [0; LFO_WAVEFORM_LENGTH];
    }

    fn save_restore(&mut self, state: &mut SavedState) {
        state.save_restore(&mut self.lfo_counter);
        state.save_restore(&mut self.lfo_am);
        state.save_restore(&mut self.noise_lfsr);
        state.save_restore(&mut self.noise_counter);
        state.save_restore(&mut self.noise_state);
        state.save_restore(&mut self.lfo_noise);
        state.save_restore(&mut self.regdata);
    }

    fn write(&mut self, index: u16, data: u8) -> Option<KeyOn> {
        // AM and PM depth share 0x19; PM is parked in the unused 0x1a
        match index {
            0x19 => self.regdata[0x19 + usize::from(data >> 7)] = data,
            0x1a => {}
            _ => self.regdata[usize::from(index) & 0xff] = data,
        }

        (index == REG_KEY_ON).then(|| KeyOn {
            channel: bitfield(u32::from(data), 0, 3),
            opmask: bitfield(u32::from(data), 3, 4),
        })
    }

    fn read(&self, index: u16) -> u8 {
        self.regdata[usize::from(index) & 0xff]
    }

    fn clock_noise_and_lfo(&mut self) -> i32 {
        // the noise counter runs at twice the sample rate
        let freq = self.noise_frequency();
        for _ in 0..2 {
            self.noise_lfsr <<= 1;
            self.noise_lfsr |= bitfield(self.noise_lfsr, 17, 1) ^ bitfield(self.noise_lfsr, 14, 1) ^ 1;

            let counter = self.noise_counter;
            self.noise_counter += 1;
            if counter >= freq {
                self.noise_counter = 0;
                self.noise_state = bitfield(self.noise_lfsr, 17, 1);
            }
        }

        // rate is a 4.4 float with an implied leading 1
        let rate = self.lfo_rate();
        self.lfo_counter = self
            .lfo_counter
            .wrapping_add((0x10 | bitfield(rate, 0, 4)) << bitfield(rate, 4, 4));

        if self.lfo_reset() {
            self.lfo_counter = 0;
        }

        let lfo = bitfield(self.lfo_counter, 22, 8) as usize;

        // write the noise waveform one step ahead so the current entry
        // holds still for a whole LFO step
        let lfo_noise = bitfield(self.noise_lfsr, 17, 8) as u8;
        self.lfo_noise[(lfo + 1) & 0xff] = pack_am_pm(lfo_noise, lfo_noise);

        let ampm = match self.lfo_waveform() {
            3 => self.lfo_noise[lfo],
            wave => lfo_waveforms()[wave as usize][lfo],
        };

        self.lfo_am = (u32::from(ampm as u16 & 0xff) * self.lfo_am_depth()) >> 7;
        (i32::from(ampm >> 8) * self.lfo_pm_depth() as i32) >> 7
    }

    fn lfo_am_offset(&self, choffs: u32) -> u32 {
        match self.ch_lfo_am_sens(choffs) {
            0 => 0,
            sensitivity => self.lfo_am << (sensitivity - 1),
        }
    }

    fn noise_state(&self) -> u32 {
        self.noise_state
    }

    fn cache_operator_data(&self, choffs: u32, opoffs: u32, cache: &mut OpDataCache) {
        cache.waveform = Sin::waveform();

        let block_freq = self.ch_block_freq(choffs);
        cache.block_freq = block_freq;

        // top five bits: block plus the top two bits of the note
        let keycode = bitfield(block_freq, 8, 5);

        cache.detune = FreqLut::detune_adjustment(self.op_detune(opoffs), keycode);

        // x.1 fixed point, so 0 means x0.5
        cache.multiple = match self.op_multiple(opoffs) * 2 {
            0 => 1,
            multiple => multiple,
        };

        // depends on block_freq, detune and multiple
        cache.phase_step = if self.lfo_pm_depth() == 0 || self.ch_lfo_pm_sens(choffs) == 0 {
            PhaseStep::Fixed(self.compute_phase_step(choffs, opoffs, cache, 0))
        } else {
            PhaseStep::Dynamic
        };

        cache.total_level = self.op_total_level(opoffs) << 3;

        // 4-bit sustain level where 15 means 31
        let mut sustain = self.op_sustain_level(opoffs);
        sustain |= (sustain + 1) & 0x10;
        cache.eg_sustain = (sustain << 5) as u16;

        let ksrval = keycode >> (self.op_ksr(opoffs) ^ 3);
        cache.set_rate(EnvelopeState::Depress, 0);
        cache.set_rate(EnvelopeState::Attack, effective_rate(self.op_attack_rate(opoffs) * 2, ksrval));
        cache.set_rate(EnvelopeState::Decay, effective_rate(self.op_decay_rate(opoffs) * 2, ksrval));
        cache.set_rate(EnvelopeState::Sustain, effective_rate(self.op_sustain_rate(opoffs) * 2, ksrval));
        cache.set_rate(EnvelopeState::Release, effective_rate(self.op_release_rate(opoffs) * 4 + 2, ksrval));
        cache.set_rate(EnvelopeState::Reverb, 0);
    }

    fn compute_phase_step(&self, choffs: u32, opoffs: u32, cache: &OpDataCache, lfo_raw_pm: i32) -> u32 {
        let mut delta = DETUNE2_DELTA[self.op_detune2(opoffs) as usize];

        // raw PM spans +/-200 cents; sensitivities 1-7 scale it to roughly
        // 5, 10, 20, 50, 100, 400 and 700 cents
        let pm_sensitivity = self.ch_lfo_pm_sens(choffs);
        if pm_sensitivity != 0 {
            if pm_sensitivity < 6 {
                delta += lfo_raw_pm >> (6 - pm_sensitivity);
            } else {
                delta += lfo_raw_pm << (pm_sensitivity - 5);
            }
        }

        let phase_step = FreqLut::key_code_to_phase_step(cache.block_freq, delta);
        let phase_step = phase_step.wrapping_add(cache.detune as u32);
        phase_step.wrapping_mul(cache.multiple) >> 1
    }

    fn load_timer_a(&self) -> bool {
        self.byte(0x14, 0, 1, 0) != 0
    }
    fn load_timer_b(&self) -> bool {
        self.byte(0x14, 1, 1, 0) != 0
    }
    fn enable_timer_a(&self) -> bool {
        self.byte(0x14, 2, 1, 0) != 0
    }
    fn enable_timer_b(&self) -> bool {
        self.byte(0x14, 3, 1, 0) != 0
    }
    fn reset_timer_a(&self) -> bool {
        self.byte(0x14, 4, 1, 0) != 0
    }
    fn reset_timer_b(&self) -> bool {
        self.byte(0x14, 5, 1, 0) != 0
    }
    fn timer_a_value(&self) -> u32 {
        (self.byte(0x10, 0, 8, 0) << 2) | self.byte(0x11, 0, 2, 0)
    }
    fn timer_b_value(&self) -> u32 {
        self.byte(0x12, 0, 8, 0)
    }
    fn csm(&self) -> bool {
        self.byte(0x14, 7, 1, 0) != 0
    }
    fn noise_enable(&self) -> bool {
        self.byte(0x0f, 7, 1, 0) != 0
    }

    fn ch_feedback(&self, choffs: u32) -> u32 {
        self.byte(0x20, 3, 3, choffs)
    }
    fn ch_algorithm(&self, choffs: u32) -> u32 {
        self.byte(0x20, 0, 3, choffs)
    }
    fn ch_output(&self, choffs: u32, index: usize) -> bool {
        match index {
            0 => self.byte(0x20, 6, 1, choffs) != 0,
            1 => self.byte(0x20, 7, 1, choffs) != 0,
            _ => false,
        }
    }

    fn op_lfo_am_enable(&self, opoffs: u32) -> bool {
        self.byte(0xa0, 7, 1, opoffs) != 0
    }
}
