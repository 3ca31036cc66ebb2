//! Minimal register family for exercising the engine in unit tests
//!
//! Nine 2-operator channels in the OPL layout with a flat register map,
//! rhythm mode, a dynamic 4-operator pairing of channels 0 and 3, and every
//! envelope feature switched on.

use super::cache::{OpDataCache, PhaseStep};
use super::constants::{bit, bitfield};
use super::env::{effective_rate, EnvelopeState};
use super::registers::{KeyOn, OperatorList, Registers};
use super::sin::Sin;
use crate::state::SavedState;

/// x.1 frequency multiples
const MULTIPLE_X2: [u32; 16] = [1, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 20, 24, 24, 30, 30];

/// Flat register file: one byte per field group
#[derive(Clone, Debug)]
pub struct TestRegisters {
    noise_lfsr: u32,
    regdata: [u8; 0x100],
}

impl TestRegisters {
    /// bit 5 enables rhythm, bits 0-4 key BD, SD, TOM, TC, HH
    pub const REG_RHYTHM: u16 = 0x01;
    pub const REG_TIMER_A: u16 = 0x02;
    pub const REG_TIMER_B: u16 = 0x03;
    /// bit 0 pairs channels 0 and 3 into one 4-operator channel
    pub const REG_FOUR_OP: u16 = 0x05;
    pub const REG_AM_OFFSET: u16 = 0x06;
    /// channel in bits 0-3, operator mask in bits 4-5
    pub const REG_KEY_ON: u16 = 0x08;
    /// + channel: algorithm in bit 0, feedback in bits 1-3
    pub const REG_CHANNEL: u16 = 0x10;
    /// + channel: frequency high bits 0-1, block 2-4
    pub const REG_BLOCK: u16 = 0x20;
    pub const REG_FREQ_LOW: u16 = 0x30;
    /// + operator: AM enable in bit 7, multiple in bits 0-3
    pub const REG_MULTIPLE: u16 = 0x40;
    pub const REG_TOTAL_LEVEL: u16 = 0x60;
    /// + operator: attack rate high nibble, decay rate low nibble
    pub const REG_ATTACK: u16 = 0x80;
    /// + operator: sustain level high nibble, release rate low nibble
    pub const REG_SUSTAIN: u16 = 0xa0;
    /// + operator: enable in bit 3, mode in bits 0-2
    pub const REG_SSG: u16 = 0xc0;
    pub const REG_SUSTAIN_RATE: u16 = 0xe0;

    pub fn new() -> Self {
        Self {
            noise_lfsr: 1,
            regdata: [0; 0x100],
        }
    }

    fn byte(&self, index: u16) -> u32 {
        u32::from(self.regdata[usize::from(index)])
    }

    fn field(&self, base: u16, offset: u32, start: usize, length: usize) -> u32 {
        bitfield(self.byte(base + offset as u16), start, length)
    }

    fn set_field(&mut self, base: u16, offset: u32, start: usize, length: usize, value: u32) {
        let index = usize::from(base + offset as u16);
        let mask = ((1u32 << length) - 1) << start;
        let old = u32::from(self.regdata[index]);
        self.regdata[index] = ((old & !mask) | ((value << start) & mask)) as u8;
    }

    pub fn set_attack_rate(&mut self, opoffs: u32, rate: u32) {
        self.set_field(Self::REG_ATTACK, opoffs, 4, 4, rate);
    }

    pub fn set_release_rate(&mut self, opoffs: u32, rate: u32) {
        self.set_field(Self::REG_SUSTAIN, opoffs, 0, 4, rate);
    }

    pub fn set_ssg(&mut self, opoffs: u32, enable: bool, mode: u32) {
        self.set_field(Self::REG_SSG, opoffs, 0, 4, (u32::from(enable) << 3) | (mode & 7));
    }

    pub fn set_frequency(&mut self, choffs: u32, block: u32, fnum: u32) {
        self.set_field(Self::REG_FREQ_LOW, choffs, 0, 8, fnum);
        self.set_field(Self::REG_BLOCK, choffs, 0, 5, (block << 2) | (fnum >> 8));
    }

    pub fn set_multiple(&mut self, opoffs: u32, multiple: u32) {
        self.set_field(Self::REG_MULTIPLE, opoffs, 0, 4, multiple);
    }

    pub fn set_algorithm(&mut self, choffs: u32, algorithm: u32) {
        self.set_field(Self::REG_CHANNEL, choffs, 0, 1, algorithm);
    }

    pub fn set_feedback(&mut self, choffs: u32, feedback: u32) {
        self.set_field(Self::REG_CHANNEL, choffs, 1, 3, feedback);
    }

    fn four_op(&self) -> bool {
        bit(self.byte(Self::REG_FOUR_OP), 0)
    }

    fn mode(&self, index: usize) -> bool {
        bit(self.byte(Self::REG_MODE), index)
    }
}

impl Default for TestRegisters {
    fn default() -> Self {
        Self::new()
    }
}

fn rate4(rate: u32) -> u32 {
    if rate == 0 {
        0
    } else {
        rate * 4 + 2
    }
}

impl Registers for TestRegisters {
    const OUTPUTS: usize = 1;
    const CHANNELS: usize = 9;
    const OPERATORS: usize = 18;
    const REGISTERS: usize = 0x100;
    const REG_MODE: u16 = 0x04;
    const DEFAULT_PRESCALE: u32 = 4;
    const EG_CLOCK_DIVIDER: u32 = 1;
    const CSM_TRIGGER_MASK: u32 = Self::ALL_CHANNELS;
    const EG_HAS_DEPRESS: bool = true;
    const EG_HAS_REVERB: bool = true;
    const EG_HAS_SSG: bool = true;
    const DYNAMIC_OPS: bool = true;
    const STATUS_TIMERA: u8 = 0x40;
    const STATUS_TIMERB: u8 = 0x20;
    const STATUS_BUSY: u8 = 0;
    const STATUS_IRQ: u8 = 0x80;

    fn channel_offset(chnum: usize) -> u32 {
        chnum as u32
    }

    fn operator_offset(opnum: usize) -> u32 {
        opnum as u32
    }

    fn operator_list(&self, chnum: usize) -> OperatorList {
        if self.four_op() {
            match chnum {
                0 => return [Some(0), Some(3), Some(6), Some(9)],
                3 => return [None; 4],
                _ => {}
            }
        }
        let op1 = chnum % 3 + 6 * (chnum / 3);
        [Some(op1), Some(op1 + 3), None, None]
    }

    fn reset(&mut self) {
        self.regdata = [0; 0x100];
        self.noise_lfsr = 1;
    }

    fn save_restore(&mut self, state: &mut SavedState) {
        state.save_restore(&mut self.noise_lfsr);
        state.save_restore(&mut self.regdata);
    }

    fn write(&mut self, index: u16, data: u8) -> Option<KeyOn> {
        self.regdata[usize::from(index)] = data;
        match index {
            Self::REG_KEY_ON => Some(KeyOn {
                channel: u32::from(data & 0x0f),
                opmask: u32::from(data >> 4) & 3,
            }),
            Self::REG_RHYTHM => Some(KeyOn {
                channel: Self::RHYTHM_CHANNEL,
                opmask: if bit(data, 5) { u32::from(data & 0x1f) } else { 0 },
            }),
            _ => None,
        }
    }

    fn read(&self, index: u16) -> u8 {
        self.regdata[usize::from(index)]
    }

    fn clock_noise_and_lfo(&mut self) -> i32 {
        let lfsr = self.noise_lfsr << 1;
        let feedback = bitfield(lfsr, 23, 1) ^ bitfield(lfsr, 9, 1) ^ bitfield(lfsr, 8, 1) ^ bitfield(lfsr, 1, 1);
        self.noise_lfsr = (lfsr | feedback) & 0xff_ffff;
        0
    }

    fn lfo_am_offset(&self, _choffs: u32) -> u32 {
        self.byte(Self::REG_AM_OFFSET)
    }

    fn noise_state(&self) -> u32 {
        bitfield(self.noise_lfsr, 23, 1)
    }

    fn cache_operator_data(&self, choffs: u32, opoffs: u32, cache: &mut OpDataCache) {
        cache.waveform = Sin::waveform();
        cache.block_freq = (self.field(Self::REG_BLOCK, choffs, 0, 5) << 8) | self.byte(Self::REG_FREQ_LOW + choffs as u16);
        cache.detune = 0;
        cache.multiple = MULTIPLE_X2[self.field(Self::REG_MULTIPLE, opoffs, 0, 4) as usize];
        cache.phase_step = PhaseStep::Fixed(self.compute_phase_step(choffs, opoffs, cache, 0));
        cache.total_level = self.field(Self::REG_TOTAL_LEVEL, opoffs, 0, 6) << 3;

        let mut sustain = self.field(Self::REG_SUSTAIN, opoffs, 4, 4);
        sustain |= (sustain + 1) & 0x10;
        cache.eg_sustain = (sustain << 5) as u16;

        cache.set_rate(EnvelopeState::Depress, 48);
        cache.set_rate(EnvelopeState::Attack, effective_rate(rate4(self.field(Self::REG_ATTACK, opoffs, 4, 4)), 0));
        cache.set_rate(EnvelopeState::Decay, effective_rate(rate4(self.field(Self::REG_ATTACK, opoffs, 0, 4)), 0));
        cache.set_rate(
            EnvelopeState::Sustain,
            effective_rate(rate4(self.field(Self::REG_SUSTAIN_RATE, opoffs, 0, 4)), 0),
        );
        cache.set_rate(EnvelopeState::Release, effective_rate(rate4(self.field(Self::REG_SUSTAIN, opoffs, 0, 4)), 0));
        cache.set_rate(EnvelopeState::Reverb, 20);
    }

    fn compute_phase_step(&self, _choffs: u32, _opoffs: u32, cache: &OpDataCache, _lfo_raw_pm: i32) -> u32 {
        let fnum = bitfield(cache.block_freq, 0, 10);
        let block = bitfield(cache.block_freq, 10, 3);
        (((fnum << block) >> 1) * cache.multiple) >> 1
    }

    fn irq_reset(&self) -> bool {
        self.mode(7)
    }

    fn load_timer_a(&self) -> bool {
        self.mode(0)
    }

    fn load_timer_b(&self) -> bool {
        self.mode(1)
    }

    fn enable_timer_a(&self) -> bool {
        self.mode(2)
    }

    fn enable_timer_b(&self) -> bool {
        self.mode(3)
    }

    fn reset_timer_a(&self) -> bool {
        self.mode(4)
    }

    fn reset_timer_b(&self) -> bool {
        self.mode(5)
    }

    fn timer_a_value(&self) -> u32 {
        self.byte(Self::REG_TIMER_A) * 4
    }

    fn timer_b_value(&self) -> u32 {
        self.byte(Self::REG_TIMER_B)
    }

    fn csm(&self) -> bool {
        self.mode(6)
    }

    fn rhythm_enable(&self) -> bool {
        bit(self.byte(Self::REG_RHYTHM), 5)
    }

    fn ch_feedback(&self, choffs: u32) -> u32 {
        self.field(Self::REG_CHANNEL, choffs, 1, 3)
    }

    fn ch_algorithm(&self, choffs: u32) -> u32 {
        self.field(Self::REG_CHANNEL, choffs, 0, 1)
    }

    fn ch_output(&self, _choffs: u32, _index: usize) -> bool {
        true
    }

    fn op_ssg_eg_enable(&self, opoffs: u32) -> bool {
        self.field(Self::REG_SSG, opoffs, 3, 1) != 0
    }

    fn op_ssg_eg_mode(&self, opoffs: u32) -> u32 {
        self.field(Self::REG_SSG, opoffs, 0, 3)
    }

    fn op_lfo_am_enable(&self, opoffs: u32) -> bool {
        self.field(Self::REG_MULTIPLE, opoffs, 7, 1) != 0
    }
}
