#![allow(dead_code)]

use ymopm::ym2151::OUTPUTS;
use ymopm::{ClockedHost, EngineConfig, Host, OutputFrame, Ym2151};

/// Input clock of a typical board
pub const CLOCK: u32 = 3_579_545;

/// Register offsets of operator slots 1-4 relative to the channel
pub const SLOTS: [u8; 4] = [0, 16, 8, 24];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn chip() -> Ym2151<ClockedHost> {
    chip_with(EngineConfig::default())
}

pub fn chip_with(config: EngineConfig) -> Ym2151<ClockedHost> {
    init_logging();
    Ym2151::new(ClockedHost::new(), config)
}

/// Program `channel` as a single sine: algorithm 7, operator 1 loud with
/// the given attack rate, every other operator muted
pub fn program_sine<H: Host>(chip: &mut Ym2151<H>, channel: u8, key_code: u8, attack_rate: u8) {
    chip.write_register(0x20 + channel, 0xc7).unwrap();
    chip.write_register(0x28 + channel, key_code).unwrap();
    chip.write_register(0x30 + channel, 0x00).unwrap();
    for (index, slot) in SLOTS.iter().enumerate() {
        let opoffs = channel + slot;
        chip.write_register(0x40 + opoffs, 0x01).unwrap();
        chip.write_register(0x60 + opoffs, if index == 0 { 0x00 } else { 0x7f }).unwrap();
        chip.write_register(0x80 + opoffs, attack_rate).unwrap();
        chip.write_register(0xa0 + opoffs, 0x00).unwrap();
        chip.write_register(0xc0 + opoffs, 0x00).unwrap();
        chip.write_register(0xe0 + opoffs, 0x0f).unwrap();
    }
}

pub fn key_on<H: Host>(chip: &mut Ym2151<H>, channel: u8) {
    chip.write_register(0x08, 0x78 | channel).unwrap();
}

pub fn key_off<H: Host>(chip: &mut Ym2151<H>, channel: u8) {
    chip.write_register(0x08, channel).unwrap();
}

pub fn render<H: Host>(chip: &mut Ym2151<H>, samples: usize) -> Vec<OutputFrame<OUTPUTS>> {
    let mut frames = vec![OutputFrame::default(); samples];
    chip.generate(&mut frames);
    frames
}

pub fn left(frames: &[OutputFrame<OUTPUTS>]) -> Vec<f32> {
    frames.iter().map(|frame| frame.data[0] as f32).collect()
}

pub fn peak(frames: &[OutputFrame<OUTPUTS>]) -> i32 {
    frames
        .iter()
        .flat_map(|frame| frame.data)
        .map(i32::abs)
        .max()
        .unwrap_or(0)
}

/// Rising zero crossings of the left bus
pub fn rising_crossings(frames: &[OutputFrame<OUTPUTS>]) -> usize {
    frames
        .windows(2)
        .filter(|pair| pair[0].data[0] < 0 && pair[1].data[0] >= 0)
        .count()
}
