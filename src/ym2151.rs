//! YM2151 chip front-end
//!
//! Wraps the engine with the chip's two-step address/data bus, the busy
//! window that follows every data write, the CT1/CT2 output pins and the
//! YM3012 DAC truncation applied to each generated sample.

use log::debug;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::fm::opm::REG_LFO_WAVEFORM;
use crate::fm::{FmCore, Operator, OpmRegisters, OutputFrame, Registers};
use crate::host::{AccessClass, ClockedHost, Host};
use crate::state::SavedState;

/// Output buses of the YM2151 (left, right)
pub const OUTPUTS: usize = OpmRegisters::OUTPUTS;

/// Input clocks the chip stays busy after a data write, per prescale step
const BUSY_CLOCKS: u32 = 32;

/// A YM2151 driven by register writes
#[derive(Clone, Debug)]
pub struct Ym2151<H: Host> {
    fm: FmCore<OpmRegisters>,
    host: H,
    address: u8,
}

impl<H: Host> Ym2151<H> {
    /// Build a chip in power-on state
    pub fn new(host: H, config: EngineConfig) -> Self {
        let mut chip = Self {
            fm: FmCore::new(OpmRegisters::new(), config),
            host,
            address: 0,
        };
        chip.reset();
        chip
    }

    /// Return the chip to power-on state
    pub fn reset(&mut self) {
        self.fm.reset(&mut self.host);
    }

    /// Output sample rate for the given input clock
    pub fn sample_rate(&self, input_clock: u32) -> u32 {
        input_clock / (OpmRegisters::OPERATORS as u32 * self.fm.clock_prescale())
    }

    /// Input clocks per generated sample
    pub fn clocks_per_sample(&self) -> u32 {
        OpmRegisters::OPERATORS as u32 * self.fm.clock_prescale()
    }

    /// Change the input clock prescale
    pub fn set_clock_prescale(&mut self, prescale: u32) -> Result<()> {
        self.fm.set_clock_prescale(prescale)
    }

    /// Status byte, with the busy bit taken from the host
    pub fn read_status(&self) -> u8 {
        let mut result = self.fm.status();
        if self.host.is_busy() {
            result |= OpmRegisters::STATUS_BUSY;
        }
        result
    }

    /// Bus read: odd offsets return status, even offsets float high
    pub fn read(&self, offset: u32) -> u8 {
        match offset & 1 {
            1 => self.read_status(),
            _ => 0xff,
        }
    }

    /// Latch the register address for the next data write
    pub fn write_address(&mut self, data: u8) {
        self.address = data;
    }

    /// Write `data` to the latched register
    pub fn write_data(&mut self, data: u8) -> Result<()> {
        self.fm.write(&mut self.host, u16::from(self.address), data)?;

        // CT1/CT2 live in the top two bits of the waveform register
        if u16::from(self.address) == REG_LFO_WAVEFORM {
            self.host.external_write(AccessClass::Io, 0, data >> 6);
        }

        self.host.set_busy_end(BUSY_CLOCKS * self.fm.clock_prescale());
        Ok(())
    }

    /// Bus write: even offsets latch the address, odd offsets write data
    pub fn write(&mut self, offset: u32, data: u8) -> Result<()> {
        match offset & 1 {
            0 => {
                self.write_address(data);
                Ok(())
            }
            _ => self.write_data(data),
        }
    }

    /// Write one register through the bus
    pub fn write_register(&mut self, register: u8, data: u8) -> Result<()> {
        self.write_address(register);
        self.write_data(data)
    }

    /// Produce one sample per frame
    pub fn generate(&mut self, frames: &mut [OutputFrame<OUTPUTS>]) {
        for frame in frames.iter_mut() {
            self.fm.clock(OpmRegisters::ALL_CHANNELS);
            self.fm.output(frame.clear(), 0, 32767, OpmRegisters::ALL_CHANNELS);
            frame.roundtrip_fp();
        }
    }

    /// Forward a timer expiry from the host
    pub fn timer_expired(&mut self, tnum: u32) -> Result<()> {
        self.fm.timer_expired(&mut self.host, tnum)
    }

    /// Apply a mode write the host deferred
    pub fn apply_mode_write(&mut self, data: u8) {
        self.fm.mode_write(&mut self.host, data);
    }

    /// Operator `opnum` (0-31)
    pub fn operator(&self, opnum: usize) -> Result<&Operator> {
        self.fm.operator(opnum)
    }

    /// Feedback history of channel `chnum` (0-7)
    pub fn channel_feedback(&self, chnum: usize) -> Result<[i16; 2]> {
        self.fm.channel(chnum).map(|channel| channel.feedback())
    }

    /// Bitmask of channels audible at the last prepare
    pub fn active_channels(&self) -> u32 {
        self.fm.active_channels()
    }

    /// Engine status without the busy bit
    pub fn status(&self) -> u8 {
        self.fm.status()
    }

    /// Register family
    pub fn registers(&self) -> &OpmRegisters {
        self.fm.regs()
    }

    /// Engine core
    pub fn core(&self) -> &FmCore<OpmRegisters> {
        &self.fm
    }

    /// Host
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Host, mutably
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    fn save_restore(&mut self, state: &mut SavedState) {
        state.save_restore(&mut self.address);
        self.fm.save_restore(state);
    }

    /// Serialize the chip state
    pub fn save_state(&mut self) -> Vec<u8> {
        let mut state = SavedState::saver();
        self.save_restore(&mut state);
        state.into_bytes()
    }

    /// Restore state produced by [`save_state`](Self::save_state). On
    /// error the chip is left untouched.
    pub fn restore_state(&mut self, data: &[u8]) -> Result<()> {
        let mut address = self.address;
        let mut fm = self.fm.clone();

        let mut state = SavedState::restorer(data);
        state.save_restore(&mut address);
        fm.save_restore(&mut state);
        state.finish()?;

        self.address = address;
        self.fm = fm;
        Ok(())
    }
}

impl Ym2151<ClockedHost> {
    /// Advance the host by `clocks` input clocks, delivering every timer
    /// expiry at the exact clock it happens
    pub fn advance_clocks(&mut self, mut clocks: u32) -> Result<()> {
        while clocks > 0 {
            let step = self.host.next_expiry().map_or(clocks, |next| next.clamp(1, clocks));
            let fired = self.host.advance(step);
            for (tnum, _) in fired.iter().enumerate().filter(|(_, fired)| **fired) {
                self.fm.timer_expired(&mut self.host, tnum as u32)?;
            }
            clocks -= step;
        }
        Ok(())
    }

    /// Generate samples while running the host's timers in step
    pub fn generate_clocked(&mut self, frames: &mut [OutputFrame<OUTPUTS>]) -> Result<()> {
        for frame in frames.chunks_mut(1) {
            self.generate(frame);
            self.advance_clocks(self.clocks_per_sample())?;
        }
        Ok(())
    }

    /// Apply every mode write a deferring host queued
    pub fn apply_pending_mode_writes(&mut self) {
        let pending = self.host.take_pending_mode_writes();
        if !pending.is_empty() {
            debug!("applying {} deferred mode writes", pending.len());
        }
        for data in pending {
            self.apply_mode_write(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;

    #[test]
    fn test_sample_rate() {
        let chip = Ym2151::new(NullHost, EngineConfig::default());
        assert_eq!(chip.sample_rate(3_579_545), 55_930);
        assert_eq!(chip.clocks_per_sample(), 64);
    }

    #[test]
    fn test_even_reads_float_high() {
        let chip = Ym2151::new(NullHost, EngineConfig::default());
        assert_eq!(chip.read(0), 0xff);
        assert_eq!(chip.read(1), 0x00);
    }

    #[test]
    fn test_busy_after_data_write() {
        let mut chip = Ym2151::new(ClockedHost::new(), EngineConfig::default());
        chip.write(0, 0x20).unwrap();
        assert_eq!(chip.read_status() & 0x80, 0);
        chip.write(1, 0xc7).unwrap();
        assert_eq!(chip.read_status() & 0x80, 0x80);
        chip.advance_clocks(63).unwrap();
        assert_eq!(chip.read_status() & 0x80, 0x80);
        chip.advance_clocks(1).unwrap();
        assert_eq!(chip.read_status() & 0x80, 0);
    }

    #[test]
    fn test_ct_pins_follow_waveform_register() {
        let mut chip = Ym2151::new(ClockedHost::new(), EngineConfig::default());
        chip.write_register(0x1b, 0xc2).unwrap();
        assert_eq!(chip.host().io_pins(), 0x03);
        assert_eq!(chip.registers().read(0x1b), 0xc2);
    }

    #[test]
    fn test_deferred_mode_write() {
        let mut chip = Ym2151::new(ClockedHost::deferring(), EngineConfig::default());
        chip.host_mut().take_pending_mode_writes();
        chip.write_register(0x10, 0xff).unwrap();
        chip.write_register(0x11, 0x03).unwrap();
        chip.write_register(0x14, 0x05).unwrap();
        assert_eq!(chip.host().timer_remaining(0), None);

        chip.apply_pending_mode_writes();
        assert_eq!(chip.host().timer_remaining(0), Some(64));
    }

    #[test]
    fn test_introspection_checks_indices() {
        let chip = Ym2151::new(NullHost, EngineConfig::default());
        assert!(chip.operator(31).is_ok());
        assert!(chip.operator(32).is_err());
        assert_eq!(chip.channel_feedback(7), Ok([0, 0]));
        assert!(chip.channel_feedback(8).is_err());
    }

    #[test]
    fn test_restore_keeps_address_latch() {
        let mut chip = Ym2151::new(NullHost, EngineConfig::default());
        chip.write_address(0x28);
        let saved = chip.save_state();
        chip.write_address(0x30);
        chip.restore_state(&saved).unwrap();
        chip.write_data(0x4a).unwrap();
        assert_eq!(chip.registers().read(0x28), 0x4a);
    }
}
