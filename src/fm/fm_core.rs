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

//! FM engine core
//!
//! Owns every channel and operator of one chip plus its register family,
//! and drives them one sample at a time. Timer, busy and IRQ handling is
//! delegated to a [`Host`] passed into each call that may need it.

use log::{debug, trace};

use super::channel::{Channel, Mix};
use super::constants::{bit, bitfield, PREPARE_INTERVAL};
use super::operator::{KeyOnType, Operator};
use super::output::OutputFrame;
use super::registers::{KeyOn, Registers};
use crate::config::{EngineConfig, IrqResetPolicy};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::state::SavedState;

/// Status bits cleared by an IRQ reset under [`IrqResetPolicy::AllStatus`]
const IRQ_RESET_ALL: u8 = 0x78;

// timer B at value 0, in operator clocks
const LONGEST_TIMER_PERIOD: u32 = 16 * 256;

/// Rhythm channels: bass drum, hi-hat/snare, tom/cymbal
const RHYTHM_BD: usize = 6;
const RHYTHM_HH_SD: usize = 7;
const RHYTHM_TOM_TC: usize = 8;

/// Sample-exact FM engine for one register family
#[derive(Clone, Debug)]
pub struct FmCore<R: Registers> {
    /// x.2 envelope counter
    env_counter: u32,
    status: u8,
    clock_prescale: u32,
    irq_mask: u8,
    irq_state: bool,
    timer_running: [bool; 2],
    /// Low 8 bits of the number of clocks processed
    total_clocks: u8,
    active_channels: u32,
    modified_channels: u32,
    prepare_count: u32,
    regs: R,
    channels: Vec<Channel>,
    operators: Vec<Operator>,
    config: EngineConfig,
}

impl<R: Registers> FmCore<R> {
    /// Build the engine around `regs`. Call [`reset`](Self::reset) before
    /// use.
    pub fn new(regs: R, config: EngineConfig) -> Self {
        debug_assert!((1..=crate::MAX_OUTPUTS).contains(&R::OUTPUTS));
        let channels = (0..R::CHANNELS).map(|chnum| Channel::new(R::channel_offset(chnum))).collect();
        let operators = (0..R::OPERATORS).map(|opnum| Operator::new(R::operator_offset(opnum))).collect();

        let mut core = Self {
            env_counter: 0,
            status: 0,
            clock_prescale: R::DEFAULT_PRESCALE,
            irq_mask: R::STATUS_TIMERA | R::STATUS_TIMERB,
            irq_state: false,
            timer_running: [false; 2],
            total_clocks: 0,
            active_channels: R::ALL_CHANNELS,
            modified_channels: R::ALL_CHANNELS,
            prepare_count: 0,
            regs,
            channels,
            operators,
            config,
        };
        core.assign_operators();
        core
    }

    /// Return the chip to power-on state
    pub fn reset<H: Host>(&mut self, host: &mut H) {
        self.set_reset_status(host, 0, 0xff);

        self.regs.reset();

        // goes through the host like any mode write; it reloads the timers
        let mode = self.config.mode_reset_value.value();
        host.sync_mode_write(self, mode);

        for channel in self.channels.iter_mut() {
            channel.reset();
        }
        for operator in self.operators.iter_mut() {
            operator.reset();
        }
    }

    /// Walk every piece of mutable state in a fixed order. A restore
    /// rebuilds the operator caches from the restored registers.
    pub fn save_restore(&mut self, state: &mut SavedState) {
        state.save_restore(&mut self.env_counter);
        state.save_restore(&mut self.status);
        state.save_restore(&mut self.clock_prescale);
        if !state.is_saving() && !Self::prescale_fits(self.clock_prescale) {
            state.mark_corrupt("clock prescale out of range");
        }
        state.save_restore(&mut self.irq_mask);
        state.save_restore(&mut self.irq_state);
        state.save_restore(&mut self.timer_running);
        state.save_restore(&mut self.total_clocks);
        state.save_restore(&mut self.active_channels);
        state.save_restore(&mut self.modified_channels);
        state.save_restore(&mut self.prepare_count);

        self.regs.save_restore(state);

        for channel in self.channels.iter_mut() {
            channel.save_restore(state);
        }
        for operator in self.operators.iter_mut() {
            operator.save_restore(state);
        }

        if !state.is_saving() {
            self.refresh_caches();
        }
    }

    /// Serialize the engine state
    pub fn save_state(&mut self) -> Vec<u8> {
        let mut state = SavedState::saver();
        self.save_restore(&mut state);
        state.into_bytes()
    }

    /// Restore state produced by [`save_state`](Self::save_state). On
    /// error the engine is left untouched.
    pub fn restore_state(&mut self, data: &[u8]) -> Result<()> {
        let mut restored = self.clone();
        let mut state = SavedState::restorer(data);
        restored.save_restore(&mut state);
        state.finish()?;

        debug!("restored {} bytes of engine state", data.len());
        *self = restored;
        Ok(())
    }

    /// Rebuild operator caches without touching key state
    fn refresh_caches(&mut self) {
        if R::DYNAMIC_OPS {
            self.assign_operators();
        }
        for operator in self.operators.iter_mut() {
            self.regs.cache_operator_data(operator.choffs, operator.opoffs, &mut operator.cache);
        }
    }

    /// Force a full prepare pass on the next clock
    pub fn invalidate_caches(&mut self) {
        self.modified_channels = R::ALL_CHANNELS;
    }

    /// Advance every channel in `chanmask` by one sample. Returns the
    /// envelope counter.
    pub fn clock(&mut self, chanmask: u32) -> u32 {
        self.total_clocks = self.total_clocks.wrapping_add(1);

        // prepare after any write, and periodically to catch envelopes
        // that finished on their own
        let prepare = if self.modified_channels != 0 {
            true
        } else {
            let count = self.prepare_count;
            self.prepare_count += 1;
            count >= PREPARE_INTERVAL
        };

        if prepare {
            if R::DYNAMIC_OPS {
                self.assign_operators();
            }

            self.active_channels = 0;
            for chnum in 0..R::CHANNELS {
                if bit(chanmask, chnum) && self.channels[chnum].prepare(&self.regs, &mut self.operators) {
                    self.active_channels |= 1 << chnum;
                }
            }

            self.modified_channels = 0;
            self.prepare_count = 0;
        }

        // a divider other than 1 counts the sub-steps 0..divider and skips
        // the rest
        if R::EG_CLOCK_DIVIDER == 1 {
            self.env_counter = self.env_counter.wrapping_add(4);
        } else {
            self.env_counter = self.env_counter.wrapping_add(1);
            if bitfield(self.env_counter, 0, 2) == R::EG_CLOCK_DIVIDER {
                self.env_counter = self.env_counter.wrapping_add(4 - R::EG_CLOCK_DIVIDER);
            }
        }

        let lfo_raw_pm = self.regs.clock_noise_and_lfo();

        for chnum in 0..R::CHANNELS {
            if bit(chanmask, chnum) {
                self.channels[chnum].clock(&self.regs, &mut self.operators, self.env_counter, lfo_raw_pm);
            }
        }

        self.env_counter
    }

    /// Mix the channels in `chanmask` into `output`, each operator shifted
    /// right by `rshift` and sums clamped to `clipmax`
    pub fn output<const N: usize>(
        &mut self,
        output: &mut OutputFrame<N>,
        rshift: u32,
        clipmax: i32,
        chanmask: u32,
    ) {
        let chanmask = chanmask & self.config.channel_mask & self.active_channels;
        let mix = Mix {
            rshift,
            clipmax,
            noise_am: self.config.noise_am,
        };

        let Self {
            regs,
            channels,
            operators,
            ..
        } = self;

        if regs.rhythm_enable() {
            let [hh_op, tc_op] = R::RHYTHM_PHASE_OPS;
            let op13phase = operators.get(hh_op).map_or(0, Operator::phase);
            let op17phase = operators.get(tc_op).map_or(0, Operator::phase);
            let phase_select = (bitfield(op13phase, 2, 1) ^ bitfield(op13phase, 7, 1))
                | bitfield(op13phase, 3, 1)
                | (bitfield(op17phase, 5, 1) ^ bitfield(op17phase, 3, 1));

            for (chnum, channel) in channels.iter_mut().enumerate() {
                if !bit(chanmask, chnum) {
                    continue;
                }
                match chnum {
                    RHYTHM_BD => channel.output_rhythm_ch6(regs, operators, output, &mix),
                    RHYTHM_HH_SD => channel.output_rhythm_ch7(regs, operators, phase_select, output, &mix),
                    RHYTHM_TOM_TC => channel.output_rhythm_ch8(regs, operators, phase_select, output, &mix),
                    _ if channel.is_4op() => channel.output_4op(regs, operators, output, &mix),
                    _ => channel.output_2op(regs, operators, output, &mix),
                }
            }
        } else {
            for (chnum, channel) in channels.iter_mut().enumerate() {
                if !bit(chanmask, chnum) {
                    continue;
                }
                if channel.is_4op() {
                    channel.output_4op(regs, operators, output, &mix);
                } else {
                    channel.output_2op(regs, operators, output, &mix);
                }
            }
        }
    }

    /// Write a register. Mode-register writes are handed to the host's
    /// sync hook; everything else applies immediately.
    pub fn write<H: Host>(&mut self, host: &mut H, regnum: u16, data: u8) -> Result<()> {
        if usize::from(regnum) >= R::REGISTERS {
            return Err(Error::RegisterOutOfRange {
                index: regnum,
                limit: R::REGISTERS,
            });
        }
        trace!("{:03X} = {:02X}", regnum, data);

        if regnum == R::REG_MODE {
            host.sync_mode_write(self, data);
            return Ok(());
        }

        self.modified_channels = R::ALL_CHANNELS;

        if let Some(keyon) = self.regs.write(regnum, data) {
            self.key_on_event(keyon);
        }
        Ok(())
    }

    fn key_on_event(&mut self, keyon: KeyOn) {
        if keyon.channel == R::RHYTHM_CHANNEL {
            let mask = keyon.opmask;
            let bd = if bit(mask, 4) { 3 } else { 0 };
            let hh_sd = bitfield(mask, 0, 1) | (bitfield(mask, 3, 1) << 1);
            let tom_tc = bitfield(mask, 2, 1) | (bitfield(mask, 1, 1) << 1);
            self.keyonoff_channel(RHYTHM_BD, bd, KeyOnType::Rhythm);
            self.keyonoff_channel(RHYTHM_HH_SD, hh_sd, KeyOnType::Rhythm);
            self.keyonoff_channel(RHYTHM_TOM_TC, tom_tc, KeyOnType::Rhythm);
        } else {
            self.keyonoff_channel(keyon.channel as usize, keyon.opmask, KeyOnType::Normal);
        }
    }

    fn keyonoff_channel(&mut self, chnum: usize, states: u32, kind: KeyOnType) {
        let Some(channel) = self.channels.get(chnum) else {
            return;
        };
        if chnum < 32 && bit(self.config.log_channel_mask, chnum) {
            debug!("channel {} key {:04b} ({:?})", chnum, states, kind);
        }
        channel.keyonoff(&mut self.operators, states, kind);
    }

    /// Apply a mode-register write: store it, then reset status or reload
    /// the timers
    pub fn mode_write<H: Host>(&mut self, host: &mut H, data: u8) {
        self.modified_channels = R::ALL_CHANNELS;

        // the mode register never reports a key-on
        let _ = self.regs.write(R::REG_MODE, data);

        if self.regs.irq_reset() {
            let reset = match self.config.irq_reset {
                IrqResetPolicy::AllStatus => IRQ_RESET_ALL,
                IrqResetPolicy::IrqOnly => R::STATUS_IRQ,
            };
            self.set_reset_status(host, 0, reset);
            return;
        }

        let mut reset_mask = 0;
        if self.regs.reset_timer_b() {
            reset_mask |= R::STATUS_TIMERB;
        }
        if self.regs.reset_timer_a() {
            reset_mask |= R::STATUS_TIMERA;
        }
        self.set_reset_status(host, 0, reset_mask);

        // timer B's x16 prescaler is free running, so its first tick is short
        let load_b = self.regs.load_timer_b();
        let load_a = self.regs.load_timer_a();
        self.update_timer(host, 1, load_b, -i32::from(self.total_clocks & 15));
        self.update_timer(host, 0, load_a, 0);
    }

    fn update_timer<H: Host>(&mut self, host: &mut H, tnum: usize, enable: bool, delta_clocks: i32) {
        if enable && !self.timer_running[tnum] {
            let period = if tnum == 0 {
                1024 - self.regs.timer_a_value()
            } else {
                16 * (256 - self.regs.timer_b_value())
            };
            let clocks = (period as i32 + delta_clocks) * R::OPERATORS as i32 * self.clock_prescale as i32;
            trace!("timer {} armed for {} clocks", tnum, clocks);
            host.set_timer(tnum as u32, clocks);
            self.timer_running[tnum] = true;
        } else if !enable {
            host.set_timer(tnum as u32, -1);
            self.timer_running[tnum] = false;
        }
    }

    /// Handle expiry of timer `tnum` (0 = A, 1 = B)
    pub fn timer_expired<H: Host>(&mut self, host: &mut H, tnum: u32) -> Result<()> {
        let tnum = match tnum {
            0 | 1 => tnum as usize,
            _ => return Err(Error::TimerOutOfRange(tnum)),
        };
        trace!("timer {} expired", tnum);

        if tnum == 0 && self.regs.enable_timer_a() {
            self.set_reset_status(host, R::STATUS_TIMERA, 0);
        } else if tnum == 1 && self.regs.enable_timer_b() {
            self.set_reset_status(host, R::STATUS_TIMERB, 0);
        }

        if tnum == 0 && self.regs.csm() {
            for chnum in 0..R::CHANNELS {
                if bit(R::CSM_TRIGGER_MASK, chnum) {
                    self.channels[chnum].keyonoff(&mut self.operators, 0xf, KeyOnType::Csm);
                    self.modified_channels |= 1 << chnum;
                }
            }
        }

        self.timer_running[tnum] = false;
        self.update_timer(host, tnum, true, 0);
        Ok(())
    }

    /// Set then clear status bits and recheck interrupts. Returns the
    /// visible status.
    pub fn set_reset_status<H: Host>(&mut self, host: &mut H, set: u8, reset: u8) -> u8 {
        self.status = (self.status | set) & !(reset | R::STATUS_BUSY);
        host.sync_check_interrupts(self);
        self.status & !self.regs.status_mask()
    }

    /// Recompute the IRQ line, notifying the host only on a change
    pub fn check_interrupts<H: Host>(&mut self, host: &mut H) {
        let old_state = self.irq_state;
        self.irq_state = self.status & self.irq_mask & !self.regs.status_mask() != 0;

        if self.irq_state {
            self.status |= R::STATUS_IRQ;
        } else {
            self.status &= !R::STATUS_IRQ;
        }

        if old_state != self.irq_state {
            trace!("IRQ {}", if self.irq_state { "asserted" } else { "cleared" });
            host.update_irq(self.irq_state);
        }
    }

    /// Select which status bits raise the IRQ line
    pub fn set_irq_mask<H: Host>(&mut self, host: &mut H, mask: u8) {
        self.irq_mask = mask;
        host.sync_check_interrupts(self);
    }

    /// Status byte as the chip reports it, without the busy bit
    pub fn status(&self) -> u8 {
        self.status & !R::STATUS_BUSY & !self.regs.status_mask()
    }

    /// Input clocks per operator clock
    pub fn clock_prescale(&self) -> u32 {
        self.clock_prescale
    }

    /// Change the input clock prescale; affects timer periods. The longest
    /// timer period in input clocks must fit the host's `i32` duration.
    pub fn set_clock_prescale(&mut self, prescale: u32) -> Result<()> {
        if !Self::prescale_fits(prescale) {
            return Err(Error::PrescaleOutOfRange(prescale));
        }
        self.clock_prescale = prescale;
        Ok(())
    }

    fn prescale_fits(prescale: u32) -> bool {
        prescale != 0
            && LONGEST_TIMER_PERIOD
                .checked_mul(R::OPERATORS as u32)
                .and_then(|clocks| clocks.checked_mul(prescale))
                .map_or(false, |clocks| i32::try_from(clocks).is_ok())
    }

    /// Register family
    pub fn regs(&self) -> &R {
        &self.regs
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bitmask of channels audible at the last prepare
    pub fn active_channels(&self) -> u32 {
        self.active_channels
    }

    /// Channel `chnum`
    pub fn channel(&self, chnum: usize) -> Result<&Channel> {
        self.channels.get(chnum).ok_or(Error::ChannelOutOfRange {
            index: chnum,
            limit: R::CHANNELS,
        })
    }

    /// Operator `opnum`
    pub fn operator(&self, opnum: usize) -> Result<&Operator> {
        self.operators.get(opnum).ok_or(Error::OperatorOutOfRange {
            index: opnum,
            limit: R::OPERATORS,
        })
    }

    /// Envelope counter (x.2)
    pub fn env_counter(&self) -> u32 {
        self.env_counter
    }

    fn assign_operators(&mut self) {
        for chnum in 0..R::CHANNELS {
            let list = self.regs.operator_list(chnum);
            for (index, opnum) in list.into_iter().enumerate() {
                self.channels[chnum].assign(index, opnum, &mut self.operators);
            }
        }
    }
}
