//! Host callback contract
//!
//! The engine never keeps time itself. It asks its host to arm timers and
//! busy windows, reports IRQ line changes, and routes mode-register writes
//! and interrupt checks through the host so they can be ordered against
//! the host's own timeline. The synchronisation hooks receive the engine
//! and may call straight back into it.

use log::trace;

use crate::fm::{FmCore, Registers};

/// Address space of an external memory access
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessClass {
    /// General purpose output pins
    Io,
    /// ADPCM-A sample memory
    AdpcmA,
    /// ADPCM-B sample memory
    AdpcmB,
    /// PCM sample memory
    Pcm,
}

/// Callbacks the engine makes into the embedding application
pub trait Host: Sized {
    /// Apply a mode-register write. Hosts that run timers on another
    /// timeline can defer this; the default applies it immediately.
    fn sync_mode_write<R: Registers>(&mut self, core: &mut FmCore<R>, data: u8) {
        core.mode_write(self, data);
    }

    /// Recompute the IRQ line. The default does so immediately.
    fn sync_check_interrupts<R: Registers>(&mut self, core: &mut FmCore<R>) {
        core.check_interrupts(self);
    }

    /// Arm timer `tnum` to expire after `duration_in_clocks` input clocks,
    /// or cancel it if the duration is negative
    fn set_timer(&mut self, _tnum: u32, _duration_in_clocks: i32) {}

    /// Mark the chip busy for the next `clocks` input clocks
    fn set_busy_end(&mut self, _clocks: u32) {}

    /// Chip is inside a busy window
    fn is_busy(&self) -> bool {
        false
    }

    /// IRQ line changed state
    fn update_irq(&mut self, _asserted: bool) {}

    /// Read a byte of external memory
    fn external_read(&mut self, _class: AccessClass, _address: u32) -> u8 {
        0
    }

    /// Write a byte of external memory or output pins
    fn external_write(&mut self, _class: AccessClass, _address: u32, _data: u8) {}
}

/// Host that ignores timers, busy state and IRQs
#[derive(Clone, Copy, Debug, Default)]
pub struct NullHost;

impl Host for NullHost {}

/// Reference host that counts down timers and the busy window in input
/// clocks and records IRQ edges
#[derive(Clone, Debug, Default)]
pub struct ClockedHost {
    timers: [Option<u32>; 2],
    expirations: [u32; 2],
    busy_clocks: u32,
    irq: bool,
    irq_edges: u32,
    io_pins: u8,
    defer_mode_writes: bool,
    pending_mode_writes: Vec<u8>,
}

impl ClockedHost {
    /// Host that applies mode writes immediately
    pub fn new() -> Self {
        Self::default()
    }

    /// Host that queues mode writes until [`take_pending_mode_writes`]
    ///
    /// [`take_pending_mode_writes`]: Self::take_pending_mode_writes
    pub fn deferring() -> Self {
        Self {
            defer_mode_writes: true,
            ..Self::default()
        }
    }

    /// Advance by `clocks` input clocks. Returns which timers reached zero;
    /// the caller hands those back to the engine, which re-arms them.
    pub fn advance(&mut self, clocks: u32) -> [bool; 2] {
        self.busy_clocks = self.busy_clocks.saturating_sub(clocks);

        let mut fired = [false; 2];
        for (tnum, timer) in self.timers.iter_mut().enumerate() {
            if let Some(remaining) = timer {
                if clocks >= *remaining {
                    *timer = None;
                    fired[tnum] = true;
                    self.expirations[tnum] += 1;
                    trace!("host timer {} expired", tnum);
                } else {
                    *remaining -= clocks;
                }
            }
        }
        fired
    }

    /// Clocks left on timer `tnum`, if armed
    pub fn timer_remaining(&self, tnum: usize) -> Option<u32> {
        self.timers.get(tnum).copied().flatten()
    }

    /// Clocks until the nearest armed timer expires
    pub fn next_expiry(&self) -> Option<u32> {
        self.timers.iter().flatten().copied().min()
    }

    /// Number of times timer `tnum` has expired
    pub fn expirations(&self, tnum: usize) -> u32 {
        self.expirations.get(tnum).copied().unwrap_or(0)
    }

    /// Current IRQ line state
    pub fn irq(&self) -> bool {
        self.irq
    }

    /// Number of IRQ line changes seen
    pub fn irq_edges(&self) -> u32 {
        self.irq_edges
    }

    /// Last value written to the output pins
    pub fn io_pins(&self) -> u8 {
        self.io_pins
    }

    /// Drain mode writes queued by a deferring host
    pub fn take_pending_mode_writes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending_mode_writes)
    }
}

impl Host for ClockedHost {
    fn sync_mode_write<R: Registers>(&mut self, core: &mut FmCore<R>, data: u8) {
        if self.defer_mode_writes {
            self.pending_mode_writes.push(data);
        } else {
            core.mode_write(self, data);
        }
    }

    fn set_timer(&mut self, tnum: u32, duration_in_clocks: i32) {
        if let Some(timer) = self.timers.get_mut(tnum as usize) {
            *timer = u32::try_from(duration_in_clocks).ok();
        }
    }

    fn set_busy_end(&mut self, clocks: u32) {
        self.busy_clocks = clocks;
    }

    fn is_busy(&self) -> bool {
        self.busy_clocks > 0
    }

    fn update_irq(&mut self, asserted: bool) {
        if asserted != self.irq {
            self.irq = asserted;
            self.irq_edges += 1;
        }
    }

    fn external_write(&mut self, class: AccessClass, _address: u32, data: u8) {
        if class == AccessClass::Io {
            self.io_pins = data;
        }
    }
}
