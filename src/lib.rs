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

//! Sample-accurate Yamaha YM2151 (OPM) FM synthesis engine.
//!
//! The engine is driven the way the chip is: by register writes. Each call
//! to [`Ym2151::generate`] advances the chip by one output sample and
//! produces a stereo frame that matches the hardware bit for bit. Timers,
//! the busy flag and the IRQ line are handed to a [`Host`] so the
//! embedding application decides how time passes.
//!
//! ```
//! use ymopm::{EngineConfig, NullHost, OutputFrame, Ym2151};
//!
//! let mut chip = Ym2151::new(NullHost, EngineConfig::default());
//! chip.write_register(0x20, 0xc7).unwrap(); // both outputs, algorithm 7
//! chip.write_register(0x08, 0x78).unwrap(); // key on all operators of channel 0
//!
//! let mut frames = [OutputFrame::default(); 64];
//! chip.generate(&mut frames);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod fm;
pub mod host;
pub mod state;
pub mod ym2151;

/// Largest number of output buses any register family may declare
pub const MAX_OUTPUTS: usize = 4;

pub use config::{EngineConfig, IrqResetPolicy, ModeResetValue, NoiseAmPolicy};
pub use error::{Error, Result};
pub use fm::{EnvelopeState, FmCore, OpmRegisters, OutputFrame, Registers};
pub use host::{AccessClass, ClockedHost, Host, NullHost};
pub use state::SavedState;
pub use ym2151::Ym2151;
