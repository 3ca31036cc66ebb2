//! FM synthesis engine
//!
//! The engine is split the way the chip is: shared tables, operators,
//! channels that connect them, a [`Registers`] family that decodes the
//! register file, and [`FmCore`] which clocks everything one sample at a
//! time.

pub mod algorithms;
pub mod cache;
pub mod channel;
pub mod constants;
pub mod env;
pub mod exp2;
pub mod fm_core;
pub mod freqlut;
pub mod operator;
pub mod opm;
pub mod output;
pub mod registers;
pub mod sin;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::Channel;
pub use env::EnvelopeState;
pub use fm_core::FmCore;
pub use operator::{KeyOnType, Operator};
pub use opm::OpmRegisters;
pub use output::{roundtrip_fp, OutputFrame};
pub use registers::{KeyOn, OperatorList, Registers};
