//! Logarithmic quarter-wave sine table
//!
//! The chip never multiplies: a sine sample is stored as its attenuation
//! (-log2 of the amplitude) in 4.8 fixed point, summed with the envelope
//! attenuation and only then converted back to a linear value by
//! [`Exp2`](super::exp2::Exp2).

use std::sync::OnceLock;

use super::constants::{bit, WAVEFORM_LENGTH};

const QUARTER_LENGTH: usize = 256;

/// Sign flag stored in bit 15 of a waveform entry
pub const SIGN_BIT: u16 = 0x8000;

static QUARTER: OnceLock<[u16; QUARTER_LENGTH]> = OnceLock::new();
static FULL: OnceLock<[u16; WAVEFORM_LENGTH]> = OnceLock::new();

/// Log-sine lookups
pub struct Sin;

impl Sin {
    fn quarter() -> &'static [u16; QUARTER_LENGTH] {
        QUARTER.get_or_init(|| {
            let mut table = [0u16; QUARTER_LENGTH];
            for (i, entry) in table.iter_mut().enumerate() {
                // sample at the middle of each step, as the die ROM does
                let angle = (i as f64 + 0.5) * std::f64::consts::PI / 512.0;
                let attenuation = -angle.sin().log2() * 256.0;
                *entry = attenuation.round() as u16;
            }
            table
        })
    }

    /// Absolute sine of a 10-bit phase as a 4.8 attenuation; the second
    /// quarter of each half-period is mirrored from the first.
    #[inline]
    pub fn abs_attenuation(phase: u32) -> u16 {
        let index = if bit(phase, 8) { !phase } else { phase };
        Self::quarter()[(index & 0xff) as usize]
    }

    /// Full-period sine waveform: 4.8 attenuation in the low bits plus
    /// [`SIGN_BIT`] for the negative half.
    pub fn waveform() -> &'static [u16; WAVEFORM_LENGTH] {
        FULL.get_or_init(|| {
            let mut table = [0u16; WAVEFORM_LENGTH];
            for (i, entry) in table.iter_mut().enumerate() {
                let sign = if bit(i as u32, 9) { SIGN_BIT } else { 0 };
                *entry = Self::abs_attenuation(i as u32) | sign;
            }
            table
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_endpoints() {
        // values read from the die: near-zero angle is heavily attenuated,
        // the peak is not attenuated at all
        assert_eq!(Sin::abs_attenuation(0), 0x859);
        assert_eq!(Sin::abs_attenuation(0xff), 0);
    }

    #[test]
    fn test_mirrored_quarters() {
        for i in 0..256u32 {
            assert_eq!(Sin::abs_attenuation(i), Sin::abs_attenuation(0x1ff - i));
        }
    }

    #[test]
    fn test_waveform_sign() {
        let wave = Sin::waveform();
        assert_eq!(wave[0x100] & SIGN_BIT, 0);
        assert_eq!(wave[0x300] & SIGN_BIT, SIGN_BIT);
        assert_eq!(wave[0x000] & !SIGN_BIT, wave[0x200] & !SIGN_BIT);
    }
}
