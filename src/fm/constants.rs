//! Core constants and bit helpers shared by the FM engine

use num_traits::PrimInt;

/// Number of entries in a waveform table (one full period)
pub const WAVEFORM_LENGTH: usize = 0x400;

/// Maximum envelope attenuation (fully silent)
pub const EG_MAX: u16 = 0x3ff;

/// Attenuation past which an operator is considered inaudible
pub const EG_QUIET: u16 = 0x200;

/// Attenuation at which release hands over to reverb (-18dB)
pub const EG_REVERB_THRESHOLD: u16 = 0xc0;

/// Mask for the 20-bit (10.10) phase accumulator
pub const PHASE_MASK: u32 = (1 << 20) - 1;

/// Number of clocks between forced re-preparation sweeps
pub const PREPARE_INTERVAL: u32 = 4096;

/// Extract `length` bits of `value` starting at bit `start`
#[inline]
pub fn bitfield<T: PrimInt>(value: T, start: usize, length: usize) -> T {
    let width = T::zero().count_zeros() as usize;
    let shifted = value.unsigned_shr(start as u32);
    if length >= width {
        shifted
    } else {
        shifted & ((T::one() << length) - T::one())
    }
}

/// Test a single bit of `value`
#[inline]
pub fn bit<T: PrimInt>(value: T, index: usize) -> bool {
    bitfield(value, index, 1) != T::zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitfield() {
        assert_eq!(bitfield(0b1011_0110u32, 1, 3), 0b011);
        assert_eq!(bitfield(0xabcdu16, 8, 8), 0xab);
        assert_eq!(bitfield(0x80u8, 7, 1), 1);
        assert_eq!(bitfield(0xffff_ffffu32, 0, 32), 0xffff_ffff);
    }

    #[test]
    fn test_bit() {
        assert!(bit(0x200u32, 9));
        assert!(!bit(0x200u32, 8));
    }
}
