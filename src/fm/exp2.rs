//! Exponential (2^-x) lookup table
//!
//! Converts a summed 5.8 attenuation back into a 13-bit linear volume.

use std::sync::OnceLock;

static POWER: OnceLock<[u16; 256]> = OnceLock::new();

/// Attenuation to linear volume conversion
pub struct Exp2;

impl Exp2 {
    fn table() -> &'static [u16; 256] {
        POWER.get_or_init(|| {
            let mut table = [0u16; 256];
            for (i, entry) in table.iter_mut().enumerate() {
                let fraction = (255 - i) as f64 / 256.0;
                *entry = ((2.0f64.powf(fraction) - 1.0) * 1024.0).round() as u16;
            }
            table
        })
    }

    /// Convert a 5.8 attenuation into a 13-bit volume. The fractional part
    /// indexes the table (with the implied leading 1 restored); the integer
    /// part is a plain right shift.
    #[inline]
    pub fn lookup(attenuation: u32) -> i32 {
        let mantissa = (u32::from(Self::table()[(attenuation & 0xff) as usize]) | 0x400) << 2;
        mantissa.checked_shr(attenuation >> 8).unwrap_or(0) as i32
    }
}
