//! Per-sample output frame

/// One sample of output, one signed value per output bus
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFrame<const N: usize> {
    /// Bus values
    pub data: [i32; N],
}

impl<const N: usize> Default for OutputFrame<N> {
    fn default() -> Self {
        Self { data: [0; N] }
    }
}

impl<const N: usize> OutputFrame<N> {
    /// Zero every bus
    #[inline]
    pub fn clear(&mut self) -> &mut Self {
        self.data = [0; N];
        self
    }

    /// Clamp every bus to 16 bits and pass it through the YM3012 DAC's
    /// 10.3 floating point format
    pub fn roundtrip_fp(&mut self) -> &mut Self {
        for value in self.data.iter_mut() {
            *value = i32::from(roundtrip_fp(*value));
        }
        self
    }
}

/// Truncate a sample to the precision of a 10-bit mantissa, 3-bit exponent
/// DAC
pub fn roundtrip_fp(value: i32) -> i16 {
    let value = value.clamp(i32::from(i16::MIN), i32::from(i16::MAX));

    // count redundant sign bits below bit 15
    let scan = value ^ (value >> 31);
    let exponent = (7 - ((scan as u32) << 17).leading_zeros() as i32).max(1) - 1;

    let mask = (1i32 << exponent) - 1;
    (value & !mask) as i16
}
