//! OPM frequency tables
//!
//! The OPM addresses pitch by key code (block, note, 6-bit fraction) rather
//! than by frequency number. Pitch is turned into a phase step through a
//! 768-entry table covering one octave at block 7, in 1/64-semitone steps.
//! The chip only stores a frequency number for every quarter semitone and
//! fills in the 16 fractions between two of them with a shift-and-add
//! approximation, which this table reproduces.

use std::sync::OnceLock;

use super::constants::{bit, bitfield};

/// Entries per octave (12 notes x 64 fractions)
pub const STEPS_PER_OCTAVE: usize = 768;

/// Coarse detune (DT2) offsets in 1/64 semitones: 0, 600, 781 and 950 cents
pub const DETUNE2_DELTA: [i32; 4] = [0, 384, 500, 608];

// Fine detune (DT1) by 5-bit key code, for DT1 magnitudes 0-3
const DETUNE_ADJUSTMENT: [[u8; 4]; 32] = [
    [0, 0, 1, 2],
    [0, 0, 1, 2],
    [0, 0, 1, 2],
    [0, 0, 1, 2],
    [0, 1, 2, 2],
    [0, 1, 2, 3],
    [0, 1, 2, 3],
    [0, 1, 2, 3],
    [0, 1, 2, 4],
    [0, 1, 3, 4],
    [0, 1, 3, 4],
    [0, 1, 3, 5],
    [0, 2, 4, 5],
    [0, 2, 4, 6],
    [0, 2, 4, 6],
    [0, 2, 5, 7],
    [0, 2, 5, 8],
    [0, 3, 6, 8],
    [0, 3, 6, 9],
    [0, 3, 7, 10],
    [0, 4, 8, 11],
    [0, 4, 8, 12],
    [0, 4, 9, 13],
    [0, 5, 10, 14],
    [0, 5, 11, 16],
    [0, 6, 12, 17],
    [0, 6, 13, 19],
    [0, 7, 14, 20],
    [0, 8, 16, 22],
    [0, 8, 16, 22],
    [0, 8, 16, 22],
    [0, 8, 16, 22],
];

// Frequency numbers at each quarter semitone of the octave, from C#
const QUARTER_FNUM: [u32; 48] = [
    1299, 1318, 1337, 1356, // C#
    1376, 1396, 1416, 1437, // D
    1458, 1479, 1501, 1523, // D#
    1545, 1567, 1590, 1613, // E
    1637, 1660, 1685, 1709, // F
    1734, 1759, 1785, 1811, // F#
    1837, 1864, 1891, 1918, // G
    1946, 1975, 2003, 2032, // G#
    2062, 2092, 2122, 2153, // A
    2185, 2216, 2249, 2281, // A#
    2315, 2348, 2382, 2417, // B
    2452, 2488, 2524, 2561, // C
];

// frequency numbers are scaled up to block 7 phase steps
const FNUM_SHIFT: u32 = 5;

static PHASE_STEP: OnceLock<[u32; STEPS_PER_OCTAVE]> = OnceLock::new();

// Frequency number for fraction `step` (0-15) past quarter `quarter`.
// Each fraction adds one unit, or two once the gap to the next quarter
// reaches 32; the remainder of the gap is spread over the upper two
// fraction bits only.
fn interpolate(quarter: usize, step: u32) -> u32 {
    let base = QUARTER_FNUM[quarter];
    let next = QUARTER_FNUM.get(quarter + 1).copied().unwrap_or(QUARTER_FNUM[0] << 1);
    let gap = next - base;
    let unit = if gap >= 32 { 2 } else { 1 };
    base + unit * step + (((gap - 16 * unit) * (step & 12)) >> 4)
}

/// OPM pitch lookups
pub struct FreqLut;

impl FreqLut {
    /// Block 7 phase steps, one per 1/64 semitone
    pub fn phase_steps() -> &'static [u32; STEPS_PER_OCTAVE] {
        PHASE_STEP.get_or_init(|| {
            let mut table = [0u32; STEPS_PER_OCTAVE];
            for (i, entry) in table.iter_mut().enumerate() {
                *entry = interpolate(i >> 4, (i & 15) as u32) << FNUM_SHIFT;
            }
            table
        })
    }

    /// Convert a 13-bit block/key code/fraction value plus a delta in 1/64
    /// semitones into a phase step.
    ///
    /// # Arguments
    /// * `block_freq` - `BBB CCCC FFFFFF`: block, 4-bit note code, fraction
    /// * `delta` - signed offset from pitch LFO and coarse detune
    ///
    /// # Returns
    /// Phase step before fine detune and frequency multiple
    pub fn key_code_to_phase_step(block_freq: u32, delta: i32) -> u32 {
        let table = Self::phase_steps();
        let mut block = bitfield(block_freq, 10, 3);

        // the note code maps 12 notes over 16 values; squeeze out the gaps.
        // code 15 bleeds into the next octave, as on the chip
        let adjusted_code = bitfield(block_freq, 6, 4) - bitfield(block_freq, 8, 2);
        let mut eff_freq = ((adjusted_code << 6) | bitfield(block_freq, 0, 6)) as i32 + delta;

        if eff_freq < 0 {
            // PM reaches at most one octave down
            eff_freq += STEPS_PER_OCTAVE as i32;
            if block == 0 {
                return table[0] >> 7;
            }
            block -= 1;
        } else if eff_freq >= STEPS_PER_OCTAVE as i32 {
            // PM plus DT2 can reach two octaves up
            eff_freq -= STEPS_PER_OCTAVE as i32;
            if eff_freq >= STEPS_PER_OCTAVE as i32 {
                block += 1;
                eff_freq -= STEPS_PER_OCTAVE as i32;
            }
            if block >= 7 {
                return table[STEPS_PER_OCTAVE - 1];
            }
            block += 1;
        }

        table[eff_freq as usize] >> (block ^ 7)
    }

    /// Signed fine detune for a 3-bit DT1 value at a 5-bit key code
    pub fn detune_adjustment(detune: u32, keycode: u32) -> i32 {
        let result = i32::from(DETUNE_ADJUSTMENT[(keycode & 31) as usize][(detune & 3) as usize]);
        if bit(detune, 2) {
            -result
        } else {
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE_RATE: f64 = 3_579_545.0 / 64.0;

    fn hz(step: u32) -> f64 {
        f64::from(step) * NATIVE_RATE / f64::from(1u32 << 20)
    }

    #[test]
    fn test_first_row_matches_chip() {
        let expected: [u32; 16] = [
            41568, 41600, 41632, 41664, 41696, 41728, 41760, 41792, 41856, 41888, 41920, 41952, 42016,
            42048, 42080, 42112,
        ];
        assert_eq!(&FreqLut::phase_steps()[..16], &expected);
        assert_eq!(FreqLut::phase_steps()[16], 1318 << 5);
        assert_eq!(FreqLut::phase_steps()[52], 1361 << 5);
    }

    #[test]
    fn test_quarters_hit_stored_numbers() {
        let table = FreqLut::phase_steps();
        for (quarter, fnum) in QUARTER_FNUM.iter().enumerate() {
            assert_eq!(table[quarter * 16], fnum << 5, "quarter {}", quarter);
        }
        assert!(table.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(table[767] < QUARTER_FNUM[0] << 6);
    }

    #[test]
    fn test_a4_step_exact() {
        // A is adjusted code 8, so index 512, quarter 32
        let step = FreqLut::key_code_to_phase_step((4 << 10) | (0xa << 6), 0);
        assert_eq!(step, 8248);
    }

    #[test]
    fn test_a4() {
        // block 4, note code 0xa (A), no fraction
        let block_freq = (4 << 10) | (0xa << 6);
        let step = FreqLut::key_code_to_phase_step(block_freq, 0);
        assert!((hz(step) - 440.0).abs() < 0.5, "got {} Hz", hz(step));
    }

    #[test]
    fn test_octave_doubles() {
        let low = FreqLut::key_code_to_phase_step((3 << 10) | (0x4 << 6), 0);
        let high = FreqLut::key_code_to_phase_step((4 << 10) | (0x4 << 6), 0);
        assert!((i64::from(high) - 2 * i64::from(low)).abs() <= 1);
    }

    #[test]
    fn test_delta_crosses_octave() {
        let base = (3 << 10) | (0xe << 6) | 0x3f;
        let up = FreqLut::key_code_to_phase_step(base, 1);
        let next_octave = FreqLut::key_code_to_phase_step(4 << 10, 0);
        assert_eq!(up, next_octave);

        let down = FreqLut::key_code_to_phase_step(4 << 10, -1);
        assert_eq!(down, FreqLut::phase_steps()[767] >> 4);
    }

    #[test]
    fn test_range_clamps() {
        let top = (7 << 10) | (0xe << 6) | 0x3f;
        assert_eq!(FreqLut::key_code_to_phase_step(top, 608 + 512), FreqLut::phase_steps()[767]);
        assert_eq!(FreqLut::key_code_to_phase_step(0, -512), FreqLut::phase_steps()[0] >> 7);
    }

    #[test]
    fn test_detune_sign() {
        assert_eq!(FreqLut::detune_adjustment(3, 31), 22);
        assert_eq!(FreqLut::detune_adjustment(7, 31), -22);
        assert_eq!(FreqLut::detune_adjustment(0, 20), 0);
        assert_eq!(FreqLut::detune_adjustment(4, 20), 0);
    }
}
