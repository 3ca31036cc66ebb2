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

//! Four-operator connection algorithms
//!
//! Each algorithm is a packed descriptor rather than code. Operator outputs
//! are kept in an eight-slot scratch array:
//!
//! | index | value   |
//! |-------|---------|
//! | 0     | 0       |
//! | 1     | O1      |
//! | 2     | O2      |
//! | 3     | O3      |
//! | 5     | O1 + O2 |
//! | 6     | O1 + O3 |
//! | 7     | O2 + O3 |
//!
//! and the descriptor says which slot modulates operators 2-4 and which of
//! operators 1-3 are summed into the output (operator 4 always is).

use super::constants::{bit, bitfield};

/// Number of four-operator algorithms, including the aliased ones
pub const NUM_ALGORITHMS: usize = 12;

const fn algorithm(
    op2in: u16,
    op3in: u16,
    op4in: u16,
    op1out: u16,
    op2out: u16,
    op3out: u16,
) -> u16 {
    op2in | (op3in << 1) | (op4in << 4) | (op1out << 7) | (op2out << 8) | (op3out << 9)
}

const ALGORITHM_OPS: [u16; NUM_ALGORITHMS] = [
    algorithm(1, 2, 3, 0, 0, 0), //  0: O1 -> O2 -> O3 -> O4 -> out (O4)
    algorithm(0, 5, 3, 0, 0, 0), //  1: (O1 + O2) -> O3 -> O4 -> out (O4)
    algorithm(0, 2, 6, 0, 0, 0), //  2: (O1 + (O2 -> O3)) -> O4 -> out (O4)
    algorithm(1, 0, 7, 0, 0, 0), //  3: ((O1 -> O2) + O3) -> O4 -> out (O4)
    algorithm(1, 0, 3, 0, 1, 0), //  4: ((O1 -> O2) + (O3 -> O4)) -> out (O2+O4)
    algorithm(1, 1, 1, 0, 1, 1), //  5: O1 -> (O2, O3, O4) -> out (O2+O3+O4)
    algorithm(1, 0, 0, 0, 1, 1), //  6: ((O1 -> O2) + O3 + O4) -> out (O2+O3+O4)
    algorithm(0, 0, 0, 1, 1, 1), //  7: (O1 + O2 + O3 + O4) -> out (all)
    algorithm(1, 2, 3, 0, 0, 0), //  8: same as 0
    algorithm(0, 2, 3, 1, 0, 0), //  9: (O1 + (O2 -> O3 -> O4)) -> out (O1+O4)
    algorithm(1, 0, 3, 0, 1, 0), // 10: same as 4
    algorithm(0, 2, 0, 1, 0, 1), // 11: (O1 + (O2 -> O3) + O4) -> out (O1+O3+O4)
];

/// Decoded connection descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Algorithm(u16);

impl Algorithm {
    /// Look up an algorithm; codes past the table wrap like the 4-bit
    /// register field they come from
    pub fn get(index: u32) -> Self {
        Self(ALGORITHM_OPS[index as usize % NUM_ALGORITHMS])
    }

    /// Scratch slot modulating operator 2
    #[inline]
    pub fn op2_input(self) -> usize {
        bitfield(self.0, 0, 1) as usize
    }

    /// Scratch slot modulating operator 3
    #[inline]
    pub fn op3_input(self) -> usize {
        bitfield(self.0, 1, 3) as usize
    }

    /// Scratch slot modulating operator 4
    #[inline]
    pub fn op4_input(self) -> usize {
        bitfield(self.0, 4, 3) as usize
    }

    /// Operator 1 is a carrier
    #[inline]
    pub fn op1_output(self) -> bool {
        bit(self.0, 7)
    }

    /// Operator 2 is a carrier
    #[inline]
    pub fn op2_output(self) -> bool {
        bit(self.0, 8)
    }

    /// Operator 3 is a carrier
    #[inline]
    pub fn op3_output(self) -> bool {
        bit(self.0, 9)
    }
}
