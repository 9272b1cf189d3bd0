//! Checksum for timecode units.
//!
//! Every set bit `p` of the 24-bit frame field (bit 0 is the LSB) contributes
//! `(p + 1) mod 256`. The contributions are XORed together and the result is
//! XORed with the low byte of the frame index.
//!
//! The per-position fold is table driven, one lookup per byte of the frame field.

/// Number of bytes in the frame field.
pub const FRAME_FIELD_BYTES: usize = 3;

/// XOR of `(p + 1)` over every set bit `p` below `len`.
#[inline(always)]
pub const fn position_xor(value: u32, len: usize) -> u8 {
    let mut acc = 0u8;
    let mut p = 0;
    while p < len {
        if (value >> p) & 1 != 0 {
            acc ^= ((p + 1) & 0xff) as u8;
        }
        p += 1;
    }

    acc
}

#[inline(always)]
const fn position_table(byte: usize) -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < table.len() {
        table[i] = position_xor((i as u32) << (8 * byte), 8 * (byte + 1));
        i += 1;
    }

    table
}

/// Table driven unit checksum.
#[derive(Debug)]
pub struct UnitChecksum {
    tables: [[u8; 256]; FRAME_FIELD_BYTES],
}

impl UnitChecksum {
    pub const fn new() -> Self {
        Self {
            tables: [position_table(0), position_table(1), position_table(2)],
        }
    }

    /// Computes the checksum of the low 24 bits of `index`.
    #[inline(always)]
    pub const fn compute(&self, index: u32) -> u8 {
        let mut acc = (index & 0xff) as u8;
        let mut byte = 0;
        while byte < FRAME_FIELD_BYTES {
            acc ^= self.tables[byte][((index >> (8 * byte)) & 0xff) as usize];
            byte += 1;
        }

        acc
    }
}

impl Default for UnitChecksum {
    fn default() -> Self {
        Self::new()
    }
}

pub static UNIT_CHECKSUM: UnitChecksum = UnitChecksum::new();

#[inline(always)]
pub fn unit_checksum(index: u32) -> u8 {
    UNIT_CHECKSUM.compute(index)
}
