//! Bit-level packing of timecode units.
//!
//! A unit travels as the 24-bit frame field followed by the 8-bit checksum,
//! both MSB-first. The packed form is the big-endian 4-byte word
//! `index << 8 | checksum`; the transmitted form is its 32 bits in order.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use crate::structs::format::{BITS_PER_UNIT, CHECKSUM_BITS, FRAME_BITS};

/// The 32 transmitted bits of a unit, in transmission order.
pub type UnitBits = [bool; BITS_PER_UNIT];

const UNIT_BYTES: usize = BITS_PER_UNIT / 8;

/// Packs the frame field and checksum into the 4-byte transmission word.
///
/// Fails when `index` does not fit in the frame field.
pub fn pack_word(index: u32, checksum: u8) -> io::Result<[u8; UNIT_BYTES]> {
    let mut bw = BitWriter::endian(Vec::with_capacity(UNIT_BYTES), BigEndian);
    bw.write_unsigned::<FRAME_BITS, u32>(index)?;
    bw.write_unsigned::<CHECKSUM_BITS, u8>(checksum)?;

    let bytes = bw.into_writer();
    let mut word = [0u8; UNIT_BYTES];
    word.copy_from_slice(&bytes);
    Ok(word)
}

/// Splits a 4-byte transmission word into frame field and checksum.
pub fn unpack_word(word: &[u8; UNIT_BYTES]) -> io::Result<(u32, u8)> {
    let mut br = BitReader::endian(&word[..], BigEndian);
    let index = br.read_unsigned::<FRAME_BITS, u32>()?;
    let checksum = br.read_unsigned::<CHECKSUM_BITS, u8>()?;
    Ok((index, checksum))
}

/// Expands a unit into its transmitted bit sequence.
pub fn pack_unit(index: u32, checksum: u8) -> io::Result<UnitBits> {
    let word = pack_word(index, checksum)?;
    let mut br = BitReader::endian(&word[..], BigEndian);

    let mut bits = [false; BITS_PER_UNIT];
    for bit in bits.iter_mut() {
        *bit = br.read_bit()?;
    }
    Ok(bits)
}

/// Collects a received bit sequence back into frame field and checksum.
pub fn unpack_unit(bits: &UnitBits) -> io::Result<(u32, u8)> {
    let mut bw = BitWriter::endian(Vec::with_capacity(UNIT_BYTES), BigEndian);
    for &bit in bits {
        bw.write_bit(bit)?;
    }

    let bytes = bw.into_writer();
    let mut word = [0u8; UNIT_BYTES];
    word.copy_from_slice(&bytes);
    unpack_word(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit_string(bits: &[bool]) -> String {
        bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
    }

    #[test]
    fn test_transmission_order() {
        let bits = pack_unit(12345, 60).unwrap();
        assert_eq!(bit_string(&bits[..24]), "000000000011000000111001");
        assert_eq!(bit_string(&bits[24..]), "00111100");
        assert_eq!(unpack_unit(&bits).unwrap(), (12345, 60));
    }

    #[test]
    fn test_word_layout() {
        let word = pack_word(0xABCDEF, 0x12).unwrap();
        assert_eq!(word, [0xAB, 0xCD, 0xEF, 0x12]);
        assert_eq!(unpack_word(&word).unwrap(), (0xABCDEF, 0x12));
    }

    #[test]
    fn test_oversized_index_rejected() {
        assert!(pack_word(1 << 24, 0).is_err());
    }
}
