use crate::structs::format::{FRAME_BITS, MAX_FRAME_INDEX};
use crate::utils::bitstream_io::{UnitBits, pack_unit};
use crate::utils::checksum::unit_checksum;
use crate::utils::errors::RangeError;

/// A frame index with its checksum, ready for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedUnit {
    index: u32,
    checksum: u8,
    bits: UnitBits,
}

impl EncodedUnit {
    pub fn new(index: u64) -> Result<Self, RangeError> {
        let out_of_range = || RangeError::FrameIndexOutOfRange {
            index,
            max: MAX_FRAME_INDEX,
        };

        let index = u32::try_from(index)
            .ok()
            .filter(|&i| i <= MAX_FRAME_INDEX)
            .ok_or_else(out_of_range)?;
        let checksum = unit_checksum(index);
        let bits = pack_unit(index, checksum).map_err(|_| out_of_range())?;

        Ok(Self {
            index,
            checksum,
            bits,
        })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Word form: index in the low 24 bits, checksum in the high 8.
    pub fn word(&self) -> u32 {
        ((self.checksum as u32) << FRAME_BITS) | self.index
    }

    /// Bits in transmission order.
    pub fn bits(&self) -> &UnitBits {
        &self.bits
    }
}

#[test]
fn test_encoded_unit_word() {
    let unit = EncodedUnit::new(12345).unwrap();
    assert_eq!(unit.index(), 12345);
    assert_eq!(unit.checksum(), 60);
    assert_eq!(unit.word(), (60 << 24) | 12345);
    assert!(EncodedUnit::new(MAX_FRAME_INDEX as u64).is_ok());
    assert_eq!(
        EncodedUnit::new(1 << 24),
        Err(RangeError::FrameIndexOutOfRange {
            index: 1 << 24,
            max: MAX_FRAME_INDEX
        })
    );
}
