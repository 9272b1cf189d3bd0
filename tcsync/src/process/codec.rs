use crate::process::RejectReason;
use crate::process::synth::ToneSynthesizer;
use crate::structs::unit::EncodedUnit;
use crate::utils::bitstream_io::{UnitBits, unpack_unit};
use crate::utils::checksum::unit_checksum;
use crate::utils::errors::RangeError;

/// Frame index to checksummed unit and back.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn encode(&self, frame_index: u64) -> Result<EncodedUnit, RangeError> {
        EncodedUnit::new(frame_index)
    }

    /// Encodes `count` consecutive frame ids starting at `first_id` and renders them
    /// on the unit grid starting at grid unit `first_unit`.
    pub fn encode_audio(
        &self,
        synth: &ToneSynthesizer,
        first_id: u64,
        count: u64,
        first_unit: u64,
    ) -> Result<Vec<f32>, RangeError> {
        let units = (first_id..first_id + count)
            .map(|id| self.encode(id))
            .collect::<Result<Vec<_>, _>>()?;
        synth.render_units(&units, first_unit)
    }

    /// Validates received bits.
    ///
    /// Ids at or above `limit` are rejected as implausible for the current window.
    pub fn decode_checked(&self, bits: &UnitBits, limit: Option<u32>) -> Result<u32, RejectReason> {
        let (index, checksum) = unpack_unit(bits).map_err(|_| RejectReason::Checksum)?;

        if unit_checksum(index) != checksum {
            return Err(RejectReason::Checksum);
        }
        if limit.is_some_and(|limit| index >= limit) {
            return Err(RejectReason::Implausible);
        }

        Ok(index)
    }

    pub fn decode(&self, bits: &UnitBits, limit: Option<u32>) -> Option<u32> {
        self.decode_checked(bits, limit).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::format::MAX_FRAME_INDEX;

    #[test]
    fn test_roundtrip_sampled() {
        let codec = FrameCodec;
        let samples = (0..=MAX_FRAME_INDEX as u64)
            .step_by(104_729)
            .chain([0, 1, 2, 255, 256, 65535, 65536, MAX_FRAME_INDEX as u64]);
        for index in samples {
            let unit = codec.encode(index).unwrap();
            assert_eq!(codec.decode(unit.bits(), None), Some(index as u32));
        }
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            FrameCodec.encode(1 << 24),
            Err(RangeError::FrameIndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_single_bit_flip_rejected() {
        let codec = FrameCodec;
        for index in (0..=MAX_FRAME_INDEX as u64).step_by(524_287) {
            let unit = codec.encode(index).unwrap();
            for flip in 0..32 {
                let mut bits = *unit.bits();
                bits[flip] = !bits[flip];
                let decoded = codec.decode_checked(&bits, None);

                // Index bits 0 and 1 (sent at positions 23 and 22) contribute the same
                // value to the position term and the low byte, so flipping them yields
                // another valid unit.
                if flip == 22 || flip == 23 {
                    let other = index as u32 ^ (1 << (23 - flip));
                    assert_eq!(decoded, Ok(other), "index {index} flip {flip}");
                } else {
                    assert_eq!(
                        decoded,
                        Err(RejectReason::Checksum),
                        "index {index} flip {flip}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_implausible_rejected() {
        let codec = FrameCodec;
        let unit = codec.encode(939).unwrap();
        assert_eq!(
            codec.decode_checked(unit.bits(), Some(939)),
            Err(RejectReason::Implausible)
        );
        assert_eq!(codec.decode(unit.bits(), Some(940)), Some(939));
    }
}
