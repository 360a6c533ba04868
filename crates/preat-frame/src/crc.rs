/// CRC-16 parameters shared by the target and the host tool.
///
/// The checksum is computed MSB-first with no input/output reflection and no
/// final XOR. Appending the checksum big-endian to a frame makes the checksum
/// of the extended frame zero, which is how received frames are validated.
///
/// The defaults reproduce the frames produced by the reference host tool;
/// both sides of a deployment must agree on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    /// Generator polynomial (implicit x^16 term omitted).
    pub poly: u16,
    /// Initial register value.
    pub init: u16,
}

impl Crc16 {
    /// Parameters used by the reference host tool.
    pub const DEFAULT: Crc16 = Crc16 {
        poly: 0xD175,
        init: 0x0000,
    };

    pub const fn new(poly: u16, init: u16) -> Self {
        Self { poly, init }
    }

    /// Checksum of `data`.
    pub fn checksum(&self, data: &[u8]) -> u16 {
        let mut crc = self.init;
        for &byte in data {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ self.poly
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    /// Residue of a frame that already ends with its checksum; zero when intact.
    pub fn residue(&self, frame_with_crc: &[u8]) -> u16 {
        self.checksum(frame_with_crc)
    }

    /// Write the checksum of `buf[..len]` into `buf[len..len + 2]`.
    ///
    /// `buf` must hold at least `len + 2` bytes.
    pub fn append(&self, buf: &mut [u8], len: usize) {
        let crc = self.checksum(&buf[..len]);
        buf[len..len + 2].copy_from_slice(&crc.to_be_bytes());
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn ack_header_checksum_matches_reference() {
        assert_eq!(Crc16::DEFAULT.checksum(&[0x05, 0x00, 0x00]), 0xa1b5);
    }

    #[test]
    fn reference_frames_have_zero_residue() {
        let frames: [&[u8]; 5] = [
            &[0x07, 0x01, 0x01, 0x10, 0x01, 0xb5, 0xa3],
            &[0x07, 0x02, 0x01, 0x10, 0x01, 0xa2, 0xcf],
            &[0x05, 0x01, 0x00, 0xe2, 0x7f],
            &[0x08, 0x01, 0x02, 0x11, 0x01, 0x02, 0x3b, 0x88],
            &[0x07, 0x00, 0x11, 0x10, 0x02, 0x6e, 0xe2],
        ];
        for frame in frames {
            assert_eq!(Crc16::DEFAULT.residue(frame), 0, "frame {frame:02x?}");
        }
    }

    #[test]
    fn corrupted_checksum_is_nonzero() {
        let frame = [0x07, 0x01, 0x01, 0x10, 0x01, 0xb5, 0x00];
        assert_ne!(Crc16::DEFAULT.residue(&frame), 0);
    }

    #[test]
    fn custom_parameters_change_the_checksum() {
        let ccitt = Crc16::new(0x1021, 0xFFFF);
        assert_eq!(ccitt.checksum(b"123456789"), 0x29b1);
        assert_ne!(ccitt.checksum(&[0x05, 0x00, 0x00]), 0xa1b5);
    }

    proptest! {
        #[test]
        fn appended_checksum_validates(payload in proptest::collection::vec(any::<u8>(), 1..60)) {
            let mut buf = payload.clone();
            buf.extend_from_slice(&[0, 0]);
            Crc16::DEFAULT.append(&mut buf, payload.len());
            prop_assert_eq!(Crc16::DEFAULT.residue(&buf), 0);
        }

        #[test]
        fn any_single_bit_flip_is_detected(
            payload in proptest::collection::vec(any::<u8>(), 1..60),
            bit in any::<prop::sample::Index>(),
        ) {
            let mut buf = payload.clone();
            buf.extend_from_slice(&[0, 0]);
            Crc16::DEFAULT.append(&mut buf, payload.len());

            let bit = bit.index(payload.len() * 8);
            buf[bit / 8] ^= 0x80 >> (bit % 8);
            prop_assert_ne!(Crc16::DEFAULT.residue(&buf), 0);
        }
    }
}
