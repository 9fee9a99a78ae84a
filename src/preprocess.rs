//! SHA-256 message preprocessing: padding and block parsing.

use std::fmt;

/// Bytes per 512-bit message block.
pub(crate) const BLOCK_BYTES: usize = 64;

/// Nibbles transferred per block.
pub(crate) const BLOCK_NIBBLES: usize = BLOCK_BYTES * 2;

/// A single 512-bit chunk of the padded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block(pub(crate) [u8; BLOCK_BYTES]);

impl Block {
    /// Nibbles in wire order: high nibble of each byte first.
    pub(crate) fn nibbles(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().flat_map(|byte| [byte >> 4, byte & 0x0f])
    }
}

/// The padded message missed the 512-bit boundary.
///
/// Internal consistency failure: unreachable for any byte input, but checked
/// explicitly rather than assumed.
#[derive(Debug)]
pub(crate) struct PaddingInvariant {
    pub(crate) padded_bits: usize,
}

impl fmt::Display for PaddingInvariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "padded message is {} bits, not a multiple of 512",
            self.padded_bits
        )
    }
}

impl std::error::Error for PaddingInvariant {}

/// Pad `message` per FIPS 180-4 and split it into 64-byte blocks.
///
/// Appends the 0x80 terminator, zero-fills until the length field lands on a
/// 512-bit boundary, then appends the original bit length as a big-endian
/// u64. The zero-fill is a modulo loop, so a message with no room left in
/// its final block spills into an extra one.
pub(crate) fn pad_and_split(message: &[u8]) -> Result<Vec<Block>, PaddingInvariant> {
    let bit_len = (message.len() as u64).wrapping_mul(8);

    let mut padded = Vec::with_capacity(message.len() + BLOCK_BYTES + 9);
    padded.extend_from_slice(message);
    padded.push(0x80);
    while (padded.len() * 8 + 64) % 512 != 0 {
        padded.push(0x00);
    }
    padded.extend_from_slice(&bit_len.to_be_bytes());

    if (padded.len() * 8) % 512 != 0 {
        return Err(PaddingInvariant {
            padded_bits: padded.len() * 8,
        });
    }

    Ok(padded
        .chunks_exact(BLOCK_BYTES)
        .map(|chunk| {
            let mut block = [0u8; BLOCK_BYTES];
            block.copy_from_slice(chunk);
            Block(block)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_bytes(blocks: &[Block]) -> usize {
        blocks.len() * BLOCK_BYTES
    }

    fn length_field(blocks: &[Block]) -> u64 {
        let last = blocks.last().expect("at least one block");
        let mut field = [0u8; 8];
        field.copy_from_slice(&last.0[BLOCK_BYTES - 8..]);
        u64::from_be_bytes(field)
    }

    #[test]
    fn output_is_block_aligned_for_many_lengths() {
        for len in [0usize, 1, 3, 55, 56, 57, 63, 64, 119, 120, 200, 512] {
            let message = vec![0xA5u8; len];
            let blocks = pad_and_split(&message).expect("padding");
            assert_eq!(total_bytes(&blocks) % BLOCK_BYTES, 0, "len {len}");
            assert!(!blocks.is_empty(), "len {len}");
        }
    }

    #[test]
    fn length_field_is_big_endian_bit_count() {
        for len in [0usize, 1, 55, 56, 64, 200] {
            let message = vec![0x5Au8; len];
            let blocks = pad_and_split(&message).expect("padding");
            assert_eq!(length_field(&blocks), (len as u64) * 8, "len {len}");
        }
    }

    #[test]
    fn empty_message_is_one_terminator_block() {
        let blocks = pad_and_split(&[]).expect("padding");
        assert_eq!(blocks.len(), 1);
        let block = blocks[0].0;
        assert_eq!(block[0], 0x80);
        assert!(block[1..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn fifty_six_byte_message_spills_into_second_block() {
        // 56 bytes leaves no room for the terminator plus the length field.
        let blocks = pad_and_split(&[0x61u8; 56]).expect("padding");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].0[56], 0x80);
        assert_eq!(length_field(&blocks), 56 * 8);
    }

    #[test]
    fn one_block_message_stays_one_block_until_the_spill_point() {
        assert_eq!(pad_and_split(&[0u8; 55]).unwrap().len(), 1);
        assert_eq!(pad_and_split(&[0u8; 56]).unwrap().len(), 2);
    }

    #[test]
    fn reference_vector_parses_into_four_blocks() {
        let message: Vec<u8> = b"abcdppppefgh0000ijkl1111mnop2222qrst3333"
            .iter()
            .copied()
            .cycle()
            .take(200)
            .collect();
        let blocks = pad_and_split(&message).expect("padding");
        assert_eq!(blocks.len(), 4);
        assert_eq!(length_field(&blocks), 1600);
    }

    #[test]
    fn nibble_order_is_high_first() {
        let mut bytes = [0u8; BLOCK_BYTES];
        bytes[0] = 0xAB;
        bytes[1] = 0x04;
        let block = Block(bytes);
        let nibbles: Vec<u8> = block.nibbles().collect();
        assert_eq!(nibbles.len(), BLOCK_NIBBLES);
        assert_eq!(&nibbles[..4], &[0xA, 0xB, 0x0, 0x4]);
    }
}
