//! Digest retrieval and nibble packing.

use crate::driver::{Driver, ProtocolError, WaitSite};
use crate::signals::{Dut, Signal};

/// Nibble samples needed for a full 256-bit digest.
pub(crate) const DIGEST_NIBBLES: usize = 64;

/// Drain the engine, request the digest stream, and sample it.
///
/// Asserts `result`, holds the setup interval, then samples `outNibble`
/// once per edge for exactly [`DIGEST_NIBBLES`] edges before deasserting.
pub(crate) fn collect_digest(
    driver: &mut Driver,
    dut: &mut dyn Dut,
) -> Result<Vec<u8>, ProtocolError> {
    let timing = driver.timing();
    driver.idle(dut, timing.block_gap)?;
    driver.wait_ready(dut, WaitSite::ResultDrain)?;

    dut.write(Signal::Result, 1);
    driver.idle(dut, timing.result_setup)?;

    let mut samples = Vec::with_capacity(DIGEST_NIBBLES);
    for _ in 0..DIGEST_NIBBLES {
        samples.push(dut.read(Signal::OutNibble) & 0x0f);
        driver.step(dut)?;
    }

    dut.write(Signal::Result, 0);
    driver.step(dut)?;

    Ok(pack_nibbles(&samples))
}

/// Pack samples pairwise: even index is the high nibble, odd the low.
///
/// A trailing unpaired sample is dropped.
pub(crate) fn pack_nibbles(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | (pair[1] & 0x0f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CancelToken;
    use crate::model::{ModelConfig, SerialSha256};
    use crate::preprocess::pad_and_split;
    use crate::scenario::Timing;
    use crate::transcript::Transcript;
    use sha2::{Digest, Sha256};

    #[test]
    fn pack_combines_pairs_high_nibble_first() {
        assert_eq!(pack_nibbles(&[0xA, 0xB, 0x0, 0x4]), vec![0xAB, 0x04]);
    }

    #[test]
    fn pack_drops_a_trailing_unpaired_sample() {
        assert_eq!(pack_nibbles(&[0x5, 0xE, 0xD]), vec![0x5E]);
        assert_eq!(pack_nibbles(&[0x7]), Vec::<u8>::new());
    }

    #[test]
    fn pack_of_empty_input_is_empty() {
        assert_eq!(pack_nibbles(&[]), Vec::<u8>::new());
    }

    fn run_full_protocol(message: &[u8]) -> String {
        let timing = Timing::default();
        let mut dut = SerialSha256::new(ModelConfig {
            result_latency: timing.result_setup,
            ..ModelConfig::default()
        });
        let mut driver = Driver::new(timing, CancelToken::new());
        let mut transcript = Transcript::new(false);

        driver.reset(&mut dut).expect("reset");
        let blocks = pad_and_split(message).expect("padding");
        driver
            .send_blocks(&mut dut, &blocks, &mut transcript)
            .expect("send blocks");
        let digest = collect_digest(&mut driver, &mut dut).expect("collect digest");
        assert_eq!(digest.len(), DIGEST_NIBBLES / 2);
        hex::encode(digest)
    }

    #[test]
    fn single_block_message_round_trips_through_the_protocol() {
        let expected = hex::encode(Sha256::digest(b"abc"));
        assert_eq!(run_full_protocol(b"abc"), expected);
    }

    #[test]
    fn reference_vector_round_trips_through_the_protocol() {
        let message: Vec<u8> = b"abcdppppefgh0000ijkl1111mnop2222qrst3333"
            .iter()
            .copied()
            .cycle()
            .take(200)
            .collect();
        assert_eq!(
            run_full_protocol(&message),
            "5ed6690f5b59d80b1b403da500a51a6f3cafe14b8d32eda1913cdd7a31e4aaad"
        );
    }

    #[test]
    fn empty_message_round_trips_through_the_protocol() {
        let expected = hex::encode(Sha256::digest(b""));
        assert_eq!(run_full_protocol(b""), expected);
    }
}
