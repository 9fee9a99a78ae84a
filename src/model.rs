//! Clock-driven reference model of a correct nibble-serial SHA-256 engine.
//!
//! The model captures input nibbles on the rising edge of `inputReady`,
//! compresses each assembled 64-byte block, and holds `busy` for a fixed
//! processing latency. The compression arithmetic itself is delegated to
//! `sha2`; the engine under model only sequences blocks, it never pads, so
//! it runs the raw compression function over whatever blocks it is fed.

use sha2::compress256;
use sha2::digest::generic_array::GenericArray;

use crate::collector::DIGEST_NIBBLES;
use crate::preprocess::{BLOCK_BYTES, BLOCK_NIBBLES};
use crate::signals::{Dut, Signal};

/// SHA-256 initial hash state (FIPS 180-4, 5.3.3).
const SHA256_INIT: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Edges the engine stays busy after absorbing a block.
const DEFAULT_BLOCK_LATENCY: u64 = 40;

/// Edges between asserting `result` and the first valid digest nibble.
const DEFAULT_RESULT_LATENCY: u64 = 2;

/// Construction-time knobs for the reference engine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ModelConfig {
    pub(crate) block_latency: u64,
    pub(crate) result_latency: u64,
    /// Fault injection: hold `busy` asserted forever.
    pub(crate) stuck_busy: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            block_latency: DEFAULT_BLOCK_LATENCY,
            result_latency: DEFAULT_RESULT_LATENCY,
            stuck_busy: false,
        }
    }
}

/// In-process stand-in for the external hashing engine.
pub(crate) struct SerialSha256 {
    config: ModelConfig,

    state: [u32; 8],
    nibbles: Vec<u8>,
    busy_edges: u64,
    digest_nibbles: Option<[u8; DIGEST_NIBBLES]>,
    result_edges: u64,
    out_nibble: u8,

    // Input lines as last driven by the harness.
    rst: u8,
    in_nibble: u8,
    input_ready: u8,
    result: u8,
    prev_input_ready: bool,
}

impl SerialSha256 {
    pub(crate) fn new(config: ModelConfig) -> Self {
        SerialSha256 {
            config,
            state: SHA256_INIT,
            nibbles: Vec::with_capacity(BLOCK_NIBBLES),
            busy_edges: 0,
            digest_nibbles: None,
            result_edges: 0,
            out_nibble: 0,
            rst: 0,
            in_nibble: 0,
            input_ready: 0,
            result: 0,
            prev_input_ready: false,
        }
    }

    fn clear(&mut self) {
        self.state = SHA256_INIT;
        self.nibbles.clear();
        self.busy_edges = 0;
        self.digest_nibbles = None;
        self.result_edges = 0;
        self.out_nibble = 0;
        self.prev_input_ready = false;
    }

    /// Record one strobed nibble; a complete block triggers compression.
    fn absorb(&mut self, nibble: u8) {
        self.nibbles.push(nibble);
        if self.nibbles.len() < BLOCK_NIBBLES {
            return;
        }

        let mut block = [0u8; BLOCK_BYTES];
        for (byte, pair) in block.iter_mut().zip(self.nibbles.chunks_exact(2)) {
            *byte = (pair[0] << 4) | pair[1];
        }
        compress256(
            &mut self.state,
            &[GenericArray::clone_from_slice(&block)],
        );

        self.nibbles.clear();
        self.digest_nibbles = None;
        self.busy_edges = self.config.block_latency;
    }

    fn digest_nibbles(state: &[u32; 8]) -> [u8; DIGEST_NIBBLES] {
        let mut nibbles = [0u8; DIGEST_NIBBLES];
        for (word_index, word) in state.iter().enumerate() {
            for (byte_index, byte) in word.to_be_bytes().iter().enumerate() {
                let at = (word_index * 4 + byte_index) * 2;
                nibbles[at] = byte >> 4;
                nibbles[at + 1] = byte & 0x0f;
            }
        }
        nibbles
    }
}

impl Dut for SerialSha256 {
    fn read(&self, signal: Signal) -> u8 {
        match signal {
            Signal::Busy => (self.config.stuck_busy || self.busy_edges > 0) as u8,
            Signal::OutNibble => self.out_nibble,
            Signal::Rst => self.rst,
            Signal::InNibble => self.in_nibble,
            Signal::InputReady => self.input_ready,
            Signal::Result => self.result,
        }
    }

    fn write(&mut self, signal: Signal, value: u8) {
        debug_assert!(
            signal.harness_driven(),
            "engine-driven line written by harness: {signal:?}"
        );
        match signal {
            Signal::Rst => self.rst = value & 1,
            Signal::InNibble => self.in_nibble = value & 0x0f,
            Signal::InputReady => self.input_ready = value & 1,
            Signal::Result => self.result = value & 1,
            Signal::Busy | Signal::OutNibble => {}
        }
    }

    fn tick(&mut self) {
        if self.rst != 0 {
            self.clear();
            return;
        }

        let strobed = self.input_ready != 0 && !self.prev_input_ready;
        self.prev_input_ready = self.input_ready != 0;
        if strobed {
            self.absorb(self.in_nibble);
        }

        if self.busy_edges > 0 {
            self.busy_edges -= 1;
        }

        if self.result != 0 {
            self.result_edges += 1;
            let nibbles = *self
                .digest_nibbles
                .get_or_insert_with(|| Self::digest_nibbles(&self.state));
            let index = self.result_edges.saturating_sub(self.config.result_latency) as usize;
            self.out_nibble = nibbles[index.min(DIGEST_NIBBLES - 1)];
        } else {
            self.result_edges = 0;
            self.out_nibble = 0;
        }
    }
}
