//! Clock-edge protocol driver for the nibble-serial handshake.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::preprocess::{Block, BLOCK_NIBBLES};
use crate::scenario::Timing;
use crate::signals::{Dut, Signal};
use crate::transcript::Transcript;

/// Cooperative cancellation flag shared with signal handlers.
#[derive(Clone)]
pub(crate) struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub(crate) fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a bounded `busy` wait was sitting when it gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitSite {
    /// Before presenting a nibble.
    Nibble { block: usize, index: usize },
    /// Draining the engine after a block.
    BlockDrain { block: usize },
    /// Draining the engine before digest readout.
    ResultDrain,
}

impl fmt::Display for WaitSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitSite::Nibble { block, index } => write!(f, "block {block} nibble {index}"),
            WaitSite::BlockDrain { block } => write!(f, "after block {block}"),
            WaitSite::ResultDrain => write!(f, "before digest readout"),
        }
    }
}

/// Protocol-level failure while driving the engine.
#[derive(Debug)]
pub(crate) enum ProtocolError {
    /// `busy` never cleared within the cycle budget.
    Timeout {
        site: WaitSite,
        budget: u64,
        edge: u64,
    },
    /// The cancellation token was observed between steps.
    Cancelled { edge: u64 },
}

impl ProtocolError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            ProtocolError::Timeout { .. } => "protocol_timeout",
            ProtocolError::Cancelled { .. } => "cancelled",
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Timeout { site, budget, edge } => write!(
                f,
                "engine busy did not clear within {budget} edges ({site}, at edge {edge})"
            ),
            ProtocolError::Cancelled { edge } => write!(f, "run cancelled at edge {edge}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Drives the handshake one clock edge at a time.
///
/// Every wait is a counted loop of [`Driver::step`] calls; nothing blocks on
/// wall-clock time, and the cancellation token is checked before each edge.
pub(crate) struct Driver {
    timing: Timing,
    cancel: CancelToken,
    edges: u64,
}

impl Driver {
    pub(crate) fn new(timing: Timing, cancel: CancelToken) -> Self {
        Driver {
            timing,
            cancel,
            edges: 0,
        }
    }

    pub(crate) fn timing(&self) -> Timing {
        self.timing
    }

    /// Total clock edges advanced so far.
    pub(crate) fn edges(&self) -> u64 {
        self.edges
    }

    /// Advance one clock edge.
    pub(crate) fn step(&mut self, dut: &mut dyn Dut) -> Result<(), ProtocolError> {
        if self.cancel.is_cancelled() {
            return Err(ProtocolError::Cancelled { edge: self.edges });
        }
        dut.tick();
        self.edges += 1;
        Ok(())
    }

    /// Advance `count` idle edges.
    pub(crate) fn idle(&mut self, dut: &mut dyn Dut, count: u64) -> Result<(), ProtocolError> {
        for _ in 0..count {
            self.step(dut)?;
        }
        Ok(())
    }

    /// Pulse the reset line and settle the input lines.
    pub(crate) fn reset(&mut self, dut: &mut dyn Dut) -> Result<(), ProtocolError> {
        let pulse = self.timing.reset_pulse;
        dut.write(Signal::Rst, 0);
        self.idle(dut, pulse)?;
        dut.write(Signal::Rst, 1);
        dut.write(Signal::Result, 0);
        dut.write(Signal::InputReady, 0);
        self.idle(dut, pulse)?;
        dut.write(Signal::Rst, 0);
        self.idle(dut, pulse)
    }

    /// Poll `busy` once per edge until it clears, bounded by the cycle budget.
    pub(crate) fn wait_ready(
        &mut self,
        dut: &mut dyn Dut,
        site: WaitSite,
    ) -> Result<(), ProtocolError> {
        let mut waited = 0;
        while dut.read(Signal::Busy) != 0 {
            if waited >= self.timing.busy_budget {
                return Err(ProtocolError::Timeout {
                    site,
                    budget: self.timing.busy_budget,
                    edge: self.edges,
                });
            }
            self.step(dut)?;
            waited += 1;
        }
        Ok(())
    }

    /// Transmit one nibble: wait for ready, present, strobe.
    fn send_nibble(
        &mut self,
        dut: &mut dyn Dut,
        nibble: u8,
        block: usize,
        index: usize,
    ) -> Result<(), ProtocolError> {
        self.wait_ready(dut, WaitSite::Nibble { block, index })?;

        dut.write(Signal::InNibble, nibble);
        self.idle(dut, self.timing.settle)?;

        dut.write(Signal::InputReady, 1);
        self.idle(dut, self.timing.strobe_high)?;
        dut.write(Signal::InputReady, 0);
        self.idle(dut, self.timing.strobe_low)
    }

    /// Stream every block into the engine, draining `busy` after each one.
    pub(crate) fn send_blocks(
        &mut self,
        dut: &mut dyn Dut,
        blocks: &[Block],
        transcript: &mut Transcript,
    ) -> Result<(), ProtocolError> {
        for (block_index, block) in blocks.iter().enumerate() {
            let started = self.edges;
            for (index, nibble) in block.nibbles().enumerate() {
                self.send_nibble(dut, nibble, block_index, index)?;
            }
            self.idle(dut, self.timing.block_gap)?;
            self.wait_ready(dut, WaitSite::BlockDrain { block: block_index })?;
            transcript.step(
                self.edges,
                format!(
                    "block {block_index}: {BLOCK_NIBBLES} nibbles in {} edges",
                    self.edges - started
                ),
            );
        }
        Ok(())
    }
}
