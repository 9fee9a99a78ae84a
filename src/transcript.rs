//! Cycle-stamped transcript logging for protocol runs.

pub(crate) struct Transcript {
    enabled: bool,
    started: bool,
}

impl Transcript {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            started: false,
        }
    }

    /// Record a run-level note with no clock-edge association.
    pub(crate) fn note(&mut self, message: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        self.start();
        eprintln!("- {}", message.as_ref());
    }

    /// Record a protocol step stamped with the edge it completed at.
    pub(crate) fn step(&mut self, edge: u64, message: impl AsRef<str>) {
        if !self.enabled {
            return;
        }
        self.start();
        eprintln!("- [edge {edge:>8}] {}", message.as_ref());
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        eprintln!("transcript:");
    }
}
