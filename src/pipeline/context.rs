use crate::error::Result;
use crate::manifest::Manifest;
use crate::safety::compute_cutoff;
use jiff::Timestamp;
use std::time::Instant;

/// Per-run state shared read-only with every step.
///
/// The cutoff is fixed when the context is built and never recomputed.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub manifest: Manifest,
    pub buffer_days: u32,
    pub cutoff: Timestamp,
    started: Instant,
}

impl RunContext {
    pub fn new(manifest: Manifest, buffer_days: u32) -> Result<Self> {
        Self::at(manifest, buffer_days, Timestamp::now())
    }

    /// Builds a context as if the run started at `now`.
    pub fn at(manifest: Manifest, buffer_days: u32, now: Timestamp) -> Result<Self> {
        Ok(Self {
            manifest,
            buffer_days,
            cutoff: compute_cutoff(now, buffer_days)?,
            started: Instant::now(),
        })
    }

    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
