//! Memory churn workload.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use tracing::error;

use super::rng::Rng;
use crate::error::{Error, Result};

pub const CHUNK_SIZE: usize = 1024 * 1024;
/// One random byte is written per this many bytes of a fresh chunk.
const FILL_STRIDE: usize = 1000;
/// One random byte is written per this many bytes of a touched chunk.
const TOUCH_STRIDE: usize = 5000;

/// Allocates `size_mb` one-megabyte chunks per cycle and keeps a bounded,
/// randomly touched working set resident.
pub struct MemoryBurn {
    pub size_mb: usize,
    /// Once more than `size_mb * retain_factor` chunks are held, the oldest
    /// `size_mb` are dropped.
    pub retain_factor: usize,
    /// How many held chunks are rewritten per cycle.
    pub touch_sample: usize,
    pub cycle_pause: Duration,
    /// Hard cap on chunks held at once; a cycle that would exceed it fails.
    pub chunk_limit: Option<usize>,
    chunks: VecDeque<Vec<u8>>,
    rng: Rng,
}

impl MemoryBurn {
    pub fn new(size_mb: usize) -> Self {
        MemoryBurn {
            size_mb,
            retain_factor: 2,
            touch_sample: 10,
            cycle_pause: Duration::from_millis(100),
            chunk_limit: None,
            chunks: VecDeque::new(),
            rng: Rng::from_entropy(),
        }
    }

    pub fn retained_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Upper bound on chunks held between cycles.
    pub fn retention_limit(&self) -> usize {
        self.size_mb * self.retain_factor
    }

    /// One allocate, touch, evict cycle, without the pause.
    pub fn cycle(&mut self) -> Result<()> {
        for _ in 0..self.size_mb {
            let chunk = self.allocate_chunk()?;
            self.chunks.push_back(chunk);
        }

        let len = self.chunks.len();
        for idx in self.rng.sample_indices(len, self.touch_sample) {
            let chunk = &mut self.chunks[idx];
            for i in (0..chunk.len()).step_by(TOUCH_STRIDE) {
                chunk[i] = self.rng.next_u8();
            }
        }

        if self.chunks.len() > self.retention_limit() {
            self.chunks.drain(..self.size_mb);
        }
        Ok(())
    }

    fn allocate_chunk(&mut self) -> Result<Vec<u8>> {
        if let Some(limit) = self.chunk_limit {
            if self.chunks.len() >= limit {
                return Err(Error::Workload(format!("chunk limit of {limit} reached")));
            }
        }
        let mut chunk = Vec::new();
        chunk
            .try_reserve_exact(CHUNK_SIZE)
            .map_err(|e| Error::Workload(format!("allocating {CHUNK_SIZE} bytes: {e}")))?;
        chunk.resize(CHUNK_SIZE, 0);
        // Sparse writes force the kernel to commit physical pages.
        for i in (0..CHUNK_SIZE).step_by(FILL_STRIDE) {
            chunk[i] = self.rng.next_u8();
        }
        Ok(chunk)
    }

    /// Churns until terminated from outside. Returns only if a cycle fails,
    /// after logging the failure, so the worker exits cleanly.
    pub fn run(mut self) {
        loop {
            if let Err(e) = self.cycle() {
                error!("Memory stress error: {} ({} chunks held)", e, self.retained_chunks());
                return;
            }
            thread::sleep(self.cycle_pause);
        }
    }
}
