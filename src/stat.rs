use serde::Serialize;
use tracing::info;

use crate::common::Algorithm;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub nodes_explored: usize,
    pub iterations: usize,
    // Deepest recursion for RBFS/IDA*, largest |open| + |closed| for SMA*.
    pub peak_memory: usize,
    pub path_length: usize,
    pub time_us: usize,
}

impl Stats {
    pub(crate) fn record_memory(&mut self, in_use: usize) {
        self.peak_memory = self.peak_memory.max(in_use);
    }

    pub fn time_ms(&self) -> f64 {
        self.time_us as f64 / 1000.0
    }

    pub fn print(&self, algorithm: Algorithm) {
        info!(
            "{algorithm} Nodes explored {:?} Path length {:?} Iterations {:?} Peak memory {:?} Time(ms) {:.3}",
            self.nodes_explored,
            self.path_length,
            self.iterations,
            self.peak_memory,
            self.time_ms()
        );
    }
}
