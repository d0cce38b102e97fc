//! Inter-chunk timing for streamed responses.
//!
//! One sample per gap between consecutive chunks, so a stream of N chunks
//! yields N−1 samples. `end` closes a healthy stream, `stop` closes a
//! failed one and pins the error code.

use std::time::Instant;

use serde::{Deserialize, Serialize};

pub struct ChunkStats {
    last: Option<Instant>,
    gaps_ms: Vec<f64>,
    is_error: bool,
    error_code: Option<String>,
    ended: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub std_dev_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl ChunkStats {
    pub fn new() -> Self {
        Self {
            last: None,
            gaps_ms: Vec::new(),
            is_error: false,
            error_code: None,
            ended: false,
        }
    }

    /// Record one chunk arrival. The first chunk only starts the clock;
    /// arrivals after close are ignored.
    pub fn observe(&mut self) {
        if self.ended {
            return;
        }
        let now = Instant::now();
        if let Some(prev) = self.last {
            self.gaps_ms.push(now.duration_since(prev).as_secs_f64() * 1000.0);
        }
        self.last = Some(now);
    }

    /// Close a healthy stream.
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// Close a failed stream with its error code.
    pub fn stop(&mut self, error_code: impl Into<String>) {
        self.ended = true;
        self.is_error = true;
        self.error_code = Some(error_code.into());
    }

    pub fn summary(&self) -> ChunkSummary {
        let n = self.gaps_ms.len();
        if n == 0 {
            return ChunkSummary {
                is_error: self.is_error,
                error_code: self.error_code.clone(),
                ..Default::default()
            };
        }
        let mut sorted = self.gaps_ms.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let sum: f64 = sorted.iter().sum();
        let mean = sum / n as f64;
        let variance = sorted.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n as f64;

        ChunkSummary {
            count: n,
            mean_ms: mean,
            min_ms: sorted[0],
            max_ms: sorted[n - 1],
            std_dev_ms: variance.sqrt(),
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
            is_error: self.is_error,
            error_code: self.error_code.clone(),
        }
    }
}

impl Default for ChunkStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Nearest-rank percentile over a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let idx = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with_gaps(gaps: &[f64]) -> ChunkStats {
        let mut s = ChunkStats::new();
        s.gaps_ms = gaps.to_vec();
        s
    }

    #[test]
    fn n_chunks_yield_n_minus_one_samples() {
        let mut s = ChunkStats::new();
        for _ in 0..5 {
            s.observe();
        }
        s.end();
        assert_eq!(s.summary().count, 4);
    }

    #[test]
    fn single_chunk_yields_empty_summary() {
        let mut s = ChunkStats::new();
        s.observe();
        s.end();
        let summary = s.summary();
        assert_eq!(summary.count, 0);
        assert!(!summary.is_error);
    }

    #[test]
    fn summary_statistics_over_known_gaps() {
        let s = stats_with_gaps(&[10.0, 20.0, 30.0, 40.0]);
        let summary = s.summary();
        assert_eq!(summary.count, 4);
        assert!((summary.mean_ms - 25.0).abs() < 1e-9);
        assert_eq!(summary.min_ms, 10.0);
        assert_eq!(summary.max_ms, 40.0);
        // population std dev of {10,20,30,40} = sqrt(125)
        assert!((summary.std_dev_ms - 125.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn percentiles_use_nearest_rank() {
        let sorted: Vec<f64> = (1..=100).map(|i| i as f64).collect();
        assert_eq!(percentile(&sorted, 0.50), 51.0);
        assert_eq!(percentile(&sorted, 0.95), 95.0);
        assert_eq!(percentile(&sorted, 0.99), 99.0);
    }

    #[test]
    fn stop_marks_error_and_code() {
        let mut s = stats_with_gaps(&[5.0]);
        s.stop("per_idle");
        let summary = s.summary();
        assert!(summary.is_error);
        assert_eq!(summary.error_code.as_deref(), Some("per_idle"));
        assert_eq!(summary.count, 1);
    }
}
