//! Metrics and observability utilities
//!
//! Counters and histograms for the submission pipeline, with standardized
//! naming under the `gutachten` prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Gutachten metrics
pub const METRICS_PREFIX: &str = "gutachten";

/// Buckets for PDF rendering and whole-pipeline latency (in seconds)
pub const PIPELINE_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        Unit::Count,
        "Total submissions by overall outcome"
    );

    describe_counter!(
        format!("{}_stage_outcomes_total", METRICS_PREFIX),
        Unit::Count,
        "Pipeline stage outcomes by stage and status"
    );

    describe_histogram!(
        format!("{}_render_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "PDF rendering latency in seconds"
    );

    describe_histogram!(
        format!("{}_pipeline_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end submission latency in seconds"
    );
}

/// Record the overall outcome of one submission (`success`, `rejected`, `failed`)
pub fn record_submission(outcome: &'static str) {
    counter!(format!("{}_submissions_total", METRICS_PREFIX), "outcome" => outcome).increment(1);
}

/// Record one stage outcome (`succeeded`, `skipped`, `failed`)
pub fn record_stage(stage: &'static str, status: &'static str) {
    counter!(
        format!("{}_stage_outcomes_total", METRICS_PREFIX),
        "stage" => stage,
        "status" => status
    )
    .increment(1);
}

/// Timer that records into a histogram when stopped
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn start(metric: &str) -> Self {
        Self {
            name: format!("{}_{}", METRICS_PREFIX, metric),
            start: Instant::now(),
        }
    }

    /// Record the elapsed time and return it in seconds
    pub fn stop(self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        histogram!(self.name).record(elapsed);
        elapsed
    }
}
