//! Pipeline metrics recorded through the `metrics` facade and exposed in
//! Prometheus text format.
//!
//! Recording is a no-op until [`init`] installs the recorder, so library code
//! and tests can call these functions unconditionally.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Loader metrics
    LoaderRowsLoaded,
    LoaderRowsSkipped,

    // Aggregation metrics
    AggregateGroups,

    // Join metrics
    JoinMatched,
    JoinUnmatched,
    JoinFanOut,

    // Geocoder metrics
    GeocodeResolved,
    GeocodeUnresolved,

    // Filter metrics
    FilterRowsRetained,

    // Whole pipeline
    PipelineRuns,
    PipelineDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::LoaderRowsLoaded => "heatmap_loader_rows_loaded_total",
            MetricName::LoaderRowsSkipped => "heatmap_loader_rows_skipped_total",
            MetricName::AggregateGroups => "heatmap_aggregate_groups",
            MetricName::JoinMatched => "heatmap_join_matched_total",
            MetricName::JoinUnmatched => "heatmap_join_unmatched_total",
            MetricName::JoinFanOut => "heatmap_join_fan_out_total",
            MetricName::GeocodeResolved => "heatmap_geocode_resolved_total",
            MetricName::GeocodeUnresolved => "heatmap_geocode_unresolved_total",
            MetricName::FilterRowsRetained => "heatmap_filter_rows_retained",
            MetricName::PipelineRuns => "heatmap_pipeline_runs_total",
            MetricName::PipelineDuration => "heatmap_pipeline_duration_seconds",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            LoaderRowsLoaded,
            LoaderRowsSkipped,
            AggregateGroups,
            JoinMatched,
            JoinUnmatched,
            JoinFanOut,
            GeocodeResolved,
            GeocodeUnresolved,
            FilterRowsRetained,
            PipelineRuns,
            PipelineDuration,
        ]
        .into_iter()
    }

    /// Returns (stage, description)
    pub fn metadata(&self) -> (&'static str, &'static str) {
        match self {
            MetricName::LoaderRowsLoaded => ("loader", "Rows loaded per source"),
            MetricName::LoaderRowsSkipped => ("loader", "Rows skipped for an empty account name"),
            MetricName::AggregateGroups => ("aggregate", "Account groups produced per run"),
            MetricName::JoinMatched => ("join", "Account rows matched to SPOT data"),
            MetricName::JoinUnmatched => ("join", "Account rows with no SPOT data"),
            MetricName::JoinFanOut => ("join", "Extra rows produced by duplicate SPOT accounts"),
            MetricName::GeocodeResolved => ("geocode", "Postal codes resolved to coordinates"),
            MetricName::GeocodeUnresolved => ("geocode", "Postal codes left without coordinates"),
            MetricName::FilterRowsRetained => ("filter", "Rows surviving the filters"),
            MetricName::PipelineRuns => ("pipeline", "Frames computed"),
            MetricName::PipelineDuration => ("pipeline", "Frame computation time"),
        }
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once; only the
/// first call installs.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;

    for metric in MetricName::all_metrics() {
        let (stage, description) = metric.metadata();
        let description = format!("[{}] {}", stage, description);
        match metric {
            MetricName::AggregateGroups
            | MetricName::FilterRowsRetained
            | MetricName::PipelineDuration => {
                ::metrics::describe_histogram!(metric.as_str(), description)
            }
            _ => ::metrics::describe_counter!(metric.as_str(), description),
        }
    }

    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Render the current metrics in Prometheus text format, if installed.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod loader {
    use super::MetricName;

    pub fn rows_loaded(source: &str, count: usize) {
        ::metrics::counter!(MetricName::LoaderRowsLoaded.as_str(), "source" => source.to_string())
            .increment(count as u64);
    }

    pub fn rows_skipped(source: &str, count: usize) {
        ::metrics::counter!(MetricName::LoaderRowsSkipped.as_str(), "source" => source.to_string())
            .increment(count as u64);
    }
}

pub mod aggregate {
    use super::MetricName;

    pub fn groups(count: usize) {
        ::metrics::histogram!(MetricName::AggregateGroups.as_str()).record(count as f64);
    }
}

pub mod join {
    use super::MetricName;

    pub fn matched(count: usize) {
        ::metrics::counter!(MetricName::JoinMatched.as_str()).increment(count as u64);
    }

    pub fn unmatched(count: usize) {
        ::metrics::counter!(MetricName::JoinUnmatched.as_str()).increment(count as u64);
    }

    pub fn fan_out(extra_rows: usize) {
        ::metrics::counter!(MetricName::JoinFanOut.as_str()).increment(extra_rows as u64);
    }
}

pub mod geocode {
    use super::MetricName;

    pub fn resolved(count: usize) {
        ::metrics::counter!(MetricName::GeocodeResolved.as_str()).increment(count as u64);
    }

    pub fn unresolved(count: usize) {
        ::metrics::counter!(MetricName::GeocodeUnresolved.as_str()).increment(count as u64);
    }
}

pub mod filter {
    use super::MetricName;

    pub fn rows_retained(count: usize) {
        ::metrics::histogram!(MetricName::FilterRowsRetained.as_str()).record(count as f64);
    }
}

pub mod pipeline {
    use super::MetricName;

    pub fn run_completed(focus: &str, secs: f64) {
        ::metrics::counter!(MetricName::PipelineRuns.as_str(), "focus" => focus.to_string())
            .increment(1);
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(secs);
    }
}
