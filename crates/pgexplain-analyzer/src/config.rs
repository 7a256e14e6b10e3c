//! Analyzer thresholds
//!
//! Every number the metrics pass, the summary and the rules compare against
//! lives here, so a host can tune them from its own settings file.

use serde::{Deserialize, Serialize};

/// Configuration for the plan analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Self-time share (percent) above which a node is a bottleneck
    pub bottleneck_percentage: f64,
    /// Minimum self time (ms) for the time-share trigger to raise a BottleneckNode recommendation
    pub bottleneck_min_self_time_ms: f64,
    /// Seq Scan row count above which the scan is considered large
    pub large_seq_scan_rows: f64,
    /// Seq Scan row count above which a filtered scan is critical
    pub critical_seq_scan_rows: f64,
    /// Self-time share (percent) above which a filtered large scan is critical
    pub critical_time_percentage: f64,
    /// Rows flowing through a nested loop above which it is flagged
    pub nested_loop_rows: f64,
    /// Estimate/actual ratio outside `[1/factor, factor]` counts as an estimation error
    pub estimation_factor: f64,
    /// Ratio beyond which an estimation error is a warning rather than info
    pub severe_estimation_factor: f64,
    /// Share of scanned rows a filter must discard to be reported (0.0 - 1.0)
    pub filter_ratio: f64,
    /// Minimum rows discarded by a filter before it is reported
    pub filter_min_removed_rows: f64,
    /// Maximum number of entries in the summary's top operations
    pub top_operations_limit: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            bottleneck_percentage: 20.0,
            bottleneck_min_self_time_ms: 1.0,
            large_seq_scan_rows: 1_000.0,
            critical_seq_scan_rows: 100_000.0,
            critical_time_percentage: 50.0,
            nested_loop_rows: 10_000.0,
            estimation_factor: 10.0,
            severe_estimation_factor: 100.0,
            filter_ratio: 0.9,
            filter_min_removed_rows: 1_000.0,
            top_operations_limit: 10,
        }
    }
}

impl AnalyzerConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bottleneck time-share threshold
    pub fn with_bottleneck_percentage(mut self, percentage: f64) -> Self {
        self.bottleneck_percentage = percentage.clamp(0.0, 100.0);
        self
    }

    /// Sets the minimum self time for time-based bottleneck advice
    pub fn with_bottleneck_min_self_time_ms(mut self, ms: f64) -> Self {
        self.bottleneck_min_self_time_ms = ms.max(0.0);
        self
    }

    /// Sets the large Seq Scan threshold
    pub fn with_large_seq_scan_rows(mut self, rows: f64) -> Self {
        self.large_seq_scan_rows = rows;
        self
    }

    /// Sets the critical Seq Scan threshold
    pub fn with_critical_seq_scan_rows(mut self, rows: f64) -> Self {
        self.critical_seq_scan_rows = rows;
        self
    }

    /// Sets the time share that makes a filtered large scan critical
    pub fn with_critical_time_percentage(mut self, percentage: f64) -> Self {
        self.critical_time_percentage = percentage.clamp(0.0, 100.0);
        self
    }

    /// Sets the nested loop row threshold
    pub fn with_nested_loop_rows(mut self, rows: f64) -> Self {
        self.nested_loop_rows = rows;
        self
    }

    /// Sets the estimation error factors
    pub fn with_estimation_factors(mut self, factor: f64, severe: f64) -> Self {
        self.estimation_factor = factor.max(1.0);
        self.severe_estimation_factor = severe.max(self.estimation_factor);
        self
    }

    /// Sets the inefficient filter thresholds
    pub fn with_filter_thresholds(mut self, ratio: f64, min_removed_rows: f64) -> Self {
        self.filter_ratio = ratio.clamp(0.0, 1.0);
        self.filter_min_removed_rows = min_removed_rows;
        self
    }

    /// Sets how many operation types the summary reports
    pub fn with_top_operations_limit(mut self, limit: usize) -> Self {
        self.top_operations_limit = limit;
        self
    }
}
