//! Plan Summary - Whole-plan statistics
//!
//! Reads an annotated tree (see [`crate::metrics`]) and condenses it into the
//! headline figures a report shows above the node tree.

use crate::config::AnalyzerConfig;
use crate::explain::{PlanNode, QueryPlan, node_types};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Share of execution time spent in one operator type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationShare {
    pub node_type: String,
    pub percentage: f64,
}

/// Aggregated statistics for a whole plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    /// Execution time in milliseconds, if the source reported it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    /// Planning time in milliseconds, if the source reported it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planning_time: Option<f64>,
    /// Rows produced by the root operator
    pub total_rows: f64,
    /// Planner row-estimate quality, 0-100
    pub estimation_accuracy: u8,
    /// Operator types by summed self-time share, largest first
    pub top_operations: Vec<OperationShare>,
    pub has_seq_scans: bool,
    pub has_estimation_errors: bool,
    pub node_count: usize,
    pub max_depth: usize,
    /// Planner cost of the root operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    pub bottleneck_count: usize,
}

/// Builds the summary for an annotated plan
pub fn summarize_plan(plan: &QueryPlan, config: &AnalyzerConfig) -> PlanSummary {
    summarize(&plan.root, plan.execution_time_ms, plan.planning_time_ms, config)
}

/// Builds the summary for an annotated tree
pub fn summarize(
    root: &PlanNode,
    execution_time: Option<f64>,
    planning_time: Option<f64>,
    config: &AnalyzerConfig,
) -> PlanSummary {
    let mut node_count = 0;
    let mut bottleneck_count = 0;
    let mut has_seq_scans = false;
    let mut has_estimation_errors = false;

    for node in root.iter() {
        node_count += 1;
        if node.is_bottleneck {
            bottleneck_count += 1;
        }
        has_seq_scans |= node.node_type == node_types::SEQ_SCAN;
        has_estimation_errors |= node.has_estimation_error(config.estimation_factor);
    }

    PlanSummary {
        execution_time,
        planning_time,
        total_rows: root.effective_rows().unwrap_or(0.0),
        estimation_accuracy: estimation_accuracy(root),
        top_operations: top_operations(root, config.top_operations_limit),
        has_seq_scans,
        has_estimation_errors,
        node_count,
        max_depth: root.depth(),
        total_cost: root.total_cost,
        bottleneck_count,
    }
}

/// Mean closeness of estimated to observed rows, as a 0-100 score
///
/// Each node with both figures scores `min(actual, planned) / max(actual,
/// planned)`. A plan with no such node scores 100.
pub fn estimation_accuracy(root: &PlanNode) -> u8 {
    let scores: Vec<f64> = root
        .iter()
        .filter(|node| node.estimation_ratio().is_some())
        .filter_map(|node| {
            let actual = node.actual_rows?;
            let planned = node.plan_rows?;
            let high = actual.max(planned);
            Some(if high > 0.0 { actual.min(planned) / high } else { 1.0 })
        })
        .collect();

    if scores.is_empty() {
        return 100;
    }

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Groups nodes by operator type and sums their time shares
///
/// Groups keep first-seen (pre-order) order before the stable sort, so equal
/// shares are listed in plan order.
pub fn top_operations(root: &PlanNode, limit: usize) -> Vec<OperationShare> {
    let mut groups: IndexMap<&str, f64> = IndexMap::new();
    for node in root.iter() {
        if let Some(pct) = node.time_percentage {
            *groups.entry(node.node_type.as_str()).or_insert(0.0) += pct;
        }
    }

    let mut shares: Vec<OperationShare> = groups
        .into_iter()
        .map(|(node_type, percentage)| OperationShare {
            node_type: node_type.to_string(),
            percentage,
        })
        .collect();
    shares.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    shares.truncate(limit);
    shares
}

#[cfg(test)]
mod tests;
