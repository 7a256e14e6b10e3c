//! Plan Metrics - Derived per-node timing figures
//!
//! Fills in [`PlanNode::self_time`], [`PlanNode::time_percentage`] and
//! [`PlanNode::is_bottleneck`] on a freshly parsed tree. The walk uses an
//! explicit stack, so arbitrarily deep plans cost no call-stack depth.
//!
//! Percentages are normalized against the statement's execution time when it
//! is known, otherwise against the root's own total time. Without either
//! (plain `EXPLAIN`), percentages stay unset and only the row-count
//! bottleneck trigger applies.

use crate::config::AnalyzerConfig;
use crate::explain::{PlanNode, QueryPlan};

/// Annotates every node of `plan` in place
pub fn annotate(plan: &mut QueryPlan, config: &AnalyzerConfig) {
    annotate_with(&mut plan.root, plan.execution_time_ms, config);
}

/// Annotates the tree under `root` given the statement's execution time
pub fn annotate_with(root: &mut PlanNode, total_execution_time: Option<f64>, config: &AnalyzerConfig) {
    let base = normalization_base(root, total_execution_time);
    let mut bottlenecks = 0usize;

    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        node.self_time = self_time(node);
        node.time_percentage = match (node.self_time, base) {
            (Some(self_time), Some(base)) => Some(100.0 * self_time / base),
            _ => None,
        };
        node.is_bottleneck = is_bottleneck(node, config);
        if node.is_bottleneck {
            bottlenecks += 1;
        }
        stack.extend(node.children.iter_mut());
    }

    tracing::debug!(?base, bottlenecks, "Annotated plan metrics");
}

/// Time base used for percentages, if any
pub fn normalization_base(root: &PlanNode, total_execution_time: Option<f64>) -> Option<f64> {
    total_execution_time
        .filter(|t| *t > 0.0)
        .or_else(|| root.actual_total_time.filter(|t| *t > 0.0))
}

/// Time spent in `node` itself, excluding its children
///
/// Children without timing count as zero. The result is clamped at zero since
/// PostgreSQL's instrumentation overhead can make children add up to more
/// than their parent.
pub fn self_time(node: &PlanNode) -> Option<f64> {
    let total = node.actual_total_time?;
    let children: f64 = node
        .children
        .iter()
        .filter_map(|child| child.actual_total_time)
        .sum();
    Some((total - children).max(0.0))
}

/// Returns true if the node dominates execution time or is a large Seq Scan
pub fn is_bottleneck(node: &PlanNode, config: &AnalyzerConfig) -> bool {
    let dominates = node
        .time_percentage
        .is_some_and(|pct| pct > config.bottleneck_percentage);
    dominates || is_large_seq_scan(node, config)
}

/// Seq Scan whose observed (or estimated) row count exceeds the large-scan threshold
pub fn is_large_seq_scan(node: &PlanNode, config: &AnalyzerConfig) -> bool {
    node.is_seq_scan()
        && node
            .effective_rows()
            .is_some_and(|rows| rows > config.large_seq_scan_rows)
}
