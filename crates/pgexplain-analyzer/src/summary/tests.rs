//! Tests for the plan summary

use super::*;
use crate::metrics::annotate_with;
use pretty_assertions::assert_eq;

fn annotated(mut root: PlanNode, execution_time: Option<f64>) -> PlanNode {
    annotate_with(&mut root, execution_time, &AnalyzerConfig::default());
    root
}

fn join_plan() -> PlanNode {
    let mut orders = PlanNode::new(1, "Seq Scan")
        .with_relation("orders")
        .with_plan_rows(500.0)
        .with_actual(30.0, 500.0, 1);
    orders.total_cost = Some(50.0);

    let users = PlanNode::new(3, "Seq Scan")
        .with_relation("users")
        .with_plan_rows(100.0)
        .with_actual(45.0, 100.0, 1);

    let mut root = PlanNode::new(0, "Hash Join")
        .with_plan_rows(500.0)
        .with_actual(100.0, 500.0, 1)
        .with_child(orders)
        .with_child(
            PlanNode::new(2, "Hash")
                .with_plan_rows(100.0)
                .with_actual(50.0, 100.0, 1)
                .with_child(users),
        );
    root.total_cost = Some(120.0);
    root
}

#[test]
fn test_summary_of_join_plan() {
    let root = annotated(join_plan(), Some(100.0));
    let summary = summarize(&root, Some(100.0), Some(0.4), &AnalyzerConfig::default());

    assert_eq!(summary.execution_time, Some(100.0));
    assert_eq!(summary.planning_time, Some(0.4));
    assert_eq!(summary.total_rows, 500.0);
    assert_eq!(summary.estimation_accuracy, 100);
    assert!(summary.has_seq_scans);
    assert!(!summary.has_estimation_errors);
    assert_eq!(summary.node_count, 4);
    assert_eq!(summary.max_depth, 3);
    assert_eq!(summary.total_cost, Some(120.0));
    // Both scans take more than 20% of the time
    assert_eq!(summary.bottleneck_count, 2);
}

#[test]
fn test_top_operations_group_by_type() {
    let root = annotated(join_plan(), Some(100.0));
    let top = top_operations(&root, 10);

    assert_eq!(
        top,
        vec![
            OperationShare {
                node_type: "Seq Scan".into(),
                percentage: 75.0
            },
            OperationShare {
                node_type: "Hash Join".into(),
                percentage: 20.0
            },
            OperationShare {
                node_type: "Hash".into(),
                percentage: 5.0
            },
        ]
    );
}

#[test]
fn test_top_operations_respects_limit() {
    let root = annotated(join_plan(), Some(100.0));
    let top = top_operations(&root, 1);

    assert_eq!(top.len(), 1);
    assert_eq!(top[0].node_type, "Seq Scan");
}

#[test]
fn test_top_operations_empty_without_timing() {
    let root = annotated(PlanNode::new(0, "Seq Scan").with_plan_rows(10.0), None);
    assert!(top_operations(&root, 10).is_empty());
}

#[test]
fn test_estimation_accuracy_scores_mismatch() {
    // 100 estimated, 50 observed -> 0.5; 10 estimated, 10 observed -> 1.0
    let root = PlanNode::new(0, "Limit")
        .with_plan_rows(10.0)
        .with_actual(1.0, 10.0, 1)
        .with_child(
            PlanNode::new(1, "Seq Scan")
                .with_plan_rows(100.0)
                .with_actual(1.0, 50.0, 1),
        );

    assert_eq!(estimation_accuracy(&root), 75);
}

#[test]
fn test_estimation_accuracy_ignores_never_executed_nodes() {
    let root = PlanNode::new(0, "Hash Join")
        .with_plan_rows(10.0)
        .with_actual(1.0, 10.0, 1)
        .with_child(
            PlanNode::new(1, "Seq Scan")
                .with_plan_rows(1000.0)
                .with_actual(0.0, 0.0, 0),
        );

    assert_eq!(estimation_accuracy(&root), 100);
}

#[test]
fn test_estimation_accuracy_without_actuals_is_perfect() {
    let root = PlanNode::new(0, "Seq Scan").with_plan_rows(10.0);
    assert_eq!(estimation_accuracy(&root), 100);
}

#[test]
fn test_total_rows_falls_back_to_estimate() {
    let root = PlanNode::new(0, "Seq Scan").with_plan_rows(42.0);
    let summary = summarize(&root, None, None, &AnalyzerConfig::default());

    assert_eq!(summary.total_rows, 42.0);
    assert_eq!(summary.execution_time, None);
}

#[test]
fn test_estimation_error_flag() {
    let root = PlanNode::new(0, "Index Scan")
        .with_plan_rows(1.0)
        .with_actual(1.0, 5_000.0, 1);
    let summary = summarize(&root, None, None, &AnalyzerConfig::default());

    assert!(summary.has_estimation_errors);
    assert!(!summary.has_seq_scans);
}

#[test]
fn test_summary_serializes_camel_case() {
    let root = annotated(PlanNode::new(0, "Result").with_actual(0.1, 1.0, 1), Some(0.1));
    let summary = summarize(&root, Some(0.1), None, &AnalyzerConfig::default());
    let json = serde_json::to_value(&summary).expect("serializable");

    assert!(json.get("executionTime").is_some());
    assert!(json.get("planningTime").is_none());
    assert!(json.get("topOperations").is_some());
    assert!(json.get("hasSeqScans").is_some());
    assert!(json.get("estimationAccuracy").is_some());
}
