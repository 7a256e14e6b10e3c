//! Integration tests for the analysis pipeline
//!
//! Runs the canonical fixtures end to end through both parsers and checks
//! the properties every analysis must hold.

mod common;

use common::{
    ORDERS_REPORT_JSON, ORDERS_REPORT_TEXT, PRIMARY_KEY_LOOKUP_TEXT, USERS_BY_EMAIL_JSON,
    node_types,
};
use pgexplain_analyzer::{
    AnalysisRequest, AnalysisResponse, FormatHint, PlanAnalyzer, RuleKind, SeverityLevel, analyze,
    dedup, parse_json_explain, parse_text_explain,
};
use pretty_assertions::assert_eq;

// ============ Tree shape ============

#[test]
fn text_and_json_fixtures_produce_the_same_tree() {
    let text = parse_text_explain(ORDERS_REPORT_TEXT).expect("text parse failed");
    let json = parse_json_explain(ORDERS_REPORT_JSON).expect("json parse failed");

    assert_eq!(
        node_types(&text.root),
        vec!["Sort", "Hash Join", "Seq Scan", "Hash", "Index Scan"]
    );
    assert_eq!(node_types(&text.root), node_types(&json.root));

    let text_ids: Vec<usize> = text.iter_nodes().map(|n| n.id).collect();
    let json_ids: Vec<usize> = json.iter_nodes().map(|n| n.id).collect();
    assert_eq!(text_ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(text_ids, json_ids);

    for (t, j) in text.iter_nodes().zip(json.iter_nodes()) {
        assert_eq!(t.relation_name, j.relation_name, "node {}", t.id);
        assert_eq!(t.alias, j.alias, "node {}", t.id);
        assert_eq!(t.plan_rows, j.plan_rows, "node {}", t.id);
        assert_eq!(t.actual_rows, j.actual_rows, "node {}", t.id);
        assert_eq!(t.actual_total_time, j.actual_total_time, "node {}", t.id);
        assert_eq!(t.filter, j.filter, "node {}", t.id);
        assert_eq!(t.children.len(), j.children.len(), "node {}", t.id);
    }

    assert_eq!(text.planning_time_ms, json.planning_time_ms);
    assert_eq!(text.execution_time_ms, json.execution_time_ms);
}

#[test]
fn text_and_json_fixtures_produce_the_same_analysis() {
    let text = analyze(ORDERS_REPORT_TEXT, FormatHint::Auto).expect("text analysis failed");
    let json = analyze(ORDERS_REPORT_JSON, FormatHint::Auto).expect("json analysis failed");

    assert_eq!(text.summary, json.summary);

    let text_ids: Vec<&str> = text.recommendations.iter().map(|r| r.id.as_str()).collect();
    let json_ids: Vec<&str> = json.recommendations.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(text_ids, json_ids);
}

// ============ Metrics ============

#[test]
fn self_times_are_never_negative() {
    // Children report more time than their parent
    let text = "\
Hash Join  (cost=1.00..10.00 rows=10 width=8) (actual time=0.500..5.000 rows=10 loops=1)
  Hash Cond: (a.id = b.id)
  ->  Seq Scan on a  (cost=0.00..4.00 rows=10 width=4) (actual time=0.010..3.000 rows=10 loops=1)
  ->  Hash  (cost=4.00..4.00 rows=10 width=4) (actual time=2.600..2.600 rows=10 loops=1)
        ->  Seq Scan on b  (cost=0.00..4.00 rows=10 width=4) (actual time=0.010..2.500 rows=10 loops=1)
Execution Time: 5.100 ms";

    for raw in [text, ORDERS_REPORT_TEXT, ORDERS_REPORT_JSON, USERS_BY_EMAIL_JSON] {
        let result = analyze(raw, FormatHint::Auto).expect("analysis failed");
        for node in result.plan.iter() {
            let self_time = node.self_time.expect("timed node");
            assert!(self_time >= 0.0, "node {} has self time {self_time}", node.id);
        }
    }
}

#[test]
fn time_percentages_add_up() {
    let result = analyze(ORDERS_REPORT_TEXT, FormatHint::Auto).expect("analysis failed");

    let self_total: f64 = result.plan.iter().filter_map(|n| n.self_time).sum();
    assert!((self_total - 98.5).abs() < 1e-9);

    let pct_total: f64 = result.plan.iter().filter_map(|n| n.time_percentage).sum();
    assert!(pct_total <= 100.0 + 1e-9);
    assert!((pct_total - 98.5).abs() < 1e-9);

    let percentages: Vec<f64> = result
        .plan
        .iter()
        .map(|n| n.time_percentage.unwrap_or_default())
        .collect();
    assert_eq!(percentages, vec![18.5, 28.5, 40.0, 1.5, 10.0]);

    let bottlenecks: Vec<usize> = result
        .plan
        .iter()
        .filter(|n| n.is_bottleneck)
        .map(|n| n.id)
        .collect();
    assert_eq!(bottlenecks, vec![1, 2]);
}

// ============ Summary ============

#[test]
fn summary_of_the_orders_report() {
    let summary = analyze(ORDERS_REPORT_JSON, FormatHint::Json)
        .expect("analysis failed")
        .summary;

    assert_eq!(summary.execution_time, Some(100.0));
    assert_eq!(summary.planning_time, Some(0.42));
    assert_eq!(summary.total_rows, 9800.0);
    assert_eq!(summary.total_cost, Some(2475.12));
    assert_eq!(summary.estimation_accuracy, 62);
    assert!(summary.has_seq_scans);
    assert!(summary.has_estimation_errors);
    assert_eq!(summary.node_count, 5);
    assert_eq!(summary.max_depth, 4);
    assert_eq!(summary.bottleneck_count, 2);

    let top: Vec<(&str, f64)> = summary
        .top_operations
        .iter()
        .map(|op| (op.node_type.as_str(), op.percentage))
        .collect();
    assert_eq!(
        top,
        vec![
            ("Seq Scan", 40.0),
            ("Hash Join", 28.5),
            ("Sort", 18.5),
            ("Index Scan", 10.0),
            ("Hash", 1.5),
        ]
    );
}

// ============ Recommendations ============

#[test]
fn recommendations_for_the_orders_report() {
    let result = analyze(ORDERS_REPORT_TEXT, FormatHint::Auto).expect("analysis failed");

    let found: Vec<(&str, SeverityLevel)> = result
        .recommendations
        .iter()
        .map(|r| (r.id.as_str(), r.severity))
        .collect();
    assert_eq!(
        found,
        vec![
            ("seq_scan_on_large_table-2", SeverityLevel::Warning),
            ("bottleneck_node-1", SeverityLevel::Warning),
            ("sort_spills_to_disk-0", SeverityLevel::Warning),
            ("estimation_mismatch-3", SeverityLevel::Info),
            ("estimation_mismatch-4", SeverityLevel::Info),
        ]
    );

    let sql: Vec<Option<&str>> = result
        .recommendations
        .iter()
        .map(|r| r.sql.as_deref())
        .collect();
    assert_eq!(
        sql,
        vec![
            Some("CREATE INDEX idx_orders_status ON orders (status);"),
            None,
            Some("SET work_mem = '4MB';"),
            // The Hash has no relation of its own; the scan below it does
            Some("ANALYZE users;"),
            Some("ANALYZE users;"),
        ]
    );
}

#[test]
fn large_filtered_seq_scan_scenario() {
    let result = analyze(USERS_BY_EMAIL_JSON, FormatHint::Auto).expect("analysis failed");

    let root = &result.plan;
    assert_eq!(root.self_time, Some(120.5));
    let pct = root.time_percentage.expect("percentage");
    assert!((pct - 96.4).abs() < 1e-9);
    assert!(root.is_bottleneck);

    let first = &result.recommendations[0];
    assert_eq!(first.kind, RuleKind::SeqScanOnLargeTable);
    assert_eq!(first.severity, SeverityLevel::Critical);
    assert_eq!(first.node_id, Some(0));
    assert_eq!(
        first.sql.as_deref(),
        Some("CREATE INDEX idx_users_email ON users (email);")
    );
    assert_eq!(
        first.issue.en,
        "Seq Scan reads 52,000 rows from users and filters them with (email = 'test@example.com'::text), taking 96.4% of execution time."
    );
    assert!(!first.title.zh.is_empty());

    // The bottleneck rule defers to the more specific finding
    assert!(
        result
            .recommendations
            .iter()
            .all(|r| r.kind != RuleKind::BottleneckNode)
    );
}

#[test]
fn large_filtered_seq_scan_scenario_in_text_format() {
    let text = "Seq Scan on users (cost=0.00..1000.00 rows=50000 width=40) (actual time=0.01..120.50 rows=52000 loops=1)
  Filter: (email = 'test@example.com'::text)
Execution Time: 125.00 ms";
    let result = analyze(text, FormatHint::Auto).expect("analysis failed");

    assert_eq!(result.plan.node_type, "Seq Scan");
    assert_eq!(result.plan.actual_rows, Some(52000.0));
    assert!((result.plan.time_percentage.unwrap_or_default() - 96.4).abs() < 1e-9);
    assert!(result.plan.is_bottleneck);

    let critical: Vec<_> = result
        .recommendations
        .iter()
        .filter(|r| r.kind == RuleKind::SeqScanOnLargeTable && r.severity == SeverityLevel::Critical)
        .collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].node_id, Some(result.plan.id));
    // Also a bottleneck, but reported once
    assert_eq!(result.recommendations.len(), 1);
    assert_eq!(
        critical[0].sql.as_deref(),
        Some("CREATE INDEX idx_users_email ON users (email);")
    );
}

#[test]
fn fast_plan_has_no_recommendations() {
    let result = analyze(PRIMARY_KEY_LOOKUP_TEXT, FormatHint::Auto).expect("analysis failed");

    assert!(result.is_clean());
    assert_eq!(result.summary.estimation_accuracy, 100);
    assert!(!result.summary.has_seq_scans);
    assert!(!result.summary.has_estimation_errors);
}

#[test]
fn recommendations_are_unique_per_rule_and_node() {
    for raw in [ORDERS_REPORT_TEXT, ORDERS_REPORT_JSON, USERS_BY_EMAIL_JSON] {
        let result = analyze(raw, FormatHint::Auto).expect("analysis failed");
        let count = result.recommendations.len();
        assert_eq!(dedup(result.recommendations).len(), count);
    }
}

#[test]
fn recommendations_are_ranked_by_severity() {
    let result = analyze(USERS_BY_EMAIL_JSON, FormatHint::Auto).expect("analysis failed");
    let ranks: Vec<u8> = result
        .recommendations
        .iter()
        .map(|r| r.severity.rank())
        .collect();

    let mut sorted = ranks.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(ranks, sorted);
}

#[test]
fn huge_sort_spill_is_reported_without_overflow() {
    let json = r#"[{"Plan": {"Node Type": "Sort", "Sort Key": ["created_at"],
        "Sort Method": "external merge", "Sort Space Used": 10000000000000000000,
        "Sort Space Type": "Disk", "Plan Rows": 1000, "Actual Rows": 1000,
        "Actual Loops": 1, "Actual Total Time": 40.0}, "Execution Time": 41.0}]"#;

    let result = analyze(json, FormatHint::Auto).unwrap();
    let spill = result
        .recommendations
        .iter()
        .find(|r| r.kind == RuleKind::SortSpillsToDisk)
        .expect("sort spill recommendation");

    assert_eq!(spill.node_id, Some(0));
    assert!(spill.sql.as_deref().is_some_and(|sql| sql.starts_with("SET work_mem = '")));
}

#[test]
fn leading_sort_key_line_does_not_replace_the_root() {
    let text = "\
Sort Key: created_at
Seq Scan on users  (cost=0.00..1000.00 rows=50000 width=40)";

    let result = analyze(text, FormatHint::Auto).unwrap();

    assert_eq!(result.plan.node_type, "Seq Scan");
    assert_eq!(result.summary.node_count, 1);
}

// ============ Determinism ============

#[test]
fn analysis_is_deterministic() {
    let analyzer = PlanAnalyzer::new();
    for raw in [ORDERS_REPORT_TEXT, ORDERS_REPORT_JSON, USERS_BY_EMAIL_JSON] {
        let first = serde_json::to_string(&analyzer.analyze(raw, FormatHint::Auto).unwrap()).unwrap();
        let second = serde_json::to_string(&analyzer.analyze(raw, FormatHint::Auto).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}

// ============ Response envelope ============

#[test]
fn response_envelope_round_trip() {
    let analyzer = PlanAnalyzer::new();
    let request: AnalysisRequest = serde_json::from_str(&serde_json::json!({
        "plan": ORDERS_REPORT_JSON,
        "format": "json",
    }).to_string())
    .unwrap();

    let response = analyzer.handle(&request);
    let encoded = serde_json::to_string(&response).unwrap();
    let decoded: AnalysisResponse = serde_json::from_str(&encoded).unwrap();

    assert!(decoded.is_success());
    assert_eq!(decoded, response);
    assert_eq!(
        decoded.data().map(|d| d.plan.node_type.as_str()),
        Some("Sort")
    );
}

#[test]
fn every_node_serializes_children() {
    let result = analyze(ORDERS_REPORT_TEXT, FormatHint::Auto).unwrap();
    let value = serde_json::to_value(&result.plan).unwrap();

    let mut stack = vec![&value];
    while let Some(node) = stack.pop() {
        let children = node["children"].as_array().expect("children array");
        stack.extend(children);
    }
}
