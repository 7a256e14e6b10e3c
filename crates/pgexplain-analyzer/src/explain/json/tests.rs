//! Tests for the PostgreSQL JSON EXPLAIN parser

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_parse_simple_seq_scan_json() {
    let json = r#"[
        {
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "users",
                "Alias": "users",
                "Startup Cost": 0.00,
                "Total Cost": 10.50,
                "Plan Rows": 100,
                "Plan Width": 36
            }
        }
    ]"#;

    let plan = parse_json_explain(json).expect("parse failed");

    assert_eq!(plan.root.id, 0);
    assert_eq!(plan.root.node_type, "Seq Scan");
    assert_eq!(plan.root.relation_name.as_deref(), Some("users"));
    assert_eq!(plan.root.alias.as_deref(), Some("users"));
    assert_eq!(plan.root.startup_cost, Some(0.0));
    assert_eq!(plan.root.total_cost, Some(10.5));
    assert_eq!(plan.root.plan_rows, Some(100.0));
    assert_eq!(plan.root.plan_width, Some(36));
    assert_eq!(plan.root.actual_total_time, None);
    assert_eq!(plan.execution_time_ms, None);
}

#[test]
fn test_parse_wrapper_object_without_array() {
    let json = r#"{"Plan": {"Node Type": "Result"}, "Planning Time": 0.05}"#;

    let plan = parse_json_explain(json).expect("parse failed");

    assert_eq!(plan.root.node_type, "Result");
    assert_eq!(plan.planning_time_ms, Some(0.05));
}

#[test]
fn test_parse_bare_plan_node() {
    let json = r#"{"Node Type": "Limit", "Plans": [{"Node Type": "Seq Scan"}]}"#;

    let plan = parse_json_explain(json).expect("parse failed");

    assert_eq!(plan.root.node_type, "Limit");
    assert_eq!(plan.root.children.len(), 1);
}

#[test]
fn test_parse_nested_plan_assigns_pre_order_ids() {
    let json = r#"[
        {
            "Plan": {
                "Node Type": "Hash Join",
                "Join Type": "Inner",
                "Hash Cond": "(o.user_id = u.id)",
                "Plans": [
                    {
                        "Node Type": "Seq Scan",
                        "Relation Name": "orders",
                        "Alias": "o"
                    },
                    {
                        "Node Type": "Hash",
                        "Plans": [
                            {
                                "Node Type": "Seq Scan",
                                "Relation Name": "users",
                                "Alias": "u"
                            }
                        ]
                    }
                ]
            }
        }
    ]"#;

    let plan = parse_json_explain(json).expect("parse failed");

    assert_eq!(plan.root.join_type.as_deref(), Some("Inner"));
    assert_eq!(plan.root.join_cond.as_deref(), Some("(o.user_id = u.id)"));

    let nodes: Vec<_> = plan
        .iter_nodes()
        .map(|n| (n.id, n.node_type.as_str()))
        .collect();
    assert_eq!(
        nodes,
        vec![
            (0, "Hash Join"),
            (1, "Seq Scan"),
            (2, "Hash"),
            (3, "Seq Scan"),
        ]
    );
    assert_eq!(plan.root.children[1].children[0].relation_name.as_deref(), Some("users"));
}

#[test]
fn test_parse_explain_analyze_json() {
    let json = r#"[
        {
            "Plan": {
                "Node Type": "Seq Scan",
                "Relation Name": "test",
                "Plan Rows": 100,
                "Actual Startup Time": 0.010,
                "Actual Total Time": 0.050,
                "Actual Rows": 95,
                "Actual Loops": 1,
                "Filter": "(id > 5)",
                "Rows Removed by Filter": 5,
                "Shared Hit Blocks": 3,
                "Shared Read Blocks": 1
            },
            "Planning Time": 0.123,
            "Execution Time": 0.089
        }
    ]"#;

    let plan = parse_json_explain(json).expect("parse failed");

    assert_eq!(plan.root.actual_rows, Some(95.0));
    assert_eq!(plan.root.actual_loops, Some(1));
    assert_eq!(plan.root.actual_startup_time, Some(0.010));
    assert_eq!(plan.root.actual_total_time, Some(0.050));
    assert_eq!(plan.root.filter.as_deref(), Some("(id > 5)"));
    assert_eq!(plan.root.rows_removed_by_filter, Some(5.0));
    assert_eq!(plan.root.shared_hit_blocks, Some(3));
    assert_eq!(plan.root.shared_read_blocks, Some(1));
    assert_eq!(plan.planning_time_ms, Some(0.123));
    assert_eq!(plan.execution_time_ms, Some(0.089));
}

#[test]
fn test_actual_total_time_is_multiplied_by_loops() {
    let json = r#"{"Plan": {
        "Node Type": "Index Scan",
        "Actual Total Time": 0.25,
        "Actual Rows": 1,
        "Actual Loops": 400
    }}"#;

    let plan = parse_json_explain(json).expect("parse failed");

    assert_eq!(plan.root.actual_total_time, Some(100.0));
    // Rows stay per-loop, comparable with Plan Rows
    assert_eq!(plan.root.actual_rows, Some(1.0));
}

#[test]
fn test_parse_sort_details() {
    let json = r#"{"Plan": {
        "Node Type": "Sort",
        "Sort Key": ["created_at DESC", "id"],
        "Sort Method": "external merge",
        "Sort Space Used": 20480,
        "Sort Space Type": "Disk"
    }}"#;

    let plan = parse_json_explain(json).expect("parse failed");

    assert_eq!(plan.root.sort_keys, vec!["created_at DESC", "id"]);
    assert_eq!(plan.root.sort_method.as_deref(), Some("external merge"));
    assert_eq!(plan.root.sort_space_used_kb, Some(20480));
    assert_eq!(plan.root.sort_space_type.as_deref(), Some("Disk"));
}

#[test]
fn test_unknown_keys_are_ignored() {
    let json = r#"{"Plan": {
        "Node Type": "Seq Scan",
        "Parent Relationship": "Outer",
        "Async Capable": false,
        "Some Future Key": {"nested": [1, 2, 3]}
    }}"#;

    let plan = parse_json_explain(json).expect("parse failed");
    assert_eq!(plan.root.node_type, "Seq Scan");
}

#[test]
fn test_missing_node_type_is_malformed() {
    let json = r#"[{"Plan": {"Node Type": "Hash Join", "Plans": [
        {"Node Type": "Seq Scan"},
        {"Relation Name": "users"}
    ]}}]"#;

    let result = parse_json_explain(json);
    assert!(matches!(
        result,
        Err(ParseError::MalformedNode { index: 2, .. })
    ));
}

#[test]
fn test_parse_invalid_json() {
    let result = parse_json_explain("{ not valid json }}}");
    assert!(matches!(result, Err(ParseError::InvalidJson(_))));
}

#[test]
fn test_parse_missing_plan() {
    let json = r#"[{"SomethingElse": {}}]"#;
    assert!(matches!(
        parse_json_explain(json),
        Err(ParseError::MissingPlan)
    ));

    assert!(matches!(parse_json_explain("[]"), Err(ParseError::MissingPlan)));
}

#[test]
fn test_negative_numbers_are_treated_as_absent() {
    let json = r#"{"Node Type": "Result", "Plan Rows": -5, "Actual Total Time": -1.0}"#;

    let plan = parse_json_explain(json).expect("parse failed");

    assert_eq!(plan.root.plan_rows, None);
    assert_eq!(plan.root.actual_total_time, None);
}
