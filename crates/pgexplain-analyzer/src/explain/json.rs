//! PostgreSQL JSON EXPLAIN Parser
//!
//! Accepts the output of `EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON)` in any of
//! the shapes it is commonly pasted in:
//! - the array PostgreSQL emits: `[{"Plan": {...}, "Execution Time": ...}]`
//! - a single wrapper object: `{"Plan": {...}}`
//! - a bare plan node: `{"Node Type": "Seq Scan", ...}`
//!
//! # Examples
//!
//! ```
//! use pgexplain_analyzer::explain::parse_json_explain;
//!
//! let json_output = r#"[
//!   {
//!     "Plan": {
//!       "Node Type": "Seq Scan",
//!       "Relation Name": "users",
//!       "Plan Rows": 100
//!     },
//!     "Execution Time": 0.5
//!   }
//! ]"#;
//!
//! let plan = parse_json_explain(json_output).unwrap();
//! assert!(plan.has_sequential_scans());
//! assert_eq!(plan.execution_time_ms, Some(0.5));
//! ```

use crate::error::{ParseError, ParseResult};
use crate::explain::plan::{IdAllocator, PlanNode, QueryPlan};
use serde_json::Value;

/// Parses PostgreSQL EXPLAIN (FORMAT JSON) output
pub fn parse_json_explain(json: &str) -> ParseResult<QueryPlan> {
    let value: Value = serde_json::from_str(json.trim())?;

    let wrapper = match &value {
        Value::Array(items) => items.first().ok_or(ParseError::MissingPlan)?,
        other => other,
    };

    let plan_obj = if let Some(plan) = wrapper.get("Plan") {
        plan
    } else if wrapper.get("Node Type").is_some() {
        wrapper
    } else {
        return Err(ParseError::MissingPlan);
    };

    let mut ids = IdAllocator::new();
    let root = parse_plan_node(plan_obj, &mut ids)?;
    let mut plan = QueryPlan::new(root);

    plan.planning_time_ms = wrapper.get("Planning Time").and_then(Value::as_f64);
    plan.execution_time_ms = wrapper
        .get("Execution Time")
        .or_else(|| wrapper.get("Total Runtime"))
        .and_then(Value::as_f64);

    tracing::debug!(
        nodes = ids.allocated(),
        execution_time_ms = ?plan.execution_time_ms,
        "Parsed JSON plan"
    );

    Ok(plan)
}

/// Parses a single plan node (and its subtree) from JSON
///
/// Ids are taken before descending into `Plans`, which yields pre-order
/// numbering.
fn parse_plan_node(value: &Value, ids: &mut IdAllocator) -> ParseResult<PlanNode> {
    let id = ids.next_id();

    if !value.is_object() {
        return Err(ParseError::MalformedNode {
            index: id,
            reason: "plan node is not an object".into(),
        });
    }

    let node_type = value
        .get("Node Type")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ParseError::MalformedNode {
            index: id,
            reason: "missing Node Type".into(),
        })?;

    let mut node = PlanNode::new(id, node_type);

    node.relation_name = get_string(value, "Relation Name");
    node.schema = get_string(value, "Schema");
    node.alias = get_string(value, "Alias");
    node.index_name = get_string(value, "Index Name");
    node.filter = get_string(value, "Filter");
    node.index_cond = get_string(value, "Index Cond");
    node.join_type = get_string(value, "Join Type");
    node.join_cond = get_string(value, "Hash Cond")
        .or_else(|| get_string(value, "Merge Cond"))
        .or_else(|| get_string(value, "Join Filter"));
    node.subplan_name = get_string(value, "Subplan Name");
    node.strategy = get_string(value, "Strategy");
    node.operation = get_string(value, "Operation");
    node.parallel_aware = value
        .get("Parallel Aware")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // Planner estimates
    node.startup_cost = get_f64(value, "Startup Cost");
    node.total_cost = get_f64(value, "Total Cost");
    node.plan_rows = get_f64(value, "Plan Rows");
    node.plan_width = value
        .get("Plan Width")
        .and_then(Value::as_u64)
        .and_then(|w| u32::try_from(w).ok());

    // Actual values from EXPLAIN ANALYZE
    node.actual_loops = value.get("Actual Loops").and_then(Value::as_u64);
    node.actual_rows = get_f64(value, "Actual Rows");
    node.actual_startup_time = get_f64(value, "Actual Startup Time");
    // Reported per loop; stored as the total across loops
    let loops = node.actual_loops.unwrap_or(1).max(1) as f64;
    node.actual_total_time = get_f64(value, "Actual Total Time").map(|t| t * loops);
    node.rows_removed_by_filter = get_f64(value, "Rows Removed by Filter");

    // Sort information
    if let Some(keys) = value.get("Sort Key").and_then(Value::as_array) {
        node.sort_keys = keys
            .iter()
            .filter_map(|k| k.as_str().map(String::from))
            .collect();
    }
    node.sort_method = get_string(value, "Sort Method");
    node.sort_space_used_kb = value.get("Sort Space Used").and_then(Value::as_u64);
    node.sort_space_type = get_string(value, "Sort Space Type");

    // Buffers
    node.shared_hit_blocks = value.get("Shared Hit Blocks").and_then(Value::as_u64);
    node.shared_read_blocks = value.get("Shared Read Blocks").and_then(Value::as_u64);

    if let Some(plans) = value.get("Plans") {
        let plans = plans.as_array().ok_or_else(|| ParseError::MalformedNode {
            index: id,
            reason: "Plans is not an array".into(),
        })?;
        for child_value in plans {
            let child = parse_plan_node(child_value, ids)?;
            node.children.push(child);
        }
    }

    Ok(node)
}

fn get_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

/// Reads a non-negative number; anything else counts as absent
fn get_f64(value: &Value, key: &str) -> Option<f64> {
    value
        .get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
}

#[cfg(test)]
mod tests;
