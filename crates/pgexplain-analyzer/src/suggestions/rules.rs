//! Detection rules
//!
//! Each rule walks the annotated tree in pre-order and reports what it finds.
//! `matches` functions are exposed crate-wide so [`BottleneckNode`] can skip
//! nodes another rule already explains.

use crate::config::AnalyzerConfig;
use crate::explain::expr::{find_top_level, split_top_level, strip_outer_parens};
use crate::explain::{PlanNode, node_types};
use crate::metrics::is_large_seq_scan;
use crate::suggestions::analyzer::{Recommendation, Rule, RuleKind, SeverityLevel};
use serde_json::Value;

/// The built-in rules, in run order
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(SeqScanOnLargeTable),
        Box::new(NestedLoopWithLargeOuter),
        Box::new(EstimationMismatch),
        Box::new(BottleneckNode),
        Box::new(SortSpillsToDisk),
        Box::new(InefficientFilter),
    ]
}

/// Filtered Seq Scan reading more rows than the large-scan threshold
pub struct SeqScanOnLargeTable;

impl SeqScanOnLargeTable {
    pub(crate) fn matches(node: &PlanNode, config: &AnalyzerConfig) -> bool {
        node.filter.is_some() && is_large_seq_scan(node, config)
    }
}

impl Rule for SeqScanOnLargeTable {
    fn kind(&self) -> RuleKind {
        RuleKind::SeqScanOnLargeTable
    }

    fn check(&self, root: &PlanNode, config: &AnalyzerConfig) -> Vec<Recommendation> {
        root.iter()
            .filter(|node| Self::matches(node, config))
            .map(|node| {
                let rows = node.effective_rows().unwrap_or(0.0);
                let critical = rows > config.critical_seq_scan_rows
                    || node
                        .time_percentage
                        .is_some_and(|pct| pct > config.critical_time_percentage);
                let severity = if critical {
                    SeverityLevel::Critical
                } else {
                    SeverityLevel::Warning
                };

                let filter = node.filter.clone().unwrap_or_default();
                let columns = extract_index_columns(&filter);

                Recommendation::new(self.kind(), severity)
                    .for_node(node.id)
                    .with_param("relation", display_relation(node))
                    .with_param("rows", rows)
                    .with_param("filter", filter)
                    .with_param("percentage", optional(node.time_percentage))
                    .with_param("columns", columns.clone())
                    .with_sql(create_index_sql(node, &columns))
            })
            .collect()
    }
}

/// Nested loop whose larger input exceeds the row threshold while the inner
/// side is re-executed
pub struct NestedLoopWithLargeOuter;

impl NestedLoopWithLargeOuter {
    pub(crate) fn matches(node: &PlanNode, config: &AnalyzerConfig) -> bool {
        let Some((outer, inner)) = join_sides(node) else {
            return false;
        };
        let rows = total_rows(outer).max(total_rows(inner));
        rows > config.nested_loop_rows && inner.actual_loops.is_some_and(|loops| loops > 1)
    }
}

impl Rule for NestedLoopWithLargeOuter {
    fn kind(&self) -> RuleKind {
        RuleKind::NestedLoopWithLargeOuter
    }

    fn check(&self, root: &PlanNode, config: &AnalyzerConfig) -> Vec<Recommendation> {
        let mut found = Vec::new();

        for node in root.iter().filter(|node| Self::matches(node, config)) {
            let Some((outer, inner)) = join_sides(node) else {
                continue;
            };
            let rows = total_rows(outer).max(total_rows(inner));
            let join_column = inner_join_column(node, inner);

            let sql = match (&join_column, inner.relation_name.as_deref()) {
                (Some(column), Some(_)) if inner.is_seq_scan() => {
                    create_index_sql(inner, std::slice::from_ref(column))
                }
                _ => None,
            };

            found.push(
                Recommendation::new(self.kind(), SeverityLevel::Warning)
                    .for_node(node.id)
                    .with_param("rows", rows)
                    .with_param("inner_type", inner.node_type.clone())
                    .with_param("inner_relation", optional(inner.qualified_relation()))
                    .with_param("inner_loops", inner.actual_loops.unwrap_or(0))
                    .with_param("join_column", optional(join_column))
                    .with_sql(sql),
            );
        }

        found
    }
}

/// Node whose row estimate is off by more than the estimation factor
pub struct EstimationMismatch;

impl Rule for EstimationMismatch {
    fn kind(&self) -> RuleKind {
        RuleKind::EstimationMismatch
    }

    fn check(&self, root: &PlanNode, config: &AnalyzerConfig) -> Vec<Recommendation> {
        let mut found = Vec::new();

        for node in root.iter() {
            if !node.has_estimation_error(config.estimation_factor) {
                continue;
            }
            let (Some(actual), Some(planned)) = (node.actual_rows, node.plan_rows) else {
                continue;
            };

            // Fractional per-loop rows still count; zero is treated as one row
            let smaller = actual.min(planned);
            let factor = actual.max(planned) / if smaller > 0.0 { smaller } else { 1.0 };
            let severity = if factor > config.severe_estimation_factor {
                SeverityLevel::Warning
            } else {
                SeverityLevel::Info
            };
            let relation = first_relation(node);

            found.push(
                Recommendation::new(self.kind(), severity)
                    .for_node(node.id)
                    .with_param("node_type", node.node_type.clone())
                    .with_param("relation", optional(relation.clone()))
                    .with_param("planned", planned)
                    .with_param("actual", actual)
                    .with_param("factor", factor)
                    .with_param("direction", if actual > planned { "under" } else { "over" })
                    .with_sql(relation.map(|relation| format!("ANALYZE {relation};"))),
            );
        }

        found
    }
}

/// Node flagged as a bottleneck that no more specific rule explains
pub struct BottleneckNode;

impl BottleneckNode {
    fn covered_elsewhere(node: &PlanNode, config: &AnalyzerConfig) -> bool {
        SeqScanOnLargeTable::matches(node, config)
            || NestedLoopWithLargeOuter::matches(node, config)
            || SortSpillsToDisk::matches(node)
    }
}

impl Rule for BottleneckNode {
    fn kind(&self) -> RuleKind {
        RuleKind::BottleneckNode
    }

    fn check(&self, root: &PlanNode, config: &AnalyzerConfig) -> Vec<Recommendation> {
        root.iter()
            .filter(|node| node.is_bottleneck && !Self::covered_elsewhere(node, config))
            .filter(|node| {
                // Tiny plans put 100% of their time somewhere; only real time counts
                let slow = node.time_percentage.is_some_and(|pct| pct > config.bottleneck_percentage)
                    && node
                        .self_time
                        .is_some_and(|ms| ms >= config.bottleneck_min_self_time_ms);
                slow || is_large_seq_scan(node, config)
            })
            .map(|node| {
                Recommendation::new(self.kind(), SeverityLevel::Warning)
                    .for_node(node.id)
                    .with_param("node_id", node.id)
                    .with_param("node_type", node.node_type.clone())
                    .with_param("relation", optional(node.qualified_relation()))
                    .with_param("percentage", optional(node.time_percentage))
                    .with_param("self_time", optional(node.self_time))
                    .with_param("rows", node.effective_rows().unwrap_or(0.0))
            })
            .collect()
    }
}

/// Sort that wrote temporary files
pub struct SortSpillsToDisk;

impl SortSpillsToDisk {
    pub(crate) fn matches(node: &PlanNode) -> bool {
        let is_sort = matches!(
            node.node_type.as_str(),
            node_types::SORT | node_types::INCREMENTAL_SORT
        );
        let on_disk = node
            .sort_space_type
            .as_deref()
            .is_some_and(|space| space.eq_ignore_ascii_case("disk"));
        let external = node
            .sort_method
            .as_deref()
            .is_some_and(|method| method.to_lowercase().contains("external"));
        is_sort && (on_disk || external)
    }
}

impl Rule for SortSpillsToDisk {
    fn kind(&self) -> RuleKind {
        RuleKind::SortSpillsToDisk
    }

    fn check(&self, root: &PlanNode, _config: &AnalyzerConfig) -> Vec<Recommendation> {
        root.iter()
            .filter(|node| Self::matches(node))
            .map(|node| {
                let disk_kb = node
                    .sort_space_used_kb
                    .filter(|_| node.sort_space_type.as_deref() != Some("Memory"));
                // Twice the spilled size, in whole megabytes
                let work_mem_mb = disk_kb.map(|kb| kb.div_ceil(512).max(1));

                Recommendation::new(self.kind(), SeverityLevel::Warning)
                    .for_node(node.id)
                    .with_param("node_type", node.node_type.clone())
                    .with_param("method", node.sort_method.clone().unwrap_or_else(|| "external sort".into()))
                    .with_param("sort_keys", node.sort_keys.join(", "))
                    .with_param("disk_kb", optional(disk_kb))
                    .with_param("work_mem_mb", optional(work_mem_mb))
                    .with_sql(work_mem_mb.map(|mb| format!("SET work_mem = '{mb}MB';")))
            })
            .collect()
    }
}

/// Non-Seq-Scan node whose filter throws away most of the rows it read
pub struct InefficientFilter;

impl InefficientFilter {
    /// `(removed, kept, ratio)` when the filter qualifies
    fn measure(node: &PlanNode, config: &AnalyzerConfig) -> Option<(f64, f64, f64)> {
        if node.is_seq_scan() || node.filter.is_none() {
            return None;
        }
        let removed = node.rows_removed_by_filter?;
        let kept = node.actual_rows?;
        if removed < config.filter_min_removed_rows {
            return None;
        }
        let ratio = removed / (removed + kept);
        (ratio >= config.filter_ratio).then_some((removed, kept, ratio))
    }
}

impl Rule for InefficientFilter {
    fn kind(&self) -> RuleKind {
        RuleKind::InefficientFilter
    }

    fn check(&self, root: &PlanNode, config: &AnalyzerConfig) -> Vec<Recommendation> {
        let mut found = Vec::new();

        for node in root.iter() {
            let Some((removed, kept, ratio)) = Self::measure(node, config) else {
                continue;
            };
            let filter = node.filter.clone().unwrap_or_default();
            let columns = extract_index_columns(&filter);

            found.push(
                Recommendation::new(self.kind(), SeverityLevel::Info)
                    .for_node(node.id)
                    .with_param("node_type", node.node_type.clone())
                    .with_param("relation", optional(node.qualified_relation()))
                    .with_param("filter", filter)
                    .with_param("removed", removed)
                    .with_param("kept", kept)
                    .with_param("ratio", ratio * 100.0)
                    .with_param("columns", columns.clone())
                    .with_sql(create_index_sql(node, &columns)),
            );
        }

        found
    }
}

/// Comparison operators, longest spelling first so `>=` wins over `>`
const COMPARISON_OPERATORS: &[&str] = &[
    " IS NOT DISTINCT FROM ",
    " IS DISTINCT FROM ",
    " IS NOT ",
    " IS ",
    " NOT LIKE ",
    " NOT ILIKE ",
    " LIKE ",
    " ILIKE ",
    " !~~* ",
    " !~~ ",
    " ~~* ",
    " ~~ ",
    " <> ",
    " != ",
    " >= ",
    " <= ",
    " = ",
    " > ",
    " < ",
];

/// Columns worth indexing for a filter expression, best effort
///
/// Conjuncts are split on top-level `AND`; each contributes the column on one
/// side of its first comparison. A top-level `OR` can't be served by a single
/// B-tree index, so it yields nothing. Expressions, function calls and
/// literals on both sides are skipped rather than guessed at.
pub fn extract_index_columns(filter: &str) -> Vec<String> {
    let expr = strip_outer_parens(filter);
    if expr.is_empty() || !find_top_level(expr, " OR ").is_empty() {
        return Vec::new();
    }

    let mut columns: Vec<String> = Vec::new();
    for conjunct in split_top_level(expr, " AND ") {
        let Some((left, right)) = split_comparison(strip_outer_parens(conjunct)) else {
            continue;
        };
        let column = column_name(left).or_else(|| {
            if is_literal(left) {
                column_name(right)
            } else {
                None
            }
        });
        if let Some((_, column)) = column
            && !columns.contains(&column)
        {
            columns.push(column);
        }
    }

    columns
}

/// `CREATE INDEX idx_<table>_<cols> ON <relation> (<cols>);`
///
/// `None` unless both the relation and at least one column are known.
pub fn create_index_sql(node: &PlanNode, columns: &[String]) -> Option<String> {
    let table = node.relation_name.as_deref()?;
    let target = node.qualified_relation()?;
    if columns.is_empty() {
        return None;
    }

    let suffix: Vec<String> = columns
        .iter()
        .map(|column| column.trim_matches('"').to_lowercase())
        .collect();
    let index_name = format!(
        "idx_{}_{}",
        table.trim_matches('"').to_lowercase(),
        suffix.join("_")
    );

    Some(format!(
        "CREATE INDEX {index_name} ON {target} ({});",
        columns.join(", ")
    ))
}

/// Splits `lhs <op> rhs` at the first top-level comparison operator
fn split_comparison(expr: &str) -> Option<(&str, &str)> {
    let mut best: Option<(usize, &str)> = None;
    for &op in COMPARISON_OPERATORS {
        if let Some(&pos) = find_top_level(expr, op).first() {
            let better = match best {
                None => true,
                Some((best_pos, best_op)) => {
                    pos < best_pos || (pos == best_pos && op.len() > best_op.len())
                }
            };
            if better {
                best = Some((pos, op));
            }
        }
    }

    let (pos, op) = best?;
    Some((&expr[..pos], &expr[pos + op.len()..]))
}

/// Parses one side of a comparison as an optionally qualified column
///
/// Returns `(qualifier, column)`; casts like `::text` are dropped.
fn column_name(side: &str) -> Option<(Option<String>, String)> {
    let side = strip_outer_parens(side);
    let side = match find_top_level(side, "::").first() {
        Some(&pos) => strip_outer_parens(&side[..pos]),
        None => side,
    };
    if side.is_empty() || is_literal(side) {
        return None;
    }

    let (qualifier, column) = match side.rsplit_once('.') {
        Some((qualifier, column)) => (Some(qualifier), column),
        None => (None, side),
    };

    if !is_identifier(column) || qualifier.is_some_and(|q| !is_identifier(q)) {
        return None;
    }
    Some((qualifier.map(String::from), column.to_string()))
}

fn is_identifier(text: &str) -> bool {
    if text.len() > 2 && text.starts_with('"') && text.ends_with('"') {
        return !text[1..text.len() - 1].contains('"');
    }
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn is_literal(text: &str) -> bool {
    let text = strip_outer_parens(text);
    text.starts_with('\'')
        || text.starts_with('$')
        || text.starts_with("ANY ")
        || text.starts_with("ARRAY[")
        || text.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '-')
        || matches!(
            text.to_ascii_uppercase().as_str(),
            "NULL" | "TRUE" | "FALSE" | "CURRENT_DATE" | "CURRENT_TIMESTAMP" | "NOW()"
        )
}

/// Column of the inner side referenced by the join condition
///
/// Looks at the nested loop's join filter and the inner node's own
/// conditions, keeping the first comparison side qualified with the inner
/// node's alias or relation.
fn inner_join_column(join: &PlanNode, inner: &PlanNode) -> Option<String> {
    let names: Vec<&str> = [inner.alias.as_deref(), inner.relation_name.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if names.is_empty() {
        return None;
    }

    let conditions = [
        join.join_cond.as_deref(),
        inner.filter.as_deref(),
        inner.index_cond.as_deref(),
    ];
    for condition in conditions.into_iter().flatten() {
        for conjunct in split_top_level(strip_outer_parens(condition), " AND ") {
            let Some((left, right)) = split_comparison(strip_outer_parens(conjunct)) else {
                continue;
            };
            for side in [left, right] {
                if let Some((Some(qualifier), column)) = column_name(side)
                    && names.contains(&qualifier.as_str())
                {
                    return Some(column);
                }
            }
        }
    }

    None
}

/// Outer and inner input of a nested loop
fn join_sides(node: &PlanNode) -> Option<(&PlanNode, &PlanNode)> {
    if node.node_type != node_types::NESTED_LOOP {
        return None;
    }
    match node.children.as_slice() {
        [outer, inner, ..] => Some((outer, inner)),
        _ => None,
    }
}

/// Rows produced across all loops
fn total_rows(node: &PlanNode) -> f64 {
    let loops = node.actual_loops.unwrap_or(1) as f64;
    node.actual_rows.unwrap_or(0.0) * loops
}

/// The node's relation, or the first one in its subtree
fn first_relation(node: &PlanNode) -> Option<String> {
    node.iter().find_map(PlanNode::qualified_relation)
}

fn display_relation(node: &PlanNode) -> String {
    node.qualified_relation()
        .or_else(|| node.alias.clone())
        .unwrap_or_else(|| "?".to_string())
}

fn optional<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}
