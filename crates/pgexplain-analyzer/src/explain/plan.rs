//! Query Plan Model - Data structures for representing EXPLAIN plans
//!
//! Both the JSON and the text parser produce the same canonical tree: a
//! [`QueryPlan`] wrapping a root [`PlanNode`]. Node types are kept as the
//! open-ended strings PostgreSQL prints (`"Seq Scan"`, `"Hash Join"`, ...);
//! the constants in [`node_types`] name the ones the analyzer reasons about.

use serde::{Deserialize, Serialize};

/// Well-known PostgreSQL operator labels
pub mod node_types {
    pub const SEQ_SCAN: &str = "Seq Scan";
    pub const INDEX_SCAN: &str = "Index Scan";
    pub const INDEX_ONLY_SCAN: &str = "Index Only Scan";
    pub const BITMAP_INDEX_SCAN: &str = "Bitmap Index Scan";
    pub const BITMAP_HEAP_SCAN: &str = "Bitmap Heap Scan";
    pub const NESTED_LOOP: &str = "Nested Loop";
    pub const HASH_JOIN: &str = "Hash Join";
    pub const MERGE_JOIN: &str = "Merge Join";
    pub const HASH: &str = "Hash";
    pub const SORT: &str = "Sort";
    pub const INCREMENTAL_SORT: &str = "Incremental Sort";
    pub const AGGREGATE: &str = "Aggregate";
    pub const LIMIT: &str = "Limit";
}

/// A parsed execution plan plus the statement-level timings reported next to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    /// Root node of the plan tree
    pub root: PlanNode,
    /// Planning time in milliseconds (if available)
    pub planning_time_ms: Option<f64>,
    /// Execution time in milliseconds (if available, from EXPLAIN ANALYZE)
    pub execution_time_ms: Option<f64>,
}

impl QueryPlan {
    /// Creates a new query plan with the given root node
    pub fn new(root: PlanNode) -> Self {
        Self {
            root,
            planning_time_ms: None,
            execution_time_ms: None,
        }
    }

    /// Sets the planning time
    pub fn with_planning_time(mut self, ms: f64) -> Self {
        self.planning_time_ms = Some(ms);
        self
    }

    /// Sets the execution time
    pub fn with_execution_time(mut self, ms: f64) -> Self {
        self.execution_time_ms = Some(ms);
        self
    }

    /// Returns an iterator over all nodes in the plan (depth-first, pre-order)
    pub fn iter_nodes(&self) -> PlanNodeIterator<'_> {
        self.root.iter()
    }

    /// Finds all nodes with the given operator label
    pub fn find_nodes_by_type(&self, node_type: &str) -> Vec<&PlanNode> {
        self.iter_nodes()
            .filter(|n| n.node_type == node_type)
            .collect()
    }

    /// Returns true if the plan contains any sequential scans
    pub fn has_sequential_scans(&self) -> bool {
        self.iter_nodes().any(PlanNode::is_seq_scan)
    }
}

/// Represents a single operator in the plan tree
///
/// `actual_total_time` is the absolute time spent in this node and its subtree
/// across all loops. PostgreSQL reports a per-loop average; both parsers
/// multiply it by `actual_loops` before storing it. `actual_rows` and
/// `actual_startup_time` are kept per-loop, as reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    /// Pre-order position of the node, unique within one plan
    pub id: usize,
    /// Operator label, e.g. `"Seq Scan"`
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_cond: Option<String>,
    /// Join type for join operators (`Inner`, `Left`, `Anti`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<String>,
    /// Hash Cond, Merge Cond or Join Filter, whichever the operator reports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_cond: Option<String>,
    /// Name of the SubPlan/InitPlan this node heads, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subplan_name: Option<String>,
    /// Aggregate/SetOp strategy (`Plain`, `Sorted`, `Hashed`, `Mixed`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// ModifyTable operation (`Insert`, `Update`, `Delete`, `Merge`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default)]
    pub parallel_aware: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    /// Planner estimate of rows per loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_rows: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_startup_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_total_time: Option<f64>,
    /// Observed rows per loop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_loops: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_removed_by_filter: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_space_used_kb: Option<u64>,
    /// `Memory` or `Disk`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_space_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_hit_blocks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_read_blocks: Option<u64>,
    /// Time spent in this node alone, filled in by the metrics pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_time: Option<f64>,
    /// Share of total execution time spent in this node alone (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_percentage: Option<f64>,
    #[serde(default)]
    pub is_bottleneck: bool,
    /// Child nodes, in the order PostgreSQL lists them
    #[serde(default)]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Creates a new plan node with the given id and operator label
    pub fn new(id: usize, node_type: impl Into<String>) -> Self {
        Self {
            id,
            node_type: node_type.into(),
            relation_name: None,
            schema: None,
            alias: None,
            index_name: None,
            filter: None,
            index_cond: None,
            join_type: None,
            join_cond: None,
            subplan_name: None,
            strategy: None,
            operation: None,
            parallel_aware: false,
            startup_cost: None,
            total_cost: None,
            plan_rows: None,
            plan_width: None,
            actual_startup_time: None,
            actual_total_time: None,
            actual_rows: None,
            actual_loops: None,
            rows_removed_by_filter: None,
            sort_keys: Vec::new(),
            sort_method: None,
            sort_space_used_kb: None,
            sort_space_type: None,
            shared_hit_blocks: None,
            shared_read_blocks: None,
            self_time: None,
            time_percentage: None,
            is_bottleneck: false,
            children: Vec::new(),
        }
    }

    /// Sets the relation/table name
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation_name = Some(relation.into());
        self
    }

    /// Sets the index name
    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Sets the filter condition
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the planner row estimate
    pub fn with_plan_rows(mut self, rows: f64) -> Self {
        self.plan_rows = Some(rows);
        self
    }

    /// Sets the measured values from EXPLAIN ANALYZE
    ///
    /// `total_time` is the absolute time across all loops.
    pub fn with_actual(mut self, total_time: f64, rows: f64, loops: u64) -> Self {
        self.actual_total_time = Some(total_time);
        self.actual_rows = Some(rows);
        self.actual_loops = Some(loops);
        self
    }

    /// Adds a child node
    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    /// Returns an iterator over this node and its descendants (pre-order)
    pub fn iter(&self) -> PlanNodeIterator<'_> {
        PlanNodeIterator::new(self)
    }

    /// Returns the total number of nodes in this subtree (including self)
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Returns the maximum depth of this subtree
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        max_depth
    }

    /// Returns true if this is a leaf node (no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true if this node is a sequential scan
    pub fn is_seq_scan(&self) -> bool {
        self.node_type == node_types::SEQ_SCAN
    }

    /// Returns true if this node represents a scan operation
    pub fn is_scan(&self) -> bool {
        self.node_type.ends_with("Scan")
    }

    /// Returns true if this node represents a join operation
    pub fn is_join(&self) -> bool {
        matches!(
            self.node_type.as_str(),
            node_types::NESTED_LOOP | node_types::HASH_JOIN | node_types::MERGE_JOIN
        )
    }

    /// Returns true if the node was planned but never ran (`loops=0`)
    pub fn never_executed(&self) -> bool {
        self.actual_loops == Some(0)
    }

    /// Observed rows when available, otherwise the planner estimate
    pub fn effective_rows(&self) -> Option<f64> {
        self.actual_rows.or(self.plan_rows)
    }

    /// Ratio of observed to estimated rows
    ///
    /// `None` when either side is missing, the estimate is zero, or the node
    /// never executed.
    pub fn estimation_ratio(&self) -> Option<f64> {
        if self.never_executed() {
            return None;
        }
        match (self.actual_rows, self.plan_rows) {
            (Some(actual), Some(planned)) if planned > 0.0 => Some(actual / planned),
            _ => None,
        }
    }

    /// Returns true if the row estimate is off by more than `factor` in either direction
    pub fn has_estimation_error(&self, factor: f64) -> bool {
        self.estimation_ratio()
            .is_some_and(|ratio| ratio < 1.0 / factor || ratio > factor)
    }

    /// Relation name qualified with its schema when one is known
    pub fn qualified_relation(&self) -> Option<String> {
        let relation = self.relation_name.as_deref()?;
        Some(match self.schema.as_deref() {
            Some(schema) => format!("{schema}.{relation}"),
            None => relation.to_string(),
        })
    }
}

/// Iterator for traversing plan nodes depth-first
pub struct PlanNodeIterator<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> PlanNodeIterator<'a> {
    fn new(root: &'a PlanNode) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for PlanNodeIterator<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Push children in reverse order so we visit them in order
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

/// Hands out dense node ids in parse order
///
/// One allocator lives for exactly one parse call, so concurrent analyses
/// never share a counter.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: usize,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> usize {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> usize {
        self.next
    }
}
