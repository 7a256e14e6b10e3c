//! PostgreSQL Text EXPLAIN Parser
//!
//! The default EXPLAIN output encodes the tree purely through indentation:
//! every non-root operator starts with `->`, and lines without an arrow are
//! details (`Filter:`, `Sort Method:`, ...) of the operator above them.
//!
//! Nodes are collected into a flat arena while an indentation stack tracks
//! the current ancestry, so parsing is a single linear pass with no recursion.
//! Text-only spellings are mapped onto the shape the JSON format uses
//! (`Hash Left Join` becomes a `Hash Join` with join type `Left`,
//! `HashAggregate` becomes an `Aggregate` with strategy `Hashed`), which keeps
//! both parsers producing the same tree for the same plan.
//!
//! # Examples
//!
//! ```
//! use pgexplain_analyzer::explain::parse_text_explain;
//!
//! let text = "Hash Join  (cost=10.00..100.00 rows=500 width=72)
//!    ->  Seq Scan on orders o  (cost=0.00..50.00 rows=1000 width=36)
//!    ->  Hash  (cost=5.00..10.00 rows=100 width=36)
//!          ->  Seq Scan on users u  (cost=0.00..5.00 rows=100 width=36)";
//!
//! let plan = parse_text_explain(text).unwrap();
//! assert_eq!(plan.root.node_type, "Hash Join");
//! assert_eq!(plan.root.children[1].children[0].relation_name.as_deref(), Some("users"));
//! ```

use crate::error::{ParseError, ParseResult};
use crate::explain::detect::is_operator_label;
use crate::explain::expr::split_top_level;
use crate::explain::plan::{IdAllocator, PlanNode, QueryPlan};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?P<label>.+?)
        (?:\s+\(cost=(?P<startup>\d+(?:\.\d+)?)\.\.(?P<total>\d+(?:\.\d+)?)
            \s+rows=(?P<rows>\d+(?:\.\d+)?)\s+width=(?P<width>\d+)\))?
        (?:\s+\(actual
            (?:\s+time=(?P<astart>\d+(?:\.\d+)?)\.\.(?P<atotal>\d+(?:\.\d+)?))?
            \s+rows=(?P<arows>\d+(?:\.\d+)?)\s+loops=(?P<loops>\d+)\))?
        (?P<never>\s+\(never\s+executed\))?
        \s*$",
    )
    .expect("valid regex")
});

static LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<type>.+?)(?:\s+using\s+(?P<index>\S+))?(?:\s+on\s+(?P<target>\S+)(?:\s+(?P<alias>\S+))?)?$",
    )
    .expect("valid regex")
});

static JOIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<algo>Hash|Merge)(?:\s+(?P<htype>.+?))?\s+Join|Nested Loop(?:\s+(?P<ntype>.+?)\s+Join)?)$")
        .expect("valid regex")
});

static AGGREGATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:Partial|Finalize)\s+)?(?P<strategy>Hash|Group|Mixed)?Aggregate$")
        .expect("valid regex")
});

static SORT_METHOD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<method>.+?)\s+(?P<space>Memory|Disk):\s*(?P<kb>\d+)kB").expect("valid regex")
});

static SUBPLAN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:SubPlan|InitPlan|CTE)\s+\S+").expect("valid regex"));

/// Operators whose `on X` names an alias for a non-table source
const NON_RELATION_SCANS: &[&str] = &[
    "CTE Scan",
    "Function Scan",
    "Subquery Scan",
    "Values Scan",
    "WorkTable Scan",
    "Table Function Scan",
    "Named Tuplestore Scan",
];

/// Parses PostgreSQL text-format EXPLAIN output
pub fn parse_text_explain(text: &str) -> ParseResult<QueryPlan> {
    let mut builder = TextPlanBuilder::default();

    for (idx, line) in text.lines().enumerate() {
        builder.feed_line(idx + 1, line)?;
    }

    builder.finish()
}

#[derive(Debug)]
struct ArenaNode {
    node: PlanNode,
    parent: Option<usize>,
    line: usize,
}

#[derive(Debug, Default)]
struct TextPlanBuilder {
    arena: Vec<ArenaNode>,
    /// `(indent, arena index)` for the current chain of ancestors
    stack: Vec<(usize, usize)>,
    ids: IdAllocator,
    pending_subplan: Option<String>,
    in_trailer: bool,
    planning_time_ms: Option<f64>,
    execution_time_ms: Option<f64>,
}

impl TextPlanBuilder {
    fn feed_line(&mut self, line_no: usize, line: &str) -> ParseResult<()> {
        let content = line.trim();

        if content.is_empty() || is_decoration(content) {
            return Ok(());
        }

        if self.capture_trailer(content) {
            return Ok(());
        }

        if let Some(header) = content.strip_prefix("->") {
            let indent = leading_whitespace(line);
            let index = self.ids.allocated();
            let node = parse_header(header.trim(), index, line_no)?.ok_or_else(|| {
                ParseError::MalformedNode {
                    index,
                    reason: format!("line {line_no}: missing operator after '->'"),
                }
            })?;
            self.in_trailer = false;
            return self.push_node(indent, node, line_no);
        }

        if self.arena.is_empty() {
            return match parse_header(content, 0, line_no) {
                Ok(Some(node)) if looks_like_root(content, &node) => {
                    self.push_node(leading_whitespace(line), node, line_no)
                }
                // Leading commentary such as "Settings: ..." before the plan
                _ if is_detail_line(content) => Ok(()),
                _ => Err(ParseError::MalformedRoot {
                    line: line_no,
                    content: content.to_string(),
                }),
            };
        }

        if self.in_trailer {
            return Ok(());
        }

        if SUBPLAN_REGEX.is_match(content) {
            self.pending_subplan = Some(content.to_string());
            return Ok(());
        }

        if let Some(last) = self.arena.last_mut() {
            apply_detail(&mut last.node, content);
        }
        Ok(())
    }

    /// Handles statement-level lines that follow the plan
    fn capture_trailer(&mut self, content: &str) -> bool {
        let lower = content.to_lowercase();

        if lower.starts_with("planning time:") {
            self.planning_time_ms = extract_time_ms(content);
        } else if lower.starts_with("execution time:") || lower.starts_with("total runtime:") {
            self.execution_time_ms = extract_time_ms(content);
        } else if matches!(lower.as_str(), "planning:" | "jit:" | "triggers:")
            || lower.starts_with("trigger ")
        {
            // Section headers whose indented detail lines are not about any node
        } else {
            return false;
        }

        self.in_trailer = true;
        true
    }

    fn push_node(&mut self, indent: usize, mut node: PlanNode, line_no: usize) -> ParseResult<()> {
        while self.stack.last().is_some_and(|(top, _)| *top >= indent) {
            self.stack.pop();
        }

        let parent = if self.arena.is_empty() {
            None
        } else {
            if self.stack.is_empty() {
                return Err(ParseError::MalformedNode {
                    index: self.ids.allocated(),
                    reason: format!("line {line_no}: operator is not nested under the plan root"),
                });
            }
            let (_, parent) = self
                .stack
                .last()
                .copied()
                .ok_or(ParseError::StackUnderflow { line: line_no })?;
            Some(parent)
        };

        node.id = self.ids.next_id();
        node.subplan_name = self.pending_subplan.take();

        self.arena.push(ArenaNode {
            node,
            parent,
            line: line_no,
        });
        self.stack.push((indent, self.arena.len() - 1));
        Ok(())
    }

    /// Folds the arena into an owned tree
    ///
    /// Children always sit after their parent in the arena, so walking it
    /// backwards moves every subtree into its parent after the subtree is
    /// complete.
    fn finish(self) -> ParseResult<QueryPlan> {
        if self.arena.is_empty() {
            return Err(ParseError::NoPlanNodes);
        }

        let node_count = self.arena.len();
        let mut parents = Vec::with_capacity(node_count);
        let mut lines = Vec::with_capacity(node_count);
        let mut slots = Vec::with_capacity(node_count);
        for entry in self.arena {
            parents.push(entry.parent);
            lines.push(entry.line);
            slots.push(Some(entry.node));
        }

        for idx in (1..node_count).rev() {
            let underflow = ParseError::StackUnderflow { line: lines[idx] };
            let parent = match parents[idx] {
                Some(parent) if parent < idx => parent,
                _ => return Err(underflow),
            };
            let mut node = slots[idx].take().ok_or(underflow)?;
            node.children.reverse();
            slots[parent]
                .as_mut()
                .ok_or(ParseError::StackUnderflow { line: lines[parent] })?
                .children
                .push(node);
        }

        let mut root = slots[0]
            .take()
            .ok_or(ParseError::StackUnderflow { line: lines[0] })?;
        root.children.reverse();

        let mut plan = QueryPlan::new(root);
        plan.planning_time_ms = self.planning_time_ms;
        plan.execution_time_ms = self.execution_time_ms;

        tracing::debug!(
            nodes = node_count,
            execution_time_ms = ?plan.execution_time_ms,
            "Parsed text plan"
        );

        Ok(plan)
    }
}

/// Parses an operator header (without the `->` marker)
///
/// Returns `Ok(None)` when the line has no recognizable header shape and an
/// error when it clearly is a header whose statistics are garbled.
fn parse_header(header: &str, index: usize, line_no: usize) -> ParseResult<Option<PlanNode>> {
    let Some(caps) = HEADER_REGEX.captures(header) else {
        return Ok(None);
    };

    let label = caps.name("label").map_or("", |m| m.as_str()).trim();
    if label.is_empty() {
        return Ok(None);
    }
    if label.contains("(cost=") || label.contains("(actual ") {
        return Err(ParseError::MalformedNode {
            index,
            reason: format!("line {line_no}: malformed statistics in '{header}'"),
        });
    }

    // The id is assigned when the node is placed in the tree
    let mut node = parse_label(label);

    node.startup_cost = capture_f64(&caps, "startup");
    node.total_cost = capture_f64(&caps, "total");
    node.plan_rows = capture_f64(&caps, "rows");
    node.plan_width = caps.name("width").and_then(|m| m.as_str().parse().ok());

    if caps.name("arows").is_some() {
        let loops = caps
            .name("loops")
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(1);
        node.actual_loops = Some(loops);
        node.actual_rows = capture_f64(&caps, "arows");
        node.actual_startup_time = capture_f64(&caps, "astart");
        // Reported per loop; stored as the total across loops
        node.actual_total_time = capture_f64(&caps, "atotal").map(|t| t * loops.max(1) as f64);
    } else if caps.name("never").is_some() {
        node.actual_loops = Some(0);
        node.actual_rows = Some(0.0);
        node.actual_startup_time = Some(0.0);
        node.actual_total_time = Some(0.0);
    }

    Ok(Some(node))
}

fn looks_like_root(content: &str, node: &PlanNode) -> bool {
    node.startup_cost.is_some()
        || node.actual_loops.is_some()
        || is_operator_label(content)
}

/// Splits `Index Scan using idx on public.users u` into its parts
fn parse_label(label: &str) -> PlanNode {
    let (label, parallel_aware) = match label.strip_prefix("Parallel ") {
        Some(rest) => (rest.trim(), true),
        None => (label, false),
    };

    let mut node = PlanNode::new(0, label);
    node.parallel_aware = parallel_aware;

    let Some(caps) = LABEL_REGEX.captures(label) else {
        return node;
    };

    let raw_type = caps.name("type").map_or(label, |m| m.as_str()).trim();
    let raw_type = raw_type.strip_suffix(" Backward").unwrap_or(raw_type);
    node.node_type = raw_type.to_string();
    node.index_name = caps.name("index").map(|m| m.as_str().to_string());

    let target = caps.name("target").map(|m| m.as_str());
    let alias = caps.name("alias").map(|m| m.as_str().to_string());

    if let Some(target) = target {
        if raw_type == "Bitmap Index Scan" {
            node.index_name = Some(target.to_string());
        } else if NON_RELATION_SCANS.contains(&raw_type) {
            node.alias = alias.or_else(|| Some(target.to_string()));
        } else {
            let (schema, relation) = match target.rsplit_once('.') {
                Some((schema, relation)) => (Some(schema.to_string()), relation.to_string()),
                None => (None, target.to_string()),
            };
            node.schema = schema;
            // Text output omits the alias when it equals the relation name
            node.alias = alias.or_else(|| Some(relation.clone()));
            node.relation_name = Some(relation);
        }
    }

    normalize_node_type(&mut node);
    node
}

/// Maps text-only operator spellings onto the labels the JSON format uses
fn normalize_node_type(node: &mut PlanNode) {
    if let Some(caps) = JOIN_REGEX.captures(&node.node_type) {
        let (base, join_type) = match caps.name("algo") {
            Some(algo) => (format!("{} Join", algo.as_str()), caps.name("htype")),
            None => ("Nested Loop".to_string(), caps.name("ntype")),
        };
        node.join_type = Some(join_type.map_or("Inner", |m| m.as_str()).to_string());
        node.node_type = base;
        return;
    }

    if let Some(caps) = AGGREGATE_REGEX.captures(&node.node_type) {
        node.strategy = Some(
            match caps.name("strategy").map(|m| m.as_str()) {
                Some("Hash") => "Hashed",
                Some("Group") => "Sorted",
                Some("Mixed") => "Mixed",
                _ => "Plain",
            }
            .to_string(),
        );
        node.node_type = "Aggregate".to_string();
        return;
    }

    // `HashSetOp Except All` carries the command after the operator name
    let strategy = match node.node_type.split_whitespace().next() {
        Some("HashSetOp") => Some("Hashed"),
        Some("SetOp") => Some("Sorted"),
        _ => None,
    };
    if let Some(strategy) = strategy {
        node.strategy = Some(strategy.to_string());
        node.node_type = "SetOp".to_string();
        return;
    }

    match node.node_type.as_str() {
        "Insert" | "Update" | "Delete" | "Merge" => {
            node.operation = Some(node.node_type.clone());
            node.node_type = "ModifyTable".to_string();
        }
        _ => {}
    }
}

/// Attaches a `Key: value` detail line to the node it belongs to
fn apply_detail(node: &mut PlanNode, content: &str) {
    let Some((key, value)) = content.split_once(':') else {
        return;
    };
    let value = value.trim();

    match key.trim() {
        "Filter" => node.filter = Some(value.to_string()),
        "Index Cond" => node.index_cond = Some(value.to_string()),
        "Hash Cond" | "Merge Cond" | "Join Filter" => {
            if node.join_cond.is_none() {
                node.join_cond = Some(value.to_string());
            }
        }
        "Rows Removed by Filter" => node.rows_removed_by_filter = value.parse().ok(),
        "Sort Key" | "Presorted Key" if node.sort_keys.is_empty() => {
            node.sort_keys = split_top_level(value, ", ")
                .into_iter()
                .map(String::from)
                .collect();
        }
        "Sort Method" => {
            if let Some(caps) = SORT_METHOD_REGEX.captures(value) {
                node.sort_method = caps.name("method").map(|m| m.as_str().trim().to_string());
                node.sort_space_type = caps.name("space").map(|m| m.as_str().to_string());
                node.sort_space_used_kb = caps.name("kb").and_then(|m| m.as_str().parse().ok());
            } else {
                node.sort_method = Some(value.to_string());
            }
        }
        "Buffers" => apply_buffers(node, value),
        // Output, Workers Planned, Heap Fetches, ... are not modelled
        _ => {}
    }
}

/// Reads `shared hit=5 read=10 dirtied=1, temp read=3`
fn apply_buffers(node: &mut PlanNode, value: &str) {
    let Some(shared) = value
        .split(',')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("shared"))
    else {
        return;
    };

    for pair in shared.split_whitespace() {
        match pair.split_once('=') {
            Some(("hit", n)) => node.shared_hit_blocks = n.parse().ok(),
            Some(("read", n)) => node.shared_read_blocks = n.parse().ok(),
            _ => {}
        }
    }
}

fn capture_f64(caps: &Captures<'_>, name: &str) -> Option<f64> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

/// psql decorations around the plan: header, ruler, row-count footer
fn is_decoration(content: &str) -> bool {
    let is_footer =
        content.starts_with('(') && (content.ends_with(" rows)") || content.ends_with(" row)"));
    content == "QUERY PLAN" || content.chars().all(|c| c == '-' || c == '+') || is_footer
}

/// `Key: value` lines that carry no operator of their own
fn is_detail_line(content: &str) -> bool {
    content
        .split_once(':')
        .is_some_and(|(key, _)| !key.is_empty() && !key.contains('('))
}

/// Helper to count leading whitespace (indentation)
fn leading_whitespace(s: &str) -> usize {
    s.chars().take_while(|c| c.is_whitespace()).count()
}

/// Helper to extract time in ms from a line like "Planning Time: 0.123 ms"
fn extract_time_ms(line: &str) -> Option<f64> {
    let (_, value) = line.split_once(':')?;
    value.trim().trim_end_matches("ms").trim().parse().ok()
}
