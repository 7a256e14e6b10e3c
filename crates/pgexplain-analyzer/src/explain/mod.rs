//! PostgreSQL EXPLAIN Parser Module
//!
//! This module turns raw `EXPLAIN (ANALYZE, BUFFERS)` output into a
//! [`QueryPlan`]:
//! - [`detect_format`] classifies the input as JSON or text
//! - [`parse_json_explain`] handles `FORMAT JSON`
//! - [`parse_text_explain`] handles the default indented text format
//!
//! # Example
//!
//! ```
//! use pgexplain_analyzer::explain::{PlanFormat, detect_format, parse_json_explain, parse_text_explain};
//!
//! let json = r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users"}}]"#;
//! assert_eq!(detect_format(json), PlanFormat::Json);
//! assert_eq!(parse_json_explain(json).unwrap().root.node_type, "Seq Scan");
//!
//! let text = "Seq Scan on users  (cost=0.00..10.00 rows=100 width=4)";
//! assert_eq!(detect_format(text), PlanFormat::Text);
//! assert_eq!(parse_text_explain(text).unwrap().root.relation_name.as_deref(), Some("users"));
//! ```

pub mod detect;
pub mod expr;
pub mod json;
pub mod plan;
pub mod text;

pub use detect::{FormatHint, PlanFormat, detect_format};
pub use json::parse_json_explain;
pub use plan::{IdAllocator, PlanNode, PlanNodeIterator, QueryPlan, node_types};
pub use text::parse_text_explain;
