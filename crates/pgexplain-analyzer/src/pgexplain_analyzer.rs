//! pgexplain Analyzer - PostgreSQL EXPLAIN plan analysis
//!
//! This crate provides functionality for:
//! - Parsing `EXPLAIN (ANALYZE, BUFFERS)` output in JSON or text format
//! - Per-node self time, time share and bottleneck detection
//! - Whole-plan summaries and ranked optimization recommendations
//!
//! ```
//! use pgexplain_analyzer::{FormatHint, analyze};
//!
//! let plan = "Seq Scan on users  (cost=0.00..1234.00 rows=1 width=64) (actual time=0.020..120.500 rows=52000 loops=1)
//!   Filter: (email = 'a@b.c'::text)
//! Execution Time: 125.000 ms";
//!
//! let result = analyze(plan, FormatHint::Auto).unwrap();
//! assert!(result.plan.is_bottleneck);
//! assert_eq!(
//!     result.recommendations[0].sql.as_deref(),
//!     Some("CREATE INDEX idx_users_email ON users (email);")
//! );
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod explain;
pub mod metrics;
pub mod summary;
pub mod suggestions;

pub use analysis::*;
pub use config::AnalyzerConfig;
pub use error::{AnalysisError, ErrorKind, ParseError, ParseResult};
pub use explain::*;
pub use summary::{OperationShare, PlanSummary};
pub use suggestions::*;
