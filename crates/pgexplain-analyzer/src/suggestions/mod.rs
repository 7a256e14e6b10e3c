//! Plan Optimization Suggestions Module
//!
//! This module turns an annotated plan tree into optimization advice. It
//! detects large filtered sequential scans, nested loops over big inputs,
//! row estimate mismatches, dominant nodes, sorts spilling to disk and
//! wasteful filters, and renders each finding in English and Chinese.

mod analyzer;
pub mod messages;
pub mod rules;

pub use analyzer::*;
pub use messages::{LocalizedText, MessageCatalog};
pub use rules::{
    BottleneckNode, EstimationMismatch, InefficientFilter, NestedLoopWithLargeOuter,
    SeqScanOnLargeTable, SortSpillsToDisk, create_index_sql, default_rules,
    extract_index_columns,
};
