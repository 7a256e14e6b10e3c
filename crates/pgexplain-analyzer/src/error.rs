//! Error types for plan analysis

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Errors produced while turning raw EXPLAIN output into a plan tree
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Missing Plan object in EXPLAIN output")]
    MissingPlan,

    #[error("Malformed plan node #{index}: {reason}")]
    MalformedNode { index: usize, reason: String },

    #[error("Line {line} is not a plan operator: {content}")]
    MalformedRoot { line: usize, content: String },

    #[error("No plan operators found")]
    NoPlanNodes,

    #[error("Indentation stack underflow at line {line}")]
    StackUnderflow { line: usize },
}

/// Result type for plan parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Discriminant of an [`AnalysisError`], stable across releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyInput,
    UnrecognizedFormat,
    MalformedRoot,
    MalformedNode,
    InternalInconsistency,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::UnrecognizedFormat => "unrecognized_format",
            Self::MalformedRoot => "malformed_root",
            Self::MalformedNode => "malformed_node",
            Self::InternalInconsistency => "internal_inconsistency",
        }
    }

    /// Returns true if the failure points at an analyzer bug rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalInconsistency)
    }
}

/// Errors surfaced at the analysis boundary
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Input is neither a JSON nor a text EXPLAIN plan")]
    UnrecognizedFormat,

    #[error("Line {line} is not a plan operator: {content}")]
    MalformedRoot { line: usize, content: String },

    #[error("Malformed plan node: {reason}")]
    MalformedNode { reason: String },

    #[error("Internal inconsistency: {reason}")]
    InternalInconsistency { reason: String },
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::UnrecognizedFormat => ErrorKind::UnrecognizedFormat,
            Self::MalformedRoot { .. } => ErrorKind::MalformedRoot,
            Self::MalformedNode { .. } => ErrorKind::MalformedNode,
            Self::InternalInconsistency { .. } => ErrorKind::InternalInconsistency,
        }
    }

    /// Structured values a message catalog can interpolate
    pub fn params(&self) -> Value {
        match self {
            Self::EmptyInput | Self::UnrecognizedFormat => json!({}),
            Self::MalformedRoot { line, content } => json!({ "line": line, "content": content }),
            Self::MalformedNode { reason } | Self::InternalInconsistency { reason } => {
                json!({ "reason": reason })
            }
        }
    }
}

impl From<ParseError> for AnalysisError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidJson(e) => Self::MalformedNode {
                reason: format!("invalid JSON: {e}"),
            },
            ParseError::MissingPlan => Self::MalformedNode {
                reason: "missing Plan object".into(),
            },
            ParseError::MalformedNode { index, reason } => Self::MalformedNode {
                reason: format!("node #{index}: {reason}"),
            },
            ParseError::MalformedRoot { line, content } => Self::MalformedRoot { line, content },
            ParseError::NoPlanNodes => Self::MalformedRoot {
                line: 0,
                content: String::new(),
            },
            ParseError::StackUnderflow { line } => Self::InternalInconsistency {
                reason: format!("indentation stack underflow at line {line}"),
            },
        }
    }
}

/// Result type for analysis
pub type Result<T> = std::result::Result<T, AnalysisError>;
