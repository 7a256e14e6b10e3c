//! Plan Analysis - The end-to-end entry point
//!
//! [`PlanAnalyzer::analyze`] takes raw EXPLAIN output and runs the whole
//! pipeline: format detection, parsing, metrics, summary and
//! recommendations. Any failure short-circuits with a typed
//! [`AnalysisError`]; a partially built result is never returned.
//!
//! [`AnalysisRequest`] and [`AnalysisResponse`] are the wire shapes a host
//! (HTTP handler, CLI) exchanges with callers.

use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, ErrorKind, Result};
use crate::explain::{
    FormatHint, PlanFormat, PlanNode, QueryPlan, detect_format, parse_json_explain,
    parse_text_explain,
};
use crate::metrics::annotate;
use crate::suggestions::{MessageCatalog, Recommendation, RecommendationEngine};
use crate::summary::{PlanSummary, summarize_plan};
use serde::{Deserialize, Serialize};

/// Complete outcome of one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Annotated root of the plan tree
    pub plan: PlanNode,
    pub summary: PlanSummary,
    /// Most severe first
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    /// Returns true if no rule found anything worth reporting
    pub fn is_clean(&self) -> bool {
        self.recommendations.is_empty()
    }

    /// Finds a node of the annotated tree by id
    pub fn node(&self, id: usize) -> Option<&PlanNode> {
        self.plan.iter().find(|node| node.id == id)
    }
}

/// Runs the analysis pipeline with a fixed configuration
///
/// Holds no per-call state, so one analyzer can serve concurrent callers.
#[derive(Debug, Default)]
pub struct PlanAnalyzer {
    engine: RecommendationEngine,
}

impl PlanAnalyzer {
    /// Creates an analyzer with the default thresholds and rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an analyzer with custom thresholds
    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self {
            engine: RecommendationEngine::with_config(config),
        }
    }

    /// Creates an analyzer around a prepared recommendation engine
    pub fn with_engine(engine: RecommendationEngine) -> Self {
        Self { engine }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        self.engine.config()
    }

    /// Analyzes raw EXPLAIN output
    pub fn analyze(&self, raw: &str, hint: FormatHint) -> Result<AnalysisResult> {
        let result = self.run(raw, hint);
        if let Err(err) = &result
            && err.kind().is_internal()
        {
            tracing::error!(error = %err, "Plan analysis hit an internal inconsistency");
        }
        result
    }

    /// Analyzes a request and wraps the outcome in a response envelope
    pub fn handle(&self, request: &AnalysisRequest) -> AnalysisResponse {
        AnalysisResponse::from_result(self.analyze(&request.plan, request.format))
    }

    fn run(&self, raw: &str, hint: FormatHint) -> Result<AnalysisResult> {
        if raw.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let format = match hint {
            FormatHint::Json => PlanFormat::Json,
            FormatHint::Text => PlanFormat::Text,
            FormatHint::Auto => detect_format(raw),
        };
        tracing::debug!(%hint, ?format, bytes = raw.len(), "Resolved plan format");

        let mut plan = match format {
            PlanFormat::Json => parse_json_explain(raw)?,
            PlanFormat::Text => parse_text_explain(raw)?,
            PlanFormat::Unknown => return Err(AnalysisError::UnrecognizedFormat),
        };
        check_ids(&plan)?;

        let config = self.engine.config();
        annotate(&mut plan, config);
        let summary = summarize_plan(&plan, config);
        let recommendations = self.engine.generate(&plan.root);

        Ok(AnalysisResult {
            plan: plan.root,
            summary,
            recommendations,
        })
    }
}

/// Analyzes raw EXPLAIN output with the default configuration
pub fn analyze(raw: &str, hint: FormatHint) -> Result<AnalysisResult> {
    PlanAnalyzer::new().analyze(raw, hint)
}

/// Node ids must be `0..n` in pre-order
fn check_ids(plan: &QueryPlan) -> Result<()> {
    for (expected, node) in plan.iter_nodes().enumerate() {
        if node.id != expected {
            return Err(AnalysisError::InternalInconsistency {
                reason: format!(
                    "node at pre-order position {expected} has id {}",
                    node.id
                ),
            });
        }
    }
    Ok(())
}

/// Input accepted at the analysis boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub plan: String,
    #[serde(default)]
    pub format: FormatHint,
}

impl AnalysisRequest {
    pub fn new(plan: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            format: FormatHint::Auto,
        }
    }

    pub fn with_format(mut self, format: FormatHint) -> Self {
        self.format = format;
        self
    }
}

/// Output envelope: `{success, data}` or `{success, error, errorEn, kind}`
///
/// `error` carries the Chinese message and `errorEn` the English one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Success {
        success: bool,
        data: Box<AnalysisResult>,
    },
    #[serde(rename_all = "camelCase")]
    Failure {
        success: bool,
        error: String,
        error_en: String,
        kind: ErrorKind,
    },
}

impl AnalysisResponse {
    pub fn success(data: AnalysisResult) -> Self {
        Self::Success {
            success: true,
            data: Box::new(data),
        }
    }

    /// Renders the error through the message catalog
    pub fn failure(err: &AnalysisError) -> Self {
        let kind = err.kind();
        let message = MessageCatalog::global().localized(
            &format!("error.{}", kind.as_str()),
            "message",
            &err.params(),
        );
        Self::Failure {
            success: false,
            error: message.zh,
            error_en: message.en,
            kind,
        }
    }

    pub fn from_result(result: Result<AnalysisResult>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::failure(&err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
