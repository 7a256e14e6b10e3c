//! Recommendation Engine - Optimization advice for an annotated plan
//!
//! Runs an ordered list of [`Rule`]s over the tree, then deduplicates and
//! ranks what they found. Rules never see each other's output; the only
//! cross-rule step is the `(kind, node)` deduplication here.

use crate::config::AnalyzerConfig;
use crate::explain::PlanNode;
use crate::suggestions::messages::{LocalizedText, MessageCatalog};
use crate::suggestions::rules::default_rules;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Severity level for recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityLevel {
    /// Critical issue that should be addressed immediately
    Critical,
    /// Warning that may impact performance
    Warning,
    /// Informational suggestion for optimization
    Info,
}

impl SeverityLevel {
    /// Returns true if this is a critical issue
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }

    /// Returns true if this is at least a warning
    pub fn is_warning_or_above(&self) -> bool {
        matches!(self, Self::Critical | Self::Warning)
    }

    /// Ordinal used for ranking, higher is more severe
    pub fn rank(&self) -> u8 {
        match self {
            Self::Critical => 2,
            Self::Warning => 1,
            Self::Info => 0,
        }
    }

    /// Returns the severity level as a display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detection rule that produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Filtered Seq Scan over many rows
    SeqScanOnLargeTable,
    /// Nested loop re-running its inner side over many rows
    NestedLoopWithLargeOuter,
    /// Planner row estimate off by an order of magnitude
    EstimationMismatch,
    /// Node dominating execution time or scanning many rows
    BottleneckNode,
    /// Sort that did not fit in work_mem
    SortSpillsToDisk,
    /// Filter discarding most rows after an index or join
    InefficientFilter,
}

impl RuleKind {
    /// Every rule kind, in the order the default engine runs them
    pub const ALL: [RuleKind; 6] = [
        Self::SeqScanOnLargeTable,
        Self::NestedLoopWithLargeOuter,
        Self::EstimationMismatch,
        Self::BottleneckNode,
        Self::SortSpillsToDisk,
        Self::InefficientFilter,
    ];

    /// Snake-case tag, also the message key prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SeqScanOnLargeTable => "seq_scan_on_large_table",
            Self::NestedLoopWithLargeOuter => "nested_loop_with_large_outer",
            Self::EstimationMismatch => "estimation_mismatch",
            Self::BottleneckNode => "bottleneck_node",
            Self::SortSpillsToDisk => "sort_spills_to_disk",
            Self::InefficientFilter => "inefficient_filter",
        }
    }

    /// Returns a short English description of this rule
    pub fn description(&self) -> &'static str {
        match self {
            Self::SeqScanOnLargeTable => "Sequential scan with filter on a large table",
            Self::NestedLoopWithLargeOuter => "Nested loop over a large input",
            Self::EstimationMismatch => "Row estimate differs from actual rows",
            Self::BottleneckNode => "Operation dominates execution",
            Self::SortSpillsToDisk => "Sort spills to disk",
            Self::InefficientFilter => "Filter removing most rows",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single optimization recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// `<kind>-<node id>`, unique within one result
    pub id: String,
    pub kind: RuleKind,
    pub severity: SeverityLevel,
    pub title: LocalizedText,
    pub issue: LocalizedText,
    pub explanation: LocalizedText,
    pub suggestion: LocalizedText,
    /// Suggested statement, only when the rule could build a valid one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<usize>,
    /// Catalog key the texts were rendered from
    pub message_key: String,
    /// Values interpolated into the texts
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl Recommendation {
    /// Creates an unrendered recommendation
    pub fn new(kind: RuleKind, severity: SeverityLevel) -> Self {
        Self {
            id: kind.as_str().to_string(),
            kind,
            severity,
            title: LocalizedText::default(),
            issue: LocalizedText::default(),
            explanation: LocalizedText::default(),
            suggestion: LocalizedText::default(),
            sql: None,
            node_id: None,
            message_key: kind.as_str().to_string(),
            params: BTreeMap::new(),
        }
    }

    /// Targets a plan node
    pub fn for_node(mut self, node_id: usize) -> Self {
        self.node_id = Some(node_id);
        self.id = format!("{}-{}", self.kind.as_str(), node_id);
        self
    }

    /// Adds an interpolation value
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Sets the suggested SQL
    pub fn with_sql(mut self, sql: Option<String>) -> Self {
        self.sql = sql;
        self
    }

    /// Fills the text fields from the message catalog
    pub fn localize(mut self, catalog: &MessageCatalog) -> Self {
        let key = self.message_key.as_str();
        self.title = catalog.localized(key, "title", &self.params);
        self.issue = catalog.localized(key, "issue", &self.params);
        self.explanation = catalog.localized(key, "explanation", &self.params);
        self.suggestion = catalog.localized(key, "suggestion", &self.params);
        self
    }
}

/// A detection rule
///
/// Rules are pure: they read the annotated tree and return what they found,
/// in pre-order.
pub trait Rule: Send + Sync {
    fn kind(&self) -> RuleKind;

    fn check(&self, root: &PlanNode, config: &AnalyzerConfig) -> Vec<Recommendation>;
}

/// Runs the rule battery over annotated trees
pub struct RecommendationEngine {
    config: AnalyzerConfig,
    rules: Vec<Box<dyn Rule>>,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecommendationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecommendationEngine")
            .field("config", &self.config)
            .field("rules", &self.rule_kinds())
            .finish()
    }
}

impl RecommendationEngine {
    /// Creates an engine with the default rules and config
    pub fn new() -> Self {
        Self::with_config(AnalyzerConfig::default())
    }

    /// Creates an engine with the default rules and a custom config
    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self {
            config,
            rules: default_rules(),
        }
    }

    /// Creates an engine without any rules
    pub fn empty(config: AnalyzerConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
        }
    }

    /// Appends a rule; it runs after the existing ones
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Returns the engine config
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Kinds of the registered rules, in run order
    pub fn rule_kinds(&self) -> Vec<RuleKind> {
        self.rules.iter().map(|rule| rule.kind()).collect()
    }

    /// Runs every rule, deduplicates, ranks and renders the results
    pub fn generate(&self, root: &PlanNode) -> Vec<Recommendation> {
        let mut found = Vec::new();
        for rule in &self.rules {
            let recommendations = rule.check(root, &self.config);
            tracing::trace!(
                rule = rule.kind().as_str(),
                count = recommendations.len(),
                "Rule evaluated"
            );
            found.extend(recommendations);
        }

        let catalog = MessageCatalog::global();
        rank(dedup(found))
            .into_iter()
            .map(|recommendation| recommendation.localize(catalog))
            .collect()
    }
}

/// Keeps one recommendation per `(kind, node)`, the most severe one
///
/// The survivor takes the position of the first occurrence.
pub fn dedup(recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    let mut positions: HashMap<(RuleKind, Option<usize>), usize> = HashMap::new();
    let mut kept: Vec<Recommendation> = Vec::with_capacity(recommendations.len());

    for recommendation in recommendations {
        let key = (recommendation.kind, recommendation.node_id);
        match positions.get(&key) {
            Some(&idx) => {
                if recommendation.severity.rank() > kept[idx].severity.rank() {
                    kept[idx] = recommendation;
                }
            }
            None => {
                positions.insert(key, kept.len());
                kept.push(recommendation);
            }
        }
    }

    kept
}

/// Orders by severity, most severe first
///
/// The sort is stable, so equal severities keep rule order and then plan order.
pub fn rank(mut recommendations: Vec<Recommendation>) -> Vec<Recommendation> {
    recommendations.sort_by_key(|r| std::cmp::Reverse(r.severity.rank()));
    recommendations
}
