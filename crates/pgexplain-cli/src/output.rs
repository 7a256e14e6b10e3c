//! Rendering of analysis responses for the terminal

use anyhow::Result;
use clap::ValueEnum;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use pgexplain_analyzer::{AnalysisResponse, PlanNode, PlanSummary, Recommendation};
use serde::{Deserialize, Serialize};

/// How the response is printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Compact JSON envelope
    #[default]
    Json,
    /// Indented JSON envelope
    Pretty,
    /// Human-readable tables
    Table,
}

/// Renders the response in the requested format
pub fn render(response: &AnalysisResponse, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(response)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(response)?,
        OutputFormat::Table => render_tables(response),
    })
}

fn render_tables(response: &AnalysisResponse) -> String {
    match response {
        AnalysisResponse::Success { data, .. } => [
            node_table(&data.plan).to_string(),
            summary_table(&data.summary).to_string(),
            recommendation_table(&data.recommendations),
        ]
        .join("\n\n"),
        AnalysisResponse::Failure { error_en, kind, .. } => {
            format!("Analysis failed ({}): {error_en}", kind.as_str())
        }
    }
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// One row per node in pre-order, indented by depth
pub fn node_table(root: &PlanNode) -> Table {
    let mut table = new_table();
    table.set_header(vec!["#", "Node", "Rows", "Self (ms)", "Time %", ""]);

    let mut stack = vec![(root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        let mut label = format!("{}{}", "  ".repeat(depth), node.node_type);
        if let Some(relation) = node.qualified_relation() {
            label.push_str(&format!(" on {relation}"));
        }

        let marker = if node.is_bottleneck { "bottleneck" } else { "" };
        table.add_row(vec![
            node.id.to_string(),
            label,
            node.effective_rows().map_or_else(|| "-".into(), |r| format!("{r:.0}")),
            node.self_time.map_or_else(|| "-".into(), |t| format!("{t:.2}")),
            node.time_percentage.map_or_else(|| "-".into(), |p| format!("{p:.1}")),
            marker.to_string(),
        ]);

        stack.extend(node.children.iter().rev().map(|child| (child, depth + 1)));
    }

    table
}

pub fn summary_table(summary: &PlanSummary) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Summary", ""]);

    let ms = |value: Option<f64>| value.map_or_else(|| "-".into(), |v| format!("{v:.3} ms"));
    let top = summary
        .top_operations
        .iter()
        .map(|op| format!("{} {:.1}%", op.node_type, op.percentage))
        .collect::<Vec<_>>()
        .join(", ");

    let rows: [(&str, String); 10] = [
        ("Execution time", ms(summary.execution_time)),
        ("Planning time", ms(summary.planning_time)),
        ("Total rows", format!("{:.0}", summary.total_rows)),
        ("Estimation accuracy", format!("{}%", summary.estimation_accuracy)),
        ("Nodes", summary.node_count.to_string()),
        ("Max depth", summary.max_depth.to_string()),
        ("Bottlenecks", summary.bottleneck_count.to_string()),
        ("Seq scans", yes_no(summary.has_seq_scans)),
        ("Estimation errors", yes_no(summary.has_estimation_errors)),
        ("Top operations", top),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }

    table
}

/// Recommendations, or a note that there are none
pub fn recommendation_table(recommendations: &[Recommendation]) -> String {
    if recommendations.is_empty() {
        return "No recommendations: the plan looks healthy.".to_string();
    }

    let mut table = new_table();
    table.set_header(vec!["Severity", "Node", "Rule", "Issue", "Suggestion", "SQL"]);
    for recommendation in recommendations {
        table.add_row(vec![
            recommendation.severity.to_string(),
            recommendation
                .node_id
                .map_or_else(|| "-".into(), |id| id.to_string()),
            recommendation.kind.description().to_string(),
            recommendation.issue.en.clone(),
            recommendation.suggestion.en.clone(),
            recommendation.sql.clone().unwrap_or_default(),
        ]);
    }
    table.to_string()
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.to_string()
}
