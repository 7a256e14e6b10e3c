//! EXPLAIN output format detection

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// How many non-empty lines are inspected when looking for text markers
const TEXT_PROBE_LINES: usize = 5;

static OPERATOR_HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:->\s*)?(?:Parallel\s+)?(?:Seq Scan|Sample Scan|Index Scan|Index Only Scan|Bitmap Heap Scan|Bitmap Index Scan|BitmapAnd|BitmapOr|Tid Scan|Tid Range Scan|Subquery Scan|Function Scan|Table Function Scan|Values Scan|CTE Scan|Named Tuplestore Scan|WorkTable Scan|Foreign Scan|Custom Scan|Nested Loop|Hash Join|Hash|Merge Join|Sort|Incremental Sort|Group|Aggregate|HashAggregate|GroupAggregate|MixedAggregate|WindowAgg|SetOp|HashSetOp|ProjectSet|Recursive Union|Limit|Gather|Gather Merge|Materialize|Memoize|Append|Merge Append|Unique|Result|LockRows|ModifyTable|Insert|Update|Delete|Merge)\b",
    )
    .expect("valid regex")
});

static COST_CLAUSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((?:cost=\d|actual (?:time|rows)=)").expect("valid regex"));

/// Concrete format of a raw EXPLAIN payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanFormat {
    Json,
    Text,
    Unknown,
}

/// Format requested by the caller; `Auto` defers to [`detect_format`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    #[default]
    Auto,
    Json,
    Text,
}

impl FormatHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => Err(format!(
                "unknown plan format '{other}', expected auto, json or text"
            )),
        }
    }
}

/// Classifies raw input as a JSON plan, a text plan, or neither
///
/// Never fails; unrecognized input yields [`PlanFormat::Unknown`].
pub fn detect_format(raw: &str) -> PlanFormat {
    let trimmed = raw.trim_start();

    if (trimmed.starts_with('[') || trimmed.starts_with('{'))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return PlanFormat::Json;
    }

    let looks_like_text = trimmed
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .take(TEXT_PROBE_LINES)
        .any(is_text_plan_marker);

    if looks_like_text {
        PlanFormat::Text
    } else {
        PlanFormat::Unknown
    }
}

/// Returns true if the line starts with a well-known operator label
///
/// Detail lines keyed by an operator-like word (`Sort Key:`, `Hash Cond:`)
/// are not operators.
pub(crate) fn is_operator_label(line: &str) -> bool {
    OPERATOR_HEADER_REGEX.is_match(line) && !has_detail_key(line)
}

/// `Key: value` where the key comes before any parenthesized clause
fn has_detail_key(line: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(key, _)| !key.trim().is_empty() && !key.contains('('))
}

fn is_text_plan_marker(line: &str) -> bool {
    is_operator_label(line)
        || COST_CLAUSE_REGEX.is_match(line)
        || line.contains("Planning Time:")
        || line.contains("Execution Time:")
}
