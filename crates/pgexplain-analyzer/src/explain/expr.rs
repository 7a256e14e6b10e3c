//! Helpers for scanning the SQL expression fragments EXPLAIN prints
//!
//! EXPLAIN conditions are fully parenthesized and may contain string
//! literals, so splitting on keywords has to ignore anything nested in
//! parentheses or quotes.

/// Byte offsets in `expr` where `pattern` occurs outside parentheses and quotes
pub fn find_top_level(expr: &str, pattern: &str) -> Vec<usize> {
    let mut hits = Vec::new();
    let mut depth = 0usize;
    let mut in_single = false;
    let mut in_double = false;

    for (idx, ch) in expr.char_indices() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '(' if !in_single && !in_double => depth += 1,
            ')' if !in_single && !in_double => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && !in_single && !in_double && expr[idx..].starts_with(pattern) {
            hits.push(idx);
        }
    }

    hits
}

/// Splits `expr` on every top-level occurrence of `separator`
pub fn split_top_level<'a>(expr: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for idx in find_top_level(expr, separator) {
        if idx < start {
            continue;
        }
        parts.push(expr[start..idx].trim());
        start = idx + separator.len();
    }
    parts.push(expr[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Removes parentheses that wrap the whole expression, repeatedly
///
/// `(a = 1) AND (b = 2)` is left alone because its first parenthesis closes
/// before the end.
pub fn strip_outer_parens(expr: &str) -> &str {
    let mut current = expr.trim();
    while current.starts_with('(') && current.ends_with(')') && wraps_whole(current) {
        current = current[1..current.len() - 1].trim();
    }
    current
}

fn wraps_whole(expr: &str) -> bool {
    let mut depth = 0usize;
    let mut in_single = false;
    let last = expr.len() - 1;

    for (idx, ch) in expr.char_indices() {
        match ch {
            '\'' => in_single = !in_single,
            '(' if !in_single => depth += 1,
            ')' if !in_single => {
                depth = depth.saturating_sub(1);
                if depth == 0 && idx != last {
                    return false;
                }
            }
            _ => {}
        }
    }

    depth == 0
}
