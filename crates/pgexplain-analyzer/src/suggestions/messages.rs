//! Message catalog for recommendations and errors
//!
//! User-facing prose is kept out of the rules: a rule only names a message key
//! and the values to interpolate. Templates are MiniJinja sources registered
//! as `<key>.<field>.<locale>`, rendered here for every supported locale.

use minijinja::Environment;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Locales every message is rendered in
pub const LOCALES: [&str; 2] = ["en", "zh"];

static CATALOG: LazyLock<MessageCatalog> = LazyLock::new(MessageCatalog::new);

/// The same message in every supported locale
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub zh: String,
}

impl LocalizedText {
    /// Returns the text for `locale`, falling back to English
    pub fn get(&self, locale: &str) -> &str {
        match locale {
            "zh" => &self.zh,
            _ => &self.en,
        }
    }
}

/// Registry of message templates
pub struct MessageCatalog {
    env: Environment<'static>,
}

impl MessageCatalog {
    /// Builds a catalog holding the built-in templates
    pub fn new() -> Self {
        let mut env = Environment::new();
        register_filters(&mut env);

        for &(name, source) in TEMPLATES {
            if let Err(err) = env.add_template(name, source) {
                tracing::warn!(template = name, error = %err, "Skipping invalid message template");
            }
        }

        Self { env }
    }

    /// Shared catalog with the built-in templates
    pub fn global() -> &'static MessageCatalog {
        &CATALOG
    }

    /// Returns true if a template exists for the given key, field and locale
    pub fn has_message(&self, key: &str, field: &str, locale: &str) -> bool {
        self.env
            .get_template(&format!("{key}.{field}.{locale}"))
            .is_ok()
    }

    /// Renders one field in one locale
    ///
    /// Missing templates and render failures yield the template name, so a
    /// broken entry degrades to a visible key instead of failing the analysis.
    pub fn render<S: Serialize>(&self, key: &str, field: &str, locale: &str, params: &S) -> String {
        let name = format!("{key}.{field}.{locale}");
        match self
            .env
            .get_template(&name)
            .and_then(|template| template.render(params))
        {
            Ok(text) => text.trim().to_string(),
            Err(err) => {
                tracing::warn!(template = %name, error = %err, "Failed to render message template");
                name
            }
        }
    }

    /// Renders one field in every supported locale
    pub fn localized<S: Serialize>(&self, key: &str, field: &str, params: &S) -> LocalizedText {
        LocalizedText {
            en: self.render(key, field, "en", params),
            zh: self.render(key, field, "zh", params),
        }
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Number formatting filters used by the templates
pub struct MessageFilters;

impl MessageFilters {
    /// `52000` -> `52,000`
    pub fn thousands(value: f64) -> String {
        let rounded = value.round();
        let digits = format!("{}", rounded.abs() as u64);
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (idx, ch) in digits.chars().enumerate() {
            if idx > 0 && (digits.len() - idx) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        if rounded < 0.0 {
            out.insert(0, '-');
        }
        out
    }

    /// `96.4` -> `96.4`, `12.345` -> `12.3`
    pub fn pct(value: f64) -> String {
        format!("{value:.1}")
    }

    /// `12.3456` -> `12.35`
    pub fn ms(value: f64) -> String {
        format!("{value:.2}")
    }
}

/// Register all message filters with a MiniJinja environment
pub fn register_filters(env: &mut Environment) {
    env.add_filter("thousands", MessageFilters::thousands);
    env.add_filter("pct", MessageFilters::pct);
    env.add_filter("ms", MessageFilters::ms);
}

const TEMPLATES: &[(&str, &str)] = &[
    // Sequential scan on a large table with a filter
    (
        "seq_scan_on_large_table.title.en",
        "Sequential scan on large table {{ relation }}",
    ),
    (
        "seq_scan_on_large_table.title.zh",
        "大表 {{ relation }} 上的顺序扫描",
    ),
    (
        "seq_scan_on_large_table.issue.en",
        "Seq Scan reads {{ rows|thousands }} rows from {{ relation }} and filters them with {{ filter }}{% if percentage is not none %}, taking {{ percentage|pct }}% of execution time{% endif %}.",
    ),
    (
        "seq_scan_on_large_table.issue.zh",
        "顺序扫描从 {{ relation }} 读取了 {{ rows|thousands }} 行，并使用 {{ filter }} 过滤{% if percentage is not none %}，占用了 {{ percentage|pct }}% 的执行时间{% endif %}。",
    ),
    (
        "seq_scan_on_large_table.explanation.en",
        "Without a usable index PostgreSQL has to read every row of the table and test the filter on each one. The cost grows linearly with the table size.",
    ),
    (
        "seq_scan_on_large_table.explanation.zh",
        "没有可用的索引时，PostgreSQL 必须读取表中的每一行并逐行判断过滤条件，开销随表大小线性增长。",
    ),
    (
        "seq_scan_on_large_table.suggestion.en",
        "{% if columns %}Create an index on {{ relation }} ({{ columns|join(', ') }}).{% else %}Add an index on the columns used in the filter of {{ relation }}.{% endif %}",
    ),
    (
        "seq_scan_on_large_table.suggestion.zh",
        "{% if columns %}在 {{ relation }} ({{ columns|join(', ') }}) 上创建索引。{% else %}为 {{ relation }} 过滤条件中使用的列添加索引。{% endif %}",
    ),
    // Nested loop with a large input
    (
        "nested_loop_with_large_outer.title.en",
        "Nested loop over {{ rows|thousands }} rows",
    ),
    (
        "nested_loop_with_large_outer.title.zh",
        "处理 {{ rows|thousands }} 行的嵌套循环",
    ),
    (
        "nested_loop_with_large_outer.issue.en",
        "The inner side ({{ inner_type }}{% if inner_relation %} on {{ inner_relation }}{% endif %}) runs {{ inner_loops|thousands }} times while the larger input produces {{ rows|thousands }} rows.",
    ),
    (
        "nested_loop_with_large_outer.issue.zh",
        "内层（{{ inner_type }}{% if inner_relation %}，表 {{ inner_relation }}{% endif %}）执行了 {{ inner_loops|thousands }} 次，而较大的输入产生了 {{ rows|thousands }} 行。",
    ),
    (
        "nested_loop_with_large_outer.explanation.en",
        "A nested loop re-executes its inner side once per outer row. With many rows this is only fast when the inner side is a cheap index lookup.",
    ),
    (
        "nested_loop_with_large_outer.explanation.zh",
        "嵌套循环对外层的每一行都会重新执行一次内层。行数较多时，只有内层是廉价的索引查找才能保持高效。",
    ),
    (
        "nested_loop_with_large_outer.suggestion.en",
        "{% if join_column %}Index the join column {{ inner_relation }}.{{ join_column }}{% else %}Make sure the join columns are indexed{% endif %}, or let the planner choose a hash or merge join by refreshing statistics.",
    ),
    (
        "nested_loop_with_large_outer.suggestion.zh",
        "{% if join_column %}为连接列 {{ inner_relation }}.{{ join_column }} 创建索引{% else %}确认连接列上存在索引{% endif %}，或通过更新统计信息让优化器选择哈希连接或归并连接。",
    ),
    // Row estimate far from reality
    (
        "estimation_mismatch.title.en",
        "Row estimate off by {{ factor|thousands }}x on {{ node_type }}",
    ),
    (
        "estimation_mismatch.title.zh",
        "{{ node_type }} 的行数估算偏差 {{ factor|thousands }} 倍",
    ),
    (
        "estimation_mismatch.issue.en",
        "The planner expected {{ planned|thousands }} rows{% if relation %} from {{ relation }}{% endif %} but {{ actual|thousands }} were returned.",
    ),
    (
        "estimation_mismatch.issue.zh",
        "优化器预计{% if relation %}从 {{ relation }} {% endif %}返回 {{ planned|thousands }} 行，实际返回了 {{ actual|thousands }} 行。",
    ),
    (
        "estimation_mismatch.explanation.en",
        "{% if direction == 'under' %}Underestimated{% else %}Overestimated{% endif %} row counts lead the planner to pick join strategies and memory settings that do not fit the real data.",
    ),
    (
        "estimation_mismatch.explanation.zh",
        "行数{% if direction == 'under' %}低估{% else %}高估{% endif %}会使优化器选择与实际数据不匹配的连接方式和内存设置。",
    ),
    (
        "estimation_mismatch.suggestion.en",
        "{% if relation %}Run ANALYZE on {{ relation }} to refresh its statistics{% else %}Run ANALYZE on the tables involved{% endif %}; consider extended statistics for correlated columns.",
    ),
    (
        "estimation_mismatch.suggestion.zh",
        "{% if relation %}对 {{ relation }} 执行 ANALYZE 以更新统计信息{% else %}对相关的表执行 ANALYZE{% endif %}；对相关联的列可考虑创建扩展统计信息。",
    ),
    // Node dominating execution time
    (
        "bottleneck_node.title.en",
        "{{ node_type }} dominates execution time",
    ),
    ("bottleneck_node.title.zh", "{{ node_type }} 占用了主要执行时间"),
    (
        "bottleneck_node.issue.en",
        "{% if percentage is not none %}Node #{{ node_id }} spends {{ self_time|ms }} ms on its own work, {{ percentage|pct }}% of the total.{% else %}Node #{{ node_id }} scans about {{ rows|thousands }} rows{% if relation %} of {{ relation }}{% endif %}.{% endif %}",
    ),
    (
        "bottleneck_node.issue.zh",
        "{% if percentage is not none %}节点 #{{ node_id }} 自身耗时 {{ self_time|ms }} 毫秒，占总时间的 {{ percentage|pct }}%。{% else %}节点 #{{ node_id }} 扫描了约 {{ rows|thousands }} 行{% if relation %}（表 {{ relation }}）{% endif %}。{% endif %}",
    ),
    (
        "bottleneck_node.explanation.en",
        "Speeding up this operation has the largest effect on the query as a whole.",
    ),
    (
        "bottleneck_node.explanation.zh",
        "优化这个操作对整个查询的效果最明显。",
    ),
    (
        "bottleneck_node.suggestion.en",
        "Check whether {{ node_type }} can read fewer rows, for example through a more selective index or an earlier filter.",
    ),
    (
        "bottleneck_node.suggestion.zh",
        "检查 {{ node_type }} 能否读取更少的行，例如使用选择性更高的索引或更早地过滤数据。",
    ),
    // Sort spilling to disk
    ("sort_spills_to_disk.title.en", "Sort spills to disk"),
    ("sort_spills_to_disk.title.zh", "排序溢出到磁盘"),
    (
        "sort_spills_to_disk.issue.en",
        "{{ node_type }}{% if sort_keys %} on {{ sort_keys }}{% endif %} used {{ method }}{% if disk_kb is not none %} with {{ disk_kb|thousands }} kB on disk{% endif %}.",
    ),
    (
        "sort_spills_to_disk.issue.zh",
        "{{ node_type }}{% if sort_keys %}（{{ sort_keys }}）{% endif %}使用了 {{ method }}{% if disk_kb is not none %}，磁盘占用 {{ disk_kb|thousands }} kB{% endif %}。",
    ),
    (
        "sort_spills_to_disk.explanation.en",
        "The rows did not fit in work_mem, so the sort wrote temporary files and merged them back, which is much slower than an in-memory sort.",
    ),
    (
        "sort_spills_to_disk.explanation.zh",
        "数据超出了 work_mem，排序只能写入临时文件再合并，比内存排序慢得多。",
    ),
    (
        "sort_spills_to_disk.suggestion.en",
        "{% if work_mem_mb is not none %}Raise work_mem to about {{ work_mem_mb }}MB for this query{% else %}Raise work_mem for this query{% endif %}, or add an index that returns rows already in sort order.",
    ),
    (
        "sort_spills_to_disk.suggestion.zh",
        "{% if work_mem_mb is not none %}为该查询将 work_mem 提高到约 {{ work_mem_mb }}MB{% else %}为该查询提高 work_mem{% endif %}，或添加能按排序顺序返回数据的索引。",
    ),
    // Filter discarding most rows after an index or join
    (
        "inefficient_filter.title.en",
        "Filter discards {{ ratio|pct }}% of rows",
    ),
    (
        "inefficient_filter.title.zh",
        "过滤条件丢弃了 {{ ratio|pct }}% 的行",
    ),
    (
        "inefficient_filter.issue.en",
        "{{ node_type }}{% if relation %} on {{ relation }}{% endif %} removed {{ removed|thousands }} rows with {{ filter }} and kept {{ kept|thousands }}.",
    ),
    (
        "inefficient_filter.issue.zh",
        "{{ node_type }}{% if relation %}（表 {{ relation }}）{% endif %}通过 {{ filter }} 移除了 {{ removed|thousands }} 行，仅保留 {{ kept|thousands }} 行。",
    ),
    (
        "inefficient_filter.explanation.en",
        "Rows are fetched first and discarded afterwards. An index that covers the filter lets PostgreSQL skip them entirely.",
    ),
    (
        "inefficient_filter.explanation.zh",
        "这些行先被读取然后才被丢弃。覆盖过滤条件的索引可以让 PostgreSQL 完全跳过它们。",
    ),
    (
        "inefficient_filter.suggestion.en",
        "{% if columns %}Extend the index to include ({{ columns|join(', ') }}).{% else %}Add the filtered columns to the index used by this node.{% endif %}",
    ),
    (
        "inefficient_filter.suggestion.zh",
        "{% if columns %}将 ({{ columns|join(', ') }}) 加入索引。{% else %}将过滤条件中的列加入该节点使用的索引。{% endif %}",
    ),
    // Errors
    ("error.empty_input.message.en", "The input is empty."),
    ("error.empty_input.message.zh", "输入为空。"),
    (
        "error.unrecognized_format.message.en",
        "The input is neither a JSON nor a text EXPLAIN plan.",
    ),
    (
        "error.unrecognized_format.message.zh",
        "输入既不是 JSON 格式也不是文本格式的 EXPLAIN 计划。",
    ),
    (
        "error.malformed_root.message.en",
        "{% if line %}Line {{ line }} is not a plan operator: {{ content }}{% else %}No plan operator was found.{% endif %}",
    ),
    (
        "error.malformed_root.message.zh",
        "{% if line %}第 {{ line }} 行不是计划节点：{{ content }}{% else %}未找到任何计划节点。{% endif %}",
    ),
    (
        "error.malformed_node.message.en",
        "A plan node could not be parsed: {{ reason }}",
    ),
    (
        "error.malformed_node.message.zh",
        "无法解析计划节点：{{ reason }}",
    ),
    (
        "error.internal_inconsistency.message.en",
        "Internal analyzer error: {{ reason }}",
    ),
    (
        "error.internal_inconsistency.message.zh",
        "分析器内部错误：{{ reason }}",
    ),
];
