//! Shared utilities for CLI commands

use tabled::{Table, settings::Style};

/// Truncate a string with ellipsis if it exceeds max length
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Parse a comma-separated flag into a list, dropping empty entries
pub fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|r| {
        r.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Answer indexes as option letters: `[0, 2]` becomes `A, C`
pub fn answer_letters(indexes: &[usize]) -> String {
    if indexes.is_empty() {
        return "-".to_string();
    }
    indexes
        .iter()
        .map(|&i| match u8::try_from(i).ok().filter(|i| *i < 26) {
            Some(i) => char::from(b'A' + i).to_string(),
            None => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Apply consistent table styling
pub fn apply_table_style(table: &mut Table) {
    table.with(Style::rounded());
}
