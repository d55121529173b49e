//! Common helper functions for output formatting.

use chrono::{DateTime, Utc};
use mquery::page::PageResult;
use owo_colors::OwoColorize;

/// Truncates an ID to 8 characters for display.
pub fn truncate_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Truncates a string to a maximum number of characters.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        s.to_string()
    }
}

/// Pads `s` to `width` characters, counting characters rather than bytes.
pub fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        s.to_string()
    } else {
        format!("{s}{}", " ".repeat(width - len))
    }
}

/// Formats a table header line.
pub fn header(line: &str, use_colors: bool) -> String {
    if use_colors {
        format!("{}\n", line.dimmed())
    } else {
        format!("{line}\n")
    }
}

/// Formats an active flag.
pub fn format_active(is_active: bool, use_colors: bool) -> String {
    match (is_active, use_colors) {
        (true, true) => "active".green().to_string(),
        (true, false) => "active".to_string(),
        (false, true) => "inactive".red().to_string(),
        (false, false) => "inactive".to_string(),
    }
}

/// Formats a timestamp as a date.
pub fn format_date(time: Option<&DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Formats the page footer, e.g. `Page 1/3 (25 total)`.
pub fn format_page_footer<T>(page: &PageResult<T>, use_colors: bool) -> String {
    let footer = format!(
        "Page {}/{} ({} total)",
        page.page + 1,
        page.total_page,
        page.total
    );
    if use_colors {
        format!("{}\n", footer.dimmed())
    } else {
        format!("{footer}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_id() {
        assert_eq!(truncate_id("3f2c9a1b-77aa-4c1e"), "3f2c9a1b");
        assert_eq!(truncate_id("g1"), "g1");
    }

    #[test]
    fn test_truncate_str_counts_characters() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("Nguyễn Văn Thành", 10), "Nguyễn ...");
    }

    #[test]
    fn test_pad_counts_characters() {
        assert_eq!(pad("Đức", 5), "Đức  ");
        assert_eq!(pad("toolong", 3), "toolong");
    }

    #[test]
    fn test_page_footer_is_one_based() {
        let page: PageResult<()> = PageResult {
            page: 0,
            total: 25,
            total_page: 3,
            data: vec![],
        };
        assert_eq!(format_page_footer(&page, false), "Page 1/3 (25 total)\n");
    }

    #[test]
    fn test_format_active_plain() {
        assert_eq!(format_active(true, false), "active");
        assert_eq!(format_active(false, false), "inactive");
    }
}
