//! Display helpers shared by the inspector and the CLI

/// Ellipsis appended by [`abbreviate`]
pub const ELLIPSIS: char = '…';

/// Format a duration in seconds: `45s`, `2m 05s`, `1h 02m 03s`
pub fn format_duration(secs: i64) -> String {
    if secs < 0 {
        return "-".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Truncate `text` to at most `max` characters, ending with an ellipsis
/// when anything was cut. Newlines are flattened to spaces.
pub fn abbreviate(text: &str, max: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max {
        return flat;
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = flat.chars().take(max - 1).collect();
    out.push(ELLIPSIS);
    out
}

/// Last `n` lines of `text`, ignoring a trailing newline
pub fn last_lines(text: &str, n: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

/// Drop trailing blank lines tmux pads a captured pane with
pub fn trim_trailing_blank(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
