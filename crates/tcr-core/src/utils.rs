/// Truncate `s` to `max_len` characters, appending `...` when shortened.
pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

/// Short, single-line preview of a post for log lines.
pub fn excerpt(text: Option<&str>) -> String {
    match text {
        Some(t) if !t.trim().is_empty() => truncate_text(&t.replace('\n', " "), 100),
        _ => "Media message".to_string(),
    }
}
