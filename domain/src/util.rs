//! Shared text helpers.

/// Longest prefix of `s` that fits in `max_bytes` and ends on a char
/// boundary.
pub fn clip_to_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Cap an owned output at `max_bytes`, reporting whether anything was cut.
pub fn cap_output(mut output: String, max_bytes: usize) -> (String, bool) {
    let keep = clip_to_boundary(&output, max_bytes).len();
    if keep == output.len() {
        return (output, false);
    }
    output.truncate(keep);
    (output, true)
}

/// Single-line preview for logs: newlines collapsed, clipped to
/// `max_chars` characters with a trailing ellipsis.
pub fn preview(s: &str, max_chars: usize) -> String {
    let flat: String = s
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut clipped: String = flat.chars().take(max_chars).collect();
    clipped.push('…');
    clipped
}
