//! String helpers for log lines and solver answers

/// Cut `s` to at most `max_chars` characters, appending `...` when anything was dropped.
///
/// Counts characters, not bytes, so multi-byte text (`"raiz quadrada é"`) is never
/// split inside a code point.
///
/// ```
/// use mathrpc_core::utils::string::truncate_at_char_boundary;
///
/// assert_eq!(truncate_at_char_boundary("quanto é 2 + 2", 7), "quanto ...");
/// assert_eq!(truncate_at_char_boundary("2+2", 10), "2+2");
/// ```
pub fn truncate_at_char_boundary(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &s[..byte_index]),
        None => s.to_string(),
    }
}
