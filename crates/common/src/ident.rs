/// Normalize a SQL identifier for comparison: trim surrounding whitespace,
/// strip one layer of backtick or double-quote quoting, and lowercase.
///
/// Differently-quoted references to the same object compare equal after
/// normalization (`` `Sales` `` == `"sales"` == `sales`).
pub fn normalize_ident(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = strip_quoting(trimmed, '`').or_else(|| strip_quoting(trimmed, '"'));
    unquoted.unwrap_or(trimmed).to_lowercase()
}

fn strip_quoting(value: &str, quote: char) -> Option<&str> {
    value
        .strip_prefix(quote)
        .and_then(|rest| rest.strip_suffix(quote))
}
