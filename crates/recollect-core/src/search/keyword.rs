//! Keyword query preparation
//!
//! User text never reaches FTS5 MATCH syntax directly: terms are extracted
//! and quoted so operators and stray quotes cannot break the query.

/// Maximum number of terms kept from a query
const MAX_TERMS: usize = 32;

/// Terms of a query: alphanumeric runs, lowercased, deduplicated in order
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
    {
        let term = term.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
        if terms.len() == MAX_TERMS {
            break;
        }
    }
    terms
}

/// Build an FTS5 MATCH expression matching any of the query's terms
///
/// Returns `None` when the query has no searchable terms.
pub fn sanitize_fts5_query(query: &str) -> Option<String> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_operators() {
        assert_eq!(
            sanitize_fts5_query("rust AND \"async\" NEAR(x)").as_deref(),
            Some("\"rust\" OR \"and\" OR \"async\" OR \"near\" OR \"x\"")
        );
        assert_eq!(sanitize_fts5_query("  ?!  "), None);
    }

    #[test]
    fn test_query_terms_dedup() {
        assert_eq!(query_terms("Cache cache CACHE miss"), vec!["cache", "miss"]);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
    }
}
