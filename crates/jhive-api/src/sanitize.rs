//! Input sanitization utilities.

/// Maximum length accepted for free-text fields before truncation.
pub const MAX_TEXT_LENGTH: usize = 20_000;

/// Maximum length of a search term.
pub const MAX_SEARCH_LENGTH: usize = 200;

/// Strip control characters from user-provided text and cap its length.
pub fn sanitize_text(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_TEXT_LENGTH)
        .collect()
}

/// Normalize a `q` search term: trim, lowercase, drop regex-special and
/// control characters, cap the length. The result is matched as a prefix
/// against lowercased shadow fields.
pub fn sanitize_search_term(input: &str) -> Option<String> {
    const SPECIALS: &[char] = &[
        '.', '*', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\', '/',
    ];

    let cleaned: String = input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_control() && !SPECIALS.contains(c))
        .take(MAX_SEARCH_LENGTH)
        .collect();

    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Validate a document ID (UUID-shaped or the `{job}--{applicant}`
/// composite): alphanumerics and hyphens only, bounded length.
pub fn is_valid_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 80 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Whether an identifier path segment looks like a slug rather than an ID.
/// Slugs are lowercase and may carry numeric suffixes; UUIDs parse as IDs
/// first, so this only needs to reject obviously invalid segments.
pub fn is_valid_slug(slug: &str) -> bool {
    if slug.is_empty() || slug.len() > 300 {
        return false;
    }
    slug.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Trim a string field, mapping empty to None.
pub fn non_empty(input: Option<String>) -> Option<String> {
    input
        .map(|s| sanitize_text(s.trim()))
        .filter(|s| !s.is_empty())
}

/// Normalize a list field: trim entries, drop empties.
pub fn clean_string_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| sanitize_text(v.trim()))
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_term_strips_regex_specials() {
        assert_eq!(
            sanitize_search_term("Back.*end$ Engineer").as_deref(),
            Some("backend engineer")
        );
        assert_eq!(sanitize_search_term("  RUST  ").as_deref(), Some("rust"));
        assert_eq!(sanitize_search_term("(((^$)))"), None);
        assert_eq!(sanitize_search_term("   "), None);
    }

    #[test]
    fn id_validation() {
        assert!(is_valid_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_valid_id("job1--user1"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("has/slash"));
        assert!(!is_valid_id("has space"));
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("backend-engineer-2"));
        assert!(!is_valid_slug("Backend-Engineer"));
        assert!(!is_valid_slug("has_underscore"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn text_sanitization_drops_control_chars() {
        assert_eq!(sanitize_text("a\u{0}b\u{7}c"), "abc");
        assert_eq!(sanitize_text("line1\nline2\tend"), "line1\nline2\tend");
    }

    #[test]
    fn list_cleaning() {
        let cleaned = clean_string_list(vec![
            " rust ".to_string(),
            "".to_string(),
            "  ".to_string(),
            "sql".to_string(),
        ]);
        assert_eq!(cleaned, vec!["rust".to_string(), "sql".to_string()]);
    }
}
