//! URL-safe slug derivation from titles.

/// Maximum numeric suffix probed before unique-slug generation gives up.
pub const MAX_SLUG_ATTEMPTS: u32 = 1000;

/// Derive a URL-safe slug from a title.
///
/// Lowercases, strips everything but alphanumerics/spaces/hyphens, turns
/// whitespace runs into single hyphens, collapses hyphen runs and trims
/// boundary hyphens. Titles that reduce to nothing fall back to "post".
pub fn slugify_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen

    for c in title.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_hyphen = false;
        } else if c.is_whitespace() || c == '-' {
            if !last_was_hyphen {
                out.push('-');
                last_was_hyphen = true;
            }
        }
        // anything else is dropped
    }

    while out.ends_with('-') {
        out.pop();
    }

    if out.is_empty() {
        "post".to_string()
    } else {
        out
    }
}

/// Candidate slug for the nth collision retry: `base`, `base-1`, `base-2`, …
pub fn slug_candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_slugs() {
        assert_eq!(slugify_title("Backend Engineer"), "backend-engineer");
        assert_eq!(slugify_title("  Senior C++ Developer!  "), "senior-c-developer");
        assert_eq!(slugify_title("Rust/Go   Engineer"), "rustgo-engineer");
    }

    #[test]
    fn collapses_separator_runs() {
        assert_eq!(slugify_title("a --- b"), "a-b");
        assert_eq!(slugify_title("--hello--world--"), "hello-world");
    }

    #[test]
    fn empty_title_falls_back() {
        assert_eq!(slugify_title(""), "post");
        assert_eq!(slugify_title("!!!"), "post");
        assert_eq!(slugify_title("   "), "post");
    }

    #[test]
    fn candidates_append_numeric_suffix() {
        assert_eq!(slug_candidate("backend-engineer", 0), "backend-engineer");
        assert_eq!(slug_candidate("backend-engineer", 1), "backend-engineer-1");
        assert_eq!(slug_candidate("backend-engineer", 42), "backend-engineer-42");
    }
}
