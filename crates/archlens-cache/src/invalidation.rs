use regex::{Regex, RegexBuilder};
use tracing::warn;

/// Compiled size ceiling for a translated glob.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Key matcher for bulk invalidation.
///
/// `*` matches any sequence (including an empty one); every other character
/// is literal. A glob that fails to compile degrades to exact comparison.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    Glob(Regex),
    Exact(String),
}

impl KeyPattern {
    pub fn compile(pattern: &str) -> Self {
        let translated = format!(
            "^{}$",
            pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        );

        match RegexBuilder::new(&translated)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()
        {
            Ok(regex) => KeyPattern::Glob(regex),
            Err(e) => {
                warn!(pattern, error = %e, "glob did not compile, using exact match");
                KeyPattern::Exact(pattern.to_string())
            }
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Glob(regex) => regex.is_match(key),
            KeyPattern::Exact(expected) => expected == key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_sequence() {
        let pattern = KeyPattern::compile("find_dependents?component=*");
        assert!(pattern.matches("find_dependents?component=userview"));
        assert!(pattern.matches("find_dependents?component="));
        assert!(!pattern.matches("find_dependencies?component=userview"));
    }

    #[test]
    fn other_characters_are_literal() {
        let pattern = KeyPattern::compile("a.b(c");
        assert!(pattern.matches("a.b(c"));
        assert!(!pattern.matches("axb(c"));
    }

    #[test]
    fn pattern_is_anchored() {
        let pattern = KeyPattern::compile("*view");
        assert!(pattern.matches("userview"));
        assert!(!pattern.matches("userviews"));
        assert!(KeyPattern::compile("*").matches(""));
    }

    #[test]
    fn exact_fallback_compares_whole_key() {
        let pattern = KeyPattern::Exact("a*".to_string());
        assert!(pattern.matches("a*"));
        assert!(!pattern.matches("ab"));
    }
}
