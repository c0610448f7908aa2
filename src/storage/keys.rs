//! Key Transformation
//!
//! Maps logical keys (what callers use) to physical keys (what the adapter
//! stores) and back.
//!
//! ```text
//! prefix "a", key "k"   ->  "a-k"
//! no prefix, key "k"    ->  "k"
//! space id "user"       ->  "app*space-user"
//! ```
//!
//! Prefix matching is literal. An empty prefix behaves as no prefix.

use crate::error::{Result, StorageError};

/// Marker that starts every storage-space key.
pub const SPACE_KEY_PREFIX: &str = "app*space-";

fn non_empty(prefix: Option<&str>) -> Option<&str> {
    prefix.filter(|p| !p.is_empty())
}

/// Derives the physical key for a logical key.
pub fn to_physical(prefix: Option<&str>, key: &str) -> String {
    match non_empty(prefix) {
        Some(prefix) => format!("{}-{}", prefix, key),
        None => key.to_string(),
    }
}

/// Reverses [`to_physical`].
///
/// When the physical key does not carry the prefix it is returned unchanged,
/// which is how callers can tell it belongs to a different scope.
pub fn to_logical<'a>(prefix: Option<&str>, physical: &'a str) -> &'a str {
    strip_scope(prefix, physical).unwrap_or(physical)
}

/// Returns the logical key if `physical` belongs to the prefix's scope.
///
/// Without a prefix every key is in scope.
pub fn strip_scope<'a>(prefix: Option<&str>, physical: &'a str) -> Option<&'a str> {
    match non_empty(prefix) {
        Some(prefix) => physical
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('-')),
        None => Some(physical),
    }
}

/// Derives the physical key holding a whole storage space.
pub fn space_key(id: &str) -> String {
    format!("{}{}", SPACE_KEY_PREFIX, id)
}

/// Returns true if the physical key holds a storage space.
#[inline]
pub fn is_space_key(physical: &str) -> bool {
    physical.starts_with(SPACE_KEY_PREFIX)
}

/// A validated glob pattern for key matching.
///
/// Supported syntax:
/// - `*` matches any run of characters, including none
/// - `?` matches exactly one character
/// - `[abc]`, `[a-z]`, `[^a-z]` character classes
/// - `\x` matches `x` literally
///
/// Matching runs in `O(pattern * text)` time whatever the pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

#[derive(Debug, Clone)]
enum Token {
    Star,
    AnyChar,
    Literal(char),
    Class { set: Vec<char>, negate: bool },
}

impl Token {
    /// Whether this single-character token accepts `c`.
    fn accepts(&self, c: char) -> bool {
        match self {
            Token::Star | Token::AnyChar => true,
            Token::Literal(l) => *l == c,
            Token::Class { set, negate } => class_contains(set, c) != *negate,
        }
    }
}

impl GlobPattern {
    /// Parses a pattern, rejecting unterminated classes and dangling escapes.
    pub fn parse(pattern: &str) -> Result<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens: Vec<Token> = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' => {
                    // Runs of stars behave as one
                    if !matches!(tokens.last(), Some(Token::Star)) {
                        tokens.push(Token::Star);
                    }
                    i += 1;
                }
                '?' => {
                    tokens.push(Token::AnyChar);
                    i += 1;
                }
                '\\' => {
                    let Some(&escaped) = chars.get(i + 1) else {
                        return Err(StorageError::InvalidArgument(format!(
                            "pattern {:?} ends with a dangling escape",
                            pattern
                        )));
                    };
                    tokens.push(Token::Literal(escaped));
                    i += 2;
                }
                '[' => {
                    let Some(len) = chars[i + 1..].iter().position(|&c| c == ']') else {
                        return Err(StorageError::InvalidArgument(format!(
                            "pattern {:?} has an unterminated character class",
                            pattern
                        )));
                    };
                    let body = &chars[i + 1..i + 1 + len];
                    let (set, negate) = match body.split_first() {
                        Some((&'^', rest)) => (rest.to_vec(), true),
                        _ => (body.to_vec(), false),
                    };
                    tokens.push(Token::Class { set, negate });
                    i += len + 2;
                }
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }
        Ok(Self { tokens })
    }

    /// Checks whether `text` matches the whole pattern.
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();
        let tokens = &self.tokens;
        let (mut p, mut t) = (0, 0);
        // Position of the last star, and the text index it is retried from
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match tokens.get(p) {
                Some(Token::Star) => {
                    backtrack = Some((p, t));
                    p += 1;
                    continue;
                }
                Some(token) if token.accepts(text[t]) => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }

            // Let the last star swallow one more character and retry
            let Some((star, from)) = backtrack else {
                return false;
            };
            backtrack = Some((star, from + 1));
            p = star + 1;
            t = from + 1;
        }

        tokens[p..].iter().all(|token| matches!(token, Token::Star))
    }
}

fn class_contains(class: &[char], c: char) -> bool {
    let mut i = 0;
    while i < class.len() {
        // Ranges like a-z
        if i + 2 < class.len() && class[i + 1] == '-' {
            if class[i] <= c && c <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_to_physical() {
        assert_eq!(to_physical(Some("a"), "k"), "a-k");
        assert_eq!(to_physical(None, "k"), "k");
        assert_eq!(to_physical(Some(""), "k"), "k");
    }

    #[test]
    fn test_to_logical() {
        assert_eq!(to_logical(Some("a"), "a-k"), "k");
        assert_eq!(to_logical(Some("a"), "a-k-j"), "k-j");
        assert_eq!(to_logical(None, "a-k"), "a-k");

        // Foreign keys come back unchanged
        assert_eq!(to_logical(Some("a"), "b-k"), "b-k");
        assert_eq!(to_logical(Some("a"), "ak"), "ak");
    }

    #[test]
    fn test_strip_scope() {
        assert_eq!(strip_scope(Some("a"), "a-k"), Some("k"));
        assert_eq!(strip_scope(Some("a"), "a-"), Some(""));
        assert_eq!(strip_scope(Some("a"), "b-k"), None);
        assert_eq!(strip_scope(None, "b-k"), Some("b-k"));
    }

    #[test]
    fn test_prefix_is_literal() {
        assert_eq!(strip_scope(Some("a.c"), "abc-k"), None);
        assert_eq!(strip_scope(Some("a.c"), "a.c-k"), Some("k"));
    }

    #[test]
    fn test_space_keys() {
        assert_eq!(space_key("user"), "app*space-user");
        assert!(is_space_key("app*space-user"));
        assert!(is_space_key("app*space-"));
        assert!(!is_space_key("appspace-user"));
        assert!(!is_space_key("x-app*space-user"));
    }

    #[test]
    fn test_glob_pattern() {
        let pattern = GlobPattern::parse("h*llo").unwrap();
        assert!(pattern.matches("hello"));
        assert!(pattern.matches("hllo"));
        assert!(pattern.matches("heeeello"));
        assert!(!pattern.matches("world"));

        let pattern = GlobPattern::parse("h?llo").unwrap();
        assert!(pattern.matches("hallo"));
        assert!(pattern.matches("hällo"));
        assert!(!pattern.matches("hllo"));

        let pattern = GlobPattern::parse("*").unwrap();
        assert!(pattern.matches(""));
        assert!(pattern.matches("anything"));

        let pattern = GlobPattern::parse("h[ae]llo").unwrap();
        assert!(pattern.matches("hello"));
        assert!(!pattern.matches("hillo"));

        let pattern = GlobPattern::parse("test[0-9]").unwrap();
        assert!(pattern.matches("test7"));
        assert!(!pattern.matches("testx"));

        let pattern = GlobPattern::parse("[^t]*").unwrap();
        assert!(pattern.matches("other"));
        assert!(!pattern.matches("test1"));

        let pattern = GlobPattern::parse(r"a\*").unwrap();
        assert!(pattern.matches("a*"));
        assert!(!pattern.matches("ab"));
    }

    #[test]
    fn test_glob_star_backtracking() {
        let pattern = GlobPattern::parse("a*b*c").unwrap();
        assert!(pattern.matches("abc"));
        assert!(pattern.matches("aXbYc"));
        assert!(pattern.matches("abbbcbc"));
        assert!(!pattern.matches("abcb"));

        let pattern = GlobPattern::parse("**?").unwrap();
        assert!(!pattern.matches(""));
        assert!(pattern.matches("x"));

        let pattern = GlobPattern::parse("user:*:[0-9]").unwrap();
        assert!(pattern.matches("user:a:b:7"));
        assert!(!pattern.matches("user:a:b"));
    }

    #[test]
    fn test_glob_pathological_pattern_is_fast() {
        let pattern = GlobPattern::parse("*a*a*a*a*a*a*a*a*b").unwrap();
        let text = "a".repeat(40);

        let start = Instant::now();
        assert!(!pattern.matches(&text));
        assert!(pattern.matches(&format!("{}b", text)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_glob_rejects_malformed() {
        assert!(matches!(
            GlobPattern::parse("test[0-9"),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            GlobPattern::parse("test\\"),
            Err(StorageError::InvalidArgument(_))
        ));
    }
}
