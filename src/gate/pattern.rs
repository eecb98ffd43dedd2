use globset::{Glob, GlobBuilder, GlobMatcher};
use std::fmt;

/// A shell-style glob compiled from a constraint's `url_pattern`.
///
/// `*` matches any sequence of characters (including `/`), `?` matches exactly one
/// character, `[...]` is a character class supporting ranges and `!`/`^` negation,
/// and `\` escapes the next character. Matching is case-sensitive and anchored at
/// both ends of the resource path.
///
/// A pattern that fails to parse is kept as an invalid pattern: it never matches.
#[derive(Clone, Debug)]
pub struct UrlPattern {
    source: String,
    matcher: Option<GlobMatcher>,
}

fn build_glob(source: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(source)
        .literal_separator(false)
        .backslash_escape(true)
        .case_insensitive(false)
        .build()
}

impl UrlPattern {
    /// Compiles `source`, failing on malformed classes or escapes.
    pub fn parse(source: &str) -> Result<Self, globset::Error> {
        let glob = build_glob(source)?;
        Ok(Self {
            source: source.to_string(),
            matcher: Some(glob.compile_matcher()),
        })
    }

    /// Compiles `source`, keeping malformed patterns as never-matching ones.
    pub fn compile(source: &str) -> Self {
        Self::parse(source).unwrap_or_else(|_| Self {
            source: source.to_string(),
            matcher: None,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.matcher.is_some()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher
            .as_ref()
            .is_some_and(|matcher| matcher.is_match(path))
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
