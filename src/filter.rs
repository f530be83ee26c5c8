use ::glob::{MatchOptions, Pattern, PatternError};

const NAME_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Match a bare file name against a glob pattern
///
/// `*` matches any run of characters and `?` exactly one; the match is
/// anchored at both ends of `name`. An invalid pattern matches nothing.
pub fn match_glob(name: &str, pattern: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches_with(name, NAME_MATCH),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid glob pattern");
            false
        }
    }
}

/// Include/exclude filter applied to entry names during directory listing
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Option<Pattern>,
    exclude: Option<Pattern>,
}

impl NameFilter {
    /// Compile the optional include and exclude patterns
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Result<Self, PatternError> {
        Ok(Self {
            include: include.map(Pattern::new).transpose()?,
            exclude: exclude.map(Pattern::new).transpose()?,
        })
    }

    /// Whether `name` passes the include pattern and escapes the exclude pattern
    pub fn allows(&self, name: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .is_none_or(|p| p.matches_with(name, NAME_MATCH));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|p| p.matches_with(name, NAME_MATCH));
        included && !excluded
    }
}
