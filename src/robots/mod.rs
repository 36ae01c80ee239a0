//! Robots directive handling
//!
//! Pages opt out of indexing and link following through the `X-Robots-Tag`
//! response header and the `<meta name="robots">` tag. Both carry the same
//! comma-separated directive list, and a page is treated according to the union
//! of the two.

/// The `noindex` / `nofollow` directives found in one robots value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RobotsDirectives {
    pub noindex: bool,
    pub nofollow: bool,
}

impl RobotsDirectives {
    /// Parses a comma-separated, case-insensitive directive list
    ///
    /// A missing value carries no directives. User-agent scoped directives such as
    /// `googlebot: noindex` are not recognised.
    ///
    /// # Examples
    ///
    /// ```
    /// use pagewell::robots::RobotsDirectives;
    ///
    /// let parsed = RobotsDirectives::parse(Some("NoIndex, follow"));
    /// assert!(parsed.noindex);
    /// assert!(!parsed.nofollow);
    /// ```
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };

        let mut directives = Self::default();
        for token in value.split(',').map(|t| t.trim().to_lowercase()) {
            match token.as_str() {
                "noindex" => directives.noindex = true,
                "nofollow" => directives.nofollow = true,
                _ => {}
            }
        }
        directives
    }

    /// Combines header-level and meta-level directives
    pub fn merge(self, other: Self) -> Self {
        Self {
            noindex: self.noindex || other.noindex,
            nofollow: self.nofollow || other.nofollow,
        }
    }
}
