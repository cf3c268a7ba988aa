//! Static asset exclusion.
//!
//! Requests for images, media, fonts, stylesheets and scripts are never sent
//! to the decision service. Matching is on the final path extension and is
//! case-insensitive.

/// Matches request paths that end in one of a set of file extensions.
#[derive(Debug, Clone)]
pub struct StaticAssetFilter {
    extensions: Vec<String>,
}

impl StaticAssetFilter {
    /// Create a filter. Extensions may be given with or without the leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { extensions }
    }

    /// Returns true if the path names a static asset.
    pub fn is_excluded(&self, path: &str) -> bool {
        let file = path.rsplit('/').next().unwrap_or(path);
        match file.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => self
                .extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;

    fn filter() -> StaticAssetFilter {
        StaticAssetFilter::new(ValidationConfig::default().excluded_extensions)
    }

    #[test]
    fn test_static_assets_are_excluded() {
        let filter = filter();
        for path in ["/logo.png", "/assets/app.JS", "/fonts/a.Woff2", "/x/y/style.css", "/a.map"] {
            assert!(filter.is_excluded(path), "{path} should be excluded");
        }
    }

    #[test]
    fn test_pages_are_not_excluded() {
        let filter = filter();
        for path in ["/", "/login", "/api/users.json", "/png", "/archive.tar", "/css/", "/file."] {
            assert!(!filter.is_excluded(path), "{path} should be validated");
        }
    }

    #[test]
    fn test_extension_must_be_final_segment() {
        let filter = filter();
        assert!(!filter.is_excluded("/images.png/profile"));
        assert!(!filter.is_excluded("/bundle.js.html"));
    }

    #[test]
    fn test_custom_extensions_accept_leading_dot() {
        let filter = StaticAssetFilter::new([".PDF", " txt "]);
        assert!(filter.is_excluded("/docs/manual.pdf"));
        assert!(filter.is_excluded("/robots.TXT"));
        assert!(!filter.is_excluded("/logo.png"));
    }
}
