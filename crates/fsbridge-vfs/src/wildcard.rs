//! `*` / `?` name filters used for bulk operations and listings.

use regex::Regex;

use crate::error::ConfigurationError;

/// Include/exclude wildcard pair. An unset include matches everything.
#[derive(Debug, Clone, Default)]
pub struct WildcardFilter {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl WildcardFilter {
    pub fn new(wildcard: Option<&str>, exclude: Option<&str>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            include: wildcard.filter(|w| !w.is_empty()).map(compile).transpose()?,
            exclude: exclude.filter(|w| !w.is_empty()).map(compile).transpose()?,
        })
    }

    /// Whether either pattern is set.
    pub fn is_active(&self) -> bool {
        self.include.is_some() || self.exclude.is_some()
    }

    pub fn matches(&self, name: &str) -> bool {
        let included = self.include.as_ref().is_none_or(|re| re.is_match(name));
        let excluded = self.exclude.as_ref().is_some_and(|re| re.is_match(name));
        included && !excluded
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigurationError> {
    // Backend names may carry line breaks; `*` and `?` must still match them.
    let mut re = String::with_capacity(pattern.len() + 12);
    re.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re)
        .map_err(|e| ConfigurationError::invalid(format!("invalid wildcard [{pattern}]: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question() {
        let filter = WildcardFilter::new(Some("*.tx?"), None).unwrap();
        assert!(filter.matches("a.txt"));
        assert!(filter.matches(".txt"));
        assert!(!filter.matches("a.text"));
        assert!(!filter.matches("a.txt.bak"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let filter = WildcardFilter::new(Some("report(1).csv"), None).unwrap();
        assert!(filter.matches("report(1).csv"));
        assert!(!filter.matches("report1Xcsv"));
    }

    #[test]
    fn test_wildcards_match_line_breaks() {
        let filter = WildcardFilter::new(Some("file1*Y"), None).unwrap();
        assert!(filter.matches("file1\tX\r\nY"));
        assert!(WildcardFilter::new(Some("a?b"), None).unwrap().matches("a\nb"));
    }

    #[test]
    fn test_exclude() {
        let filter = WildcardFilter::new(Some("*.xml"), Some("tmp*")).unwrap();
        assert!(filter.matches("in.xml"));
        assert!(!filter.matches("tmp.xml"));

        let exclude_only = WildcardFilter::new(None, Some("*.bak")).unwrap();
        assert!(exclude_only.is_active());
        assert!(exclude_only.matches("a.txt"));
        assert!(!exclude_only.matches("a.bak"));
    }

    #[test]
    fn test_inactive_matches_all() {
        let filter = WildcardFilter::new(None, Some("")).unwrap();
        assert!(!filter.is_active());
        assert!(filter.matches("anything"));
    }
}
