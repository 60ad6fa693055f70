//! Issue key extraction from free text.
//!
//! The default pattern accepts a project key of 3 to 10 upper-case letters or
//! digits, starting with a letter and not glued to a preceding letter or
//! digit, followed by `-` and the issue number. It errs on the side of
//! matching: `ABC-3.2` yields `ABC-3` and `ABC-12-draft` yields `ABC-12`.
//! Consumers rely on the current matching set, so the fixture in the tests
//! below is the contract.

use indexmap::IndexSet;
use regex::Regex;

pub const DEFAULT_ISSUE_PATTERN: &str = r"(?:^|[^A-Za-z0-9])([A-Z][A-Z0-9]{2,9}-[0-9]+)\b";

#[derive(Clone, Debug)]
pub struct IssueKeyExtractor {
    pattern: Regex,
}

impl IssueKeyExtractor {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns the issue keys found in `text`, de-duplicated, in order of
    /// first appearance.
    pub fn extract(&self, text: &str) -> IndexSet<String> {
        self.pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|key| key.as_str().to_string())
            .collect()
    }
}
