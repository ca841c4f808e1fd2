//! source positions of pipeline constructs
//!
//! [SourceLocation] is only ever compared, never displayed to end users as an excerpt. Two declarations are the
//! same declaration iff their locations are equal.
//!
//! `serde_yaml` does not expose node positions, so loaders use a [Locator] over the raw text instead: a declaration
//! is found by searching for its `key: value` line below the line of its parent construct. Each line can be claimed
//! once, which keeps two textually identical declarations apart.
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceLocation {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
    /// the declared value is a yaml alias (`*anchor`)
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_alias: bool,
}

impl SourceLocation {
    pub fn line(line: usize, start_column: usize, end_column: usize) -> Self {
        Self {
            start_line: line,
            start_column,
            end_line: line,
            end_column,
            is_alias: false,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_column)
    }
}

/// Finds declarations in the raw text of one document
#[derive(Debug)]
pub struct Locator<'a> {
    lines: Vec<&'a str>,
    claimed: HashSet<usize>,
    synthetic: usize,
}

impl<'a> Locator<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            claimed: Default::default(),
            synthetic: 0,
        }
    }

    /// Locate the first unclaimed `key:` line after `after`, whose value matches `value` (if given)
    ///
    /// Lines are 1-based. `after` is the line of the enclosing construct (0 for the document root).
    pub fn find(&mut self, key: &str, value: Option<&str>, after: usize) -> SourceLocation {
        for (index, line) in self.lines.iter().enumerate().skip(after) {
            let number = index + 1;
            if self.claimed.contains(&number) {
                continue;
            }

            let Some((column, rest)) = match_key(line, key) else {
                continue;
            };

            let rest = rest.trim();
            let is_alias = rest.starts_with('*');
            if let Some(value) = value {
                if !is_alias && unquote(strip_comment(rest)) != value {
                    continue;
                }
            }

            self.claimed.insert(number);
            let mut location = SourceLocation::line(number, column, line.trim_end().len() + 1);
            location.is_alias = is_alias;
            return location;
        }

        tracing::trace!(key, ?value, "declaration not found in text, using synthetic location");
        self.synthetic()
    }

    /// Locate the first unclaimed plain sequence item (`- value`) after `after`
    pub fn find_item(&mut self, value: &str, after: usize) -> SourceLocation {
        for (index, line) in self.lines.iter().enumerate().skip(after) {
            let number = index + 1;
            if self.claimed.contains(&number) {
                continue;
            }

            let trimmed = line.trim_start();
            let Some(item) = trimmed.strip_prefix("- ") else {
                continue;
            };

            if unquote(strip_comment(item.trim())) != value {
                continue;
            }

            self.claimed.insert(number);
            let column = line.len() - trimmed.len() + 1;
            return SourceLocation::line(number, column, line.trim_end().len() + 1);
        }

        tracing::trace!(value, "sequence item not found in text, using synthetic location");
        self.synthetic()
    }

    /// Line of an unindented `key:`, if there is one
    pub fn find_top_level(&self, key: &str) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| matches!(match_key(line, key), Some((1, _))))
            .map(|index| index + 1)
    }

    // flow style or otherwise not line-addressable
    pub(crate) fn synthetic(&mut self) -> SourceLocation {
        self.synthetic += 1;
        SourceLocation::line(0, self.synthetic, self.synthetic)
    }
}

/// Match `key:` at the start of a line, after indentation and any number of `- ` sequence markers.
///
/// Returns the 1-based column of the key and the remainder after the colon.
fn match_key<'l>(line: &'l str, key: &str) -> Option<(usize, &'l str)> {
    let mut offset = 0;
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start();
        offset += rest.len() - trimmed.len();
        rest = trimmed;
        match rest.strip_prefix('-') {
            Some(after_dash) if after_dash.is_empty() || after_dash.starts_with(' ') => {
                offset += 1;
                rest = after_dash;
            }
            _ => break,
        }
    }

    for quote in ["", "\"", "'"] {
        let candidate = format!("{quote}{key}{quote}:");
        if let Some(after) = rest.strip_prefix(candidate.as_str()) {
            if after.is_empty() || after.starts_with(' ') || after.starts_with('\t') {
                return Some((offset + 1, after));
            }
        }
    }

    None
}

fn strip_comment(value: &str) -> &str {
    match value.find(" #") {
        Some(index) => value[..index].trim_end(),
        None => value,
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const TEXT: &str = r#"jobs:
  build:
    uses: ./common.yml
  test:
    uses: "./common.yml"  # same template again
"#;

    #[test]
    fn identical_values_get_distinct_locations() {
        let mut locator = Locator::new(TEXT);
        let first = locator.find("uses", Some("./common.yml"), 0);
        let second = locator.find("uses", Some("./common.yml"), 0);

        assert_eq!(first, SourceLocation::line(3, 5, 23));
        assert_eq!(second.start_line, 5);
        assert_ne!(first, second);
    }

    #[test]
    fn search_starts_below_parent() {
        let mut locator = Locator::new(TEXT);
        let location = locator.find("uses", None, 4);
        assert_eq!(location.start_line, 5);
    }

    #[test]
    fn sequence_markers_are_skipped() {
        let mut locator = Locator::new("steps:\n  - - template: a.yml\n");
        let location = locator.find("template", Some("a.yml"), 0);
        assert_eq!(location.start_line, 2);
        assert_eq!(location.start_column, 7);
    }

    #[test]
    fn aliases_are_flagged() {
        let mut locator = Locator::new("a: &tpl x.yml\nb:\n  template: *tpl\n");
        let location = locator.find("template", Some("x.yml"), 0);
        assert!(location.is_alias);
        assert_eq!(location.start_line, 3);
    }

    #[test]
    fn sequence_items() {
        let mut locator = Locator::new("include:\n  - a.yml\n  - 'b.yml'\n");
        assert_eq!(locator.find_item("b.yml", 0), SourceLocation::line(3, 3, 12));
        assert_eq!(locator.find_item("a.yml", 0).start_line, 2);
    }

    #[test]
    fn top_level_keys_must_be_unindented() {
        let locator = Locator::new("jobs:\n  variables:\n    - a\nvariables:\n");
        assert_eq!(locator.find_top_level("variables"), Some(4));
        assert_eq!(locator.find_top_level("stages"), None);
    }

    #[test]
    fn missing_declarations_are_synthetic_and_unique() {
        let mut locator = Locator::new("{jobs: {a: {uses: x}}}");
        let first = locator.find("uses", Some("x"), 0);
        let second = locator.find("uses", Some("x"), 0);
        assert_eq!(first.start_line, 0);
        assert_ne!(first, second);
    }
}
