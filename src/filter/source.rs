// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;

use crate::Error;

/// A compiled matcher over record sources.
///
/// Built from a list of glob-like patterns separated by commas, spaces, or
/// semicolons, where `*` matches any run of characters. Patterns are anchored
/// (they must match the whole source) and case-insensitive. A list containing
/// a bare `*` compiles to the explicit [`MatchAll`](SourceMatcher::MatchAll)
/// variant instead of a regex, which keeps "explicitly matches all" distinct
/// from "no pattern given" (represented as `None` at the rule level).
#[derive(Debug, Clone)]
pub enum SourceMatcher {
    /// Matches every source.
    MatchAll,
    /// Matches sources against a compiled pattern alternation.
    Pattern(regex::Regex),
}

impl SourceMatcher {
    /// Compile a pattern list. Returns `Ok(None)` when the list contains no
    /// patterns at all.
    pub fn compile(list: &str) -> Result<Option<SourceMatcher>, Error> {
        let patterns: Vec<&str> = list
            .split([',', ' ', ';'])
            .filter(|pattern| !pattern.is_empty())
            .collect();

        if patterns.is_empty() {
            return Ok(None);
        }
        if patterns.contains(&"*") {
            return Ok(Some(SourceMatcher::MatchAll));
        }

        let alternation = patterns
            .iter()
            .map(|pattern| glob_to_regex(pattern))
            .collect::<Vec<_>>()
            .join("|");
        let assembled = format!("(?is)^(?:{alternation})$");

        match regex::Regex::new(&assembled) {
            Ok(pattern) => Ok(Some(SourceMatcher::Pattern(pattern))),
            Err(err) => Err(Error::new("failed to compile source patterns")
                .with_context("patterns", list)
                .with_source(err)),
        }
    }

    /// Whether the given source matches.
    pub fn is_match(&self, source: &str) -> bool {
        match self {
            SourceMatcher::MatchAll => true,
            SourceMatcher::Pattern(pattern) => pattern.is_match(source),
        }
    }
}

impl fmt::Display for SourceMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceMatcher::MatchAll => write!(f, "*"),
            SourceMatcher::Pattern(pattern) => pattern.fmt(f),
        }
    }
}

// Everything but `*` is matched literally.
fn glob_to_regex(pattern: &str) -> String {
    pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(list: &str) -> SourceMatcher {
        SourceMatcher::compile(list).unwrap().unwrap()
    }

    #[test]
    fn test_empty_list_is_no_pattern() {
        assert!(SourceMatcher::compile("").unwrap().is_none());
        assert!(SourceMatcher::compile(" , ; ").unwrap().is_none());
    }

    #[test]
    fn test_star_is_match_all() {
        assert!(matches!(compile("*"), SourceMatcher::MatchAll));
        assert!(matches!(compile("Foo,*"), SourceMatcher::MatchAll));
        assert!(compile("*").is_match("anything at all"));
    }

    #[test]
    fn test_anchored_case_insensitive() {
        let matcher = compile("Foo*");
        assert!(matcher.is_match("FooBar"));
        assert!(matcher.is_match("FOOBAR"));
        assert!(matcher.is_match("foo"));
        assert!(!matcher.is_match("XFooBar"));

        let matcher = compile("Foo");
        assert!(!matcher.is_match("FooBar"));
    }

    #[test]
    fn test_inner_and_leading_globs() {
        let matcher = compile("*::pool");
        assert!(matcher.is_match("db::pool"));
        assert!(!matcher.is_match("db::pool::conn"));

        let matcher = compile("db*conn");
        assert!(matcher.is_match("db::pool::conn"));
        assert!(matcher.is_match("dbconn"));
    }

    #[test]
    fn test_multiple_patterns() {
        let matcher = compile("Foo*, Bar");
        assert!(matcher.is_match("FooBaz"));
        assert!(matcher.is_match("bar"));
        assert!(!matcher.is_match("Baz"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let matcher = compile("a.b");
        assert!(matcher.is_match("a.b"));
        assert!(!matcher.is_match("aXb"));

        let matcher = compile("task(1)");
        assert!(matcher.is_match("task(1)"));
    }
}
