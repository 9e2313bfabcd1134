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

//! Rule-based accept/reject filtering of `(source, severity)` pairs.
//!
//! A sink carries an ordered set of compiled [`Rule`]s; a record is delivered
//! when any rule accepts its source and severity. Rules are compiled once at
//! configuration time and are immutable afterwards.

mod severity;
mod source;

pub use severity::SeverityMask;
pub use source::SourceMatcher;

use crate::record::Severity;
use crate::trap::Trap;

/// An uncompiled filter rule, as it appears in configuration.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    severities: String,
    include: String,
    exclude: String,
    use_global_exclude: bool,
}

impl Default for RuleSpec {
    fn default() -> Self {
        RuleSpec {
            severities: String::new(),
            include: String::new(),
            exclude: String::new(),
            use_global_exclude: true,
        }
    }
}

impl RuleSpec {
    /// Create a rule spec with no severity list, no patterns, and the global
    /// exclude list in effect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the severity list, in the grammar of [`SeverityMask::parse`]. An
    /// empty list falls back to the configured default mask.
    pub fn severities(mut self, spec: impl Into<String>) -> Self {
        self.severities = spec.into();
        self
    }

    /// Set the include patterns. When non-empty, a source is accepted iff it
    /// matches one of them, and the exclude patterns are ignored.
    pub fn include(mut self, patterns: impl Into<String>) -> Self {
        self.include = patterns.into();
        self
    }

    /// Set the exclude patterns, consulted only when no include pattern is
    /// given.
    pub fn exclude(mut self, patterns: impl Into<String>) -> Self {
        self.exclude = patterns.into();
        self
    }

    /// Whether the registry-wide global exclude list is unioned into this
    /// rule's exclude patterns. Defaults to true.
    pub fn use_global_exclude(mut self, use_global_exclude: bool) -> Self {
        self.use_global_exclude = use_global_exclude;
        self
    }
}

/// Registry-wide defaults applied when compiling rules.
#[derive(Debug, Clone, Default)]
pub struct RuleDefaults {
    severities: Option<SeverityMask>,
    global_exclude: Vec<String>,
}

impl RuleDefaults {
    /// Create defaults with the full severity mask and no global excludes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the mask used by rules whose severity list is empty or
    /// unparseable. Defaults to [`SeverityMask::ALL`].
    pub fn severities(mut self, mask: SeverityMask) -> Self {
        self.severities = Some(mask);
        self
    }

    /// Set the source patterns excluded by every rule that does not opt out
    /// via [`RuleSpec::use_global_exclude`].
    pub fn global_exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.global_exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    fn default_mask(&self) -> SeverityMask {
        self.severities.unwrap_or(SeverityMask::ALL)
    }
}

/// A compiled filter rule.
#[derive(Debug)]
pub struct Rule {
    severities: SeverityMask,
    include: Option<SourceMatcher>,
    exclude: Option<SourceMatcher>,
}

impl Rule {
    /// Compile a rule spec against the registry defaults.
    ///
    /// Compilation never fails: a spec whose patterns do not compile is
    /// reported through the trap and becomes an always-reject rule, so one
    /// bad rule cannot prevent the rest of a configuration from loading.
    pub fn compile(spec: &RuleSpec, defaults: &RuleDefaults, trap: &dyn Trap) -> Rule {
        let severities = SeverityMask::parse(&spec.severities, defaults.default_mask());
        if severities.is_empty() {
            return Rule::reject_all();
        }

        let include = match SourceMatcher::compile(&spec.include) {
            Ok(include) => include,
            Err(err) => {
                trap.trap(&err);
                return Rule::reject_all();
            }
        };

        let mut exclude_list = spec.exclude.clone();
        if spec.use_global_exclude {
            for pattern in &defaults.global_exclude {
                if !exclude_list.is_empty() {
                    exclude_list.push(',');
                }
                exclude_list.push_str(pattern);
            }
        }
        let exclude = match SourceMatcher::compile(&exclude_list) {
            Ok(exclude) => exclude,
            Err(err) => {
                trap.trap(&err);
                return Rule::reject_all();
            }
        };

        Rule {
            severities,
            include,
            exclude,
        }
    }

    fn reject_all() -> Rule {
        Rule {
            severities: SeverityMask::EMPTY,
            include: None,
            exclude: None,
        }
    }

    /// The compiled severity mask.
    pub fn severities(&self) -> SeverityMask {
        self.severities
    }

    /// Whether this rule lets the given `(source, severity)` pair through.
    ///
    /// An empty severity mask rejects without evaluating any pattern. A
    /// non-empty include list wins over the exclude list.
    pub fn accepts(&self, source: &str, severity: Severity) -> bool {
        if !self.severities.contains(severity) {
            return false;
        }

        match &self.include {
            Some(include) => include.is_match(source),
            None => match &self.exclude {
                Some(exclude) => !exclude.is_match(source),
                None => true,
            },
        }
    }
}

/// The ordered set of rules compiled for one sink.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile a list of rule specs against the registry defaults.
    ///
    /// An empty list compiles to one rule built entirely from the defaults,
    /// so a sink configured without explicit rules still receives records.
    pub fn compile(specs: &[RuleSpec], defaults: &RuleDefaults, trap: &dyn Trap) -> RuleSet {
        if specs.is_empty() {
            let rules = vec![Rule::compile(&RuleSpec::default(), defaults, trap)];
            return RuleSet { rules };
        }

        let rules = specs
            .iter()
            .map(|spec| Rule::compile(spec, defaults, trap))
            .collect();
        RuleSet { rules }
    }

    /// Whether any rule accepts the given `(source, severity)` pair.
    pub fn accepts(&self, source: &str, severity: Severity) -> bool {
        self.rules.iter().any(|rule| rule.accepts(source, severity))
    }

    /// The compiled rules, in configuration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}
