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

use crate::record::GroupKind;

/// An explicit nesting counter for one logical execution flow.
///
/// Each flow that wants indented group markers owns one `ScopeContext` and
/// threads it through [`RecordBuilder::scoped`](crate::record::RecordBuilder::scoped).
/// Nothing here is thread-local: unrelated concurrent flows hold unrelated
/// values and never observe each other's depth.
#[derive(Debug, Default)]
pub struct ScopeContext {
    depth: u32,
}

impl ScopeContext {
    /// Create a new scope context at depth zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current nesting depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Advance the counter for a record of the given kind and return the
    /// indent to stamp on that record.
    ///
    /// A `BeginGroup` is stamped at the depth it opens (then the depth
    /// grows), an `EndGroup` at the depth it returns to (floored at zero),
    /// and a `Message` at the current depth.
    pub fn advance(&mut self, kind: GroupKind) -> u32 {
        match kind {
            GroupKind::Message => self.depth,
            GroupKind::BeginGroup => {
                let depth = self.depth;
                self.depth += 1;
                depth
            }
            GroupKind::EndGroup => {
                self.depth = self.depth.saturating_sub(1);
                self.depth
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::record::Severity;

    #[test]
    fn test_nesting_and_floor() {
        let mut scope = ScopeContext::new();

        assert_eq!(scope.advance(GroupKind::BeginGroup), 0);
        assert_eq!(scope.advance(GroupKind::Message), 1);
        assert_eq!(scope.advance(GroupKind::BeginGroup), 1);
        assert_eq!(scope.advance(GroupKind::Message), 2);
        assert_eq!(scope.advance(GroupKind::EndGroup), 1);
        assert_eq!(scope.advance(GroupKind::EndGroup), 0);

        // Unbalanced ends never go negative.
        assert_eq!(scope.advance(GroupKind::EndGroup), 0);
        assert_eq!(scope.depth(), 0);
    }

    #[test]
    fn test_scoped_records_carry_indent() {
        let mut scope = ScopeContext::new();

        let begin = Record::builder()
            .severity(Severity::Info)
            .scoped(GroupKind::BeginGroup, &mut scope)
            .build();
        let inner = Record::builder()
            .severity(Severity::Info)
            .scoped(GroupKind::Message, &mut scope)
            .build();
        let end = Record::builder()
            .severity(Severity::Info)
            .scoped(GroupKind::EndGroup, &mut scope)
            .build();

        assert_eq!(begin.indent(), 0);
        assert_eq!(inner.indent(), 1);
        assert_eq!(end.indent(), 0);
        assert_eq!(begin.group_kind(), GroupKind::BeginGroup);
    }

    #[test]
    fn test_contexts_are_independent_across_threads() {
        let mut outer = ScopeContext::new();
        outer.advance(GroupKind::BeginGroup);
        outer.advance(GroupKind::BeginGroup);

        let handle = std::thread::spawn(|| {
            let mut inner = ScopeContext::new();
            inner.advance(GroupKind::BeginGroup);
            inner.depth()
        });

        assert_eq!(handle.join().unwrap(), 1);
        assert_eq!(outer.depth(), 2);
    }
}
