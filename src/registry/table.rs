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

use std::sync::Arc;

use crate::consumer::QueueConsumer;
use crate::record::Severity;

/// An immutable snapshot of the active consumers, stamped with a version.
///
/// Replacing the table is a single atomic pointer swap in the registry;
/// versions grow strictly, so two tables never share one. A handle that
/// cached routes against version `n` can therefore trust its indices for
/// exactly as long as the current table still reports `n`.
#[derive(Debug)]
pub(crate) struct DispatchTable {
    version: u64,
    consumers: Vec<Arc<QueueConsumer>>,
}

impl DispatchTable {
    pub(crate) fn empty() -> DispatchTable {
        DispatchTable {
            version: 0,
            consumers: Vec::new(),
        }
    }

    pub(crate) fn new(version: u64, consumers: Vec<Arc<QueueConsumer>>) -> DispatchTable {
        DispatchTable { version, consumers }
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn consumers(&self) -> &[Arc<QueueConsumer>] {
        &self.consumers
    }

    /// Compute, for every severity, the indices of the consumers that accept
    /// records of the given source at that severity. Severities no consumer
    /// wants get an empty list, which is what makes "nobody listens" a cheap
    /// check on the hot path.
    pub(crate) fn resolve(&self, source: &str) -> [Vec<usize>; Severity::COUNT] {
        Severity::ALL.map(|severity| {
            self.consumers
                .iter()
                .enumerate()
                .filter(|(_, consumer)| consumer.accepts(source, severity))
                .map(|(index, _)| index)
                .collect()
        })
    }
}
