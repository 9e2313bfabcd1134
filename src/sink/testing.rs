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
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::Error;
use crate::record::Record;
use crate::sink::Sink;

/// A sink that collects records in memory, for inspection by a test harness.
///
/// The collected records are shared through the cheap handle returned by
/// [`records`](Collecting::records), which stays valid after the sink itself
/// has been moved into a configuration.
///
/// # Examples
///
/// ```
/// use logfan::sink::Collecting;
///
/// let sink = Collecting::new("memory");
/// let records = sink.records();
/// assert!(records.is_empty());
/// ```
#[derive(Debug)]
pub struct Collecting {
    name: String,
    records: CollectedRecords,
}

impl Collecting {
    /// Create a collecting sink with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: CollectedRecords::default(),
        }
    }

    /// A handle onto the records collected so far.
    pub fn records(&self) -> CollectedRecords {
        self.records.clone()
    }
}

impl Sink for Collecting {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> String {
        "memory".to_string()
    }

    fn write(&self, records: &[Arc<Record>]) -> Result<(), Error> {
        self.records.extend(records);
        Ok(())
    }
}

/// A cheap, cloneable handle onto the records captured by a [`Collecting`]
/// sink.
#[derive(Debug, Clone, Default)]
pub struct CollectedRecords(Arc<Mutex<Vec<Arc<Record>>>>);

impl CollectedRecords {
    fn extend(&self, records: &[Arc<Record>]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(records);
    }

    /// A copy of everything collected so far, in arrival order.
    pub fn snapshot(&self) -> Vec<Arc<Record>> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The number of records collected so far.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been collected yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the collected records whose source equals `source`, in
    /// arrival order. Shutdown marker records carry the sink's own name as
    /// their source, so tests usually select by the sources they logged.
    pub fn with_source(&self, source: &str) -> Vec<Arc<Record>> {
        self.snapshot()
            .into_iter()
            .filter(|record| record.source() == source)
            .collect()
    }
}
