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

//! The contract between the dispatch engine and concrete record destinations.

use std::fmt;
use std::sync::Arc;

use crate::Error;
use crate::record::Record;
use crate::record::Severity;

mod testing;
pub use testing::CollectedRecords;
pub use testing::Collecting;

/// A destination for log records.
///
/// Sinks never see producers directly: a dedicated consumer thread owns each
/// sink and calls `open`, `write`, and `close` from that thread only. Errors
/// returned here are reported through the registry's [`Trap`](crate::Trap)
/// and never reach producers.
pub trait Sink: fmt::Debug + Send + Sync + 'static {
    /// A short name identifying this sink. Used to name its consumer thread
    /// and as the source of its shutdown marker records.
    fn name(&self) -> &str;

    /// A human-readable description of the destination.
    fn target(&self) -> String;

    /// An additional veto on top of the configured filter rules.
    ///
    /// Defaults to accepting everything, so the configured rules alone
    /// decide.
    fn accepts(&self, source: &str, severity: Severity) -> bool {
        let _ = (source, severity);
        true
    }

    /// Prepare resources. Idempotent. Defaults to a no-op.
    fn open(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Release resources. Idempotent. Defaults to a no-op.
    fn close(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Deliver a batch of records, in order.
    fn write(&self, records: &[Arc<Record>]) -> Result<(), Error>;
}

impl<T: Sink> From<T> for Box<dyn Sink> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
