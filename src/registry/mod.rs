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

//! The mutable root of the pipeline: the registry owns the current set of
//! consumers and swaps it atomically, so the logging path never locks.

mod table;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use arc_swap::ArcSwap;

use self::table::DispatchTable;
use crate::consumer::DEFAULT_FLUSH_TIMEOUT;
use crate::consumer::DEFAULT_MAX_QUEUE_LEN;
use crate::consumer::QueueConsumer;
use crate::consumer::StopMode;
use crate::filter::RuleDefaults;
use crate::filter::RuleSet;
use crate::filter::RuleSpec;
use crate::handle::DispatchHandle;
use crate::record::Record;
use crate::record::Severity;
use crate::sink::Sink;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// One sink plus the rules and queue tuning it runs with.
#[derive(Debug)]
pub struct SinkConfig {
    sink: Box<dyn Sink>,
    rules: Vec<RuleSpec>,
    max_queue_len: usize,
    flush_timeout: Duration,
}

impl SinkConfig {
    /// Wrap a sink with no explicit rules and default queue tuning. A sink
    /// configured without rules receives everything the registry defaults
    /// allow.
    pub fn new(sink: impl Into<Box<dyn Sink>>) -> SinkConfig {
        SinkConfig {
            sink: sink.into(),
            rules: Vec::new(),
            max_queue_len: DEFAULT_MAX_QUEUE_LEN,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }

    /// Add one filter rule. A record is delivered if any of the configured
    /// rules accepts its `(source, severity)` pair.
    pub fn rule(mut self, rule: RuleSpec) -> SinkConfig {
        self.rules.push(rule);
        self
    }

    /// Set the soft cap on queued records past which producers are
    /// throttled. `0` turns the throttle off. Defaults to
    /// [`DEFAULT_MAX_QUEUE_LEN`].
    pub fn max_queue_len(mut self, max_queue_len: usize) -> SinkConfig {
        self.max_queue_len = max_queue_len;
        self
    }

    /// Set the bound on draining the queue during a graceful stop. Defaults
    /// to [`DEFAULT_FLUSH_TIMEOUT`].
    pub fn flush_timeout(mut self, flush_timeout: Duration) -> SinkConfig {
        self.flush_timeout = flush_timeout;
        self
    }

    fn into_consumer(self, defaults: &RuleDefaults, trap: &Arc<dyn Trap>) -> QueueConsumer {
        let rules = RuleSet::compile(&self.rules, defaults, trap.as_ref());
        QueueConsumer::new(
            self.sink,
            rules,
            self.max_queue_len,
            self.flush_timeout,
            trap.clone(),
        )
    }
}

/// Result of a version-checked fan-out attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    /// The record was offered to every routed consumer.
    Delivered,
    /// The table moved after the routes were computed; nothing was written.
    Stale,
}

/// The root of the pipeline: owns the active sink set, the process-wide
/// filter defaults, and the failure side channel.
///
/// All mutation happens under one lock and ends in an atomic swap of an
/// immutable table snapshot; everything on the logging path reads the
/// current snapshot without locking. Clones share the same registry.
///
/// When the last clone (including those held by handles) is dropped, any
/// consumers still running are stopped gracefully. Call
/// [`Registry::stop_all`] for an explicit, deterministic shutdown point.
#[derive(Debug, Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    table: ArcSwap<DispatchTable>,
    mutate: Mutex<()>,
    defaults: RuleDefaults,
    trap: Arc<dyn Trap>,
}

impl Registry {
    /// Create a registry with no sinks, default filter fallbacks, and
    /// failures reported to stderr. Use [`Registry::builder`] to change any
    /// of those.
    pub fn new() -> Registry {
        Registry::builder().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            defaults: RuleDefaults::new(),
            trap: Box::new(DefaultTrap::default()),
            sinks: Vec::new(),
        }
    }

    /// Create a handle that routes records of the given source. Resolution
    /// is the expensive step; the handle itself is cheap to use and meant to
    /// be kept around per source.
    pub fn resolve(&self, source: impl Into<String>) -> DispatchHandle {
        DispatchHandle::new(self.clone(), source.into())
    }

    /// Replace the active sink set.
    ///
    /// The new consumers are built and started first, then the table is
    /// swapped in one atomic step with a larger version, which invalidates
    /// the routes cached by existing handles on their next use. The
    /// displaced consumers are drained gracefully after the swap, outside
    /// the lock, so reconfiguration never waits on a slow sink while other
    /// callers need the registry.
    pub fn reconfigure(&self, sinks: impl IntoIterator<Item = SinkConfig>) {
        let shared = &self.shared;
        let consumers: Vec<Arc<QueueConsumer>> = sinks
            .into_iter()
            .map(|config| Arc::new(config.into_consumer(&shared.defaults, &shared.trap)))
            .collect();

        let displaced = {
            let _guard = shared.lock_mutate();
            for consumer in &consumers {
                consumer.start();
            }
            let version = shared.table.load().version() + 1;
            let next = DispatchTable::new(version, consumers);
            shared.table.swap(Arc::new(next))
        };
        stop_consumers(displaced.consumers(), StopMode::Graceful);
    }

    /// Stop every consumer and leave the registry empty.
    ///
    /// Blocks until each consumer has wound down or hit its timeout;
    /// consumers stop in parallel, so one slow sink does not hold up the
    /// rest. A second call finds nothing to do. Records written while the
    /// stop is in flight race the swap and may be dropped.
    pub fn stop_all(&self, mode: StopMode) {
        self.shared.stop_all(mode);
    }

    pub(crate) fn version(&self) -> u64 {
        self.shared.table.load().version()
    }

    /// Snapshot the routes of one source against the current table under
    /// the mutation lock. This runs at handle-creation and reconfiguration
    /// rate, never per record.
    pub(crate) fn snapshot_routes(&self, source: &str) -> (u64, [Vec<usize>; Severity::COUNT]) {
        let shared = &self.shared;
        let _guard = shared.lock_mutate();
        let table = shared.table.load_full();
        (table.version(), table.resolve(source))
    }

    /// Fan one record out to the listed consumers, unless the table has
    /// moved past `version` since the routes were computed. The owned load
    /// keeps a slow consumer write from pinning the snapshot against a
    /// concurrent swap.
    pub(crate) fn dispatch(
        &self,
        record: &Arc<Record>,
        version: u64,
        routes: &[usize],
    ) -> DispatchOutcome {
        let table = self.shared.table.load_full();
        if table.version() != version {
            return DispatchOutcome::Stale;
        }
        for &index in routes {
            if let Some(consumer) = table.consumers().get(index) {
                consumer.write(record);
            }
        }
        DispatchOutcome::Delivered
    }
}

impl Default for Registry {
    fn default() -> Registry {
        Registry::new()
    }
}

impl Shared {
    fn lock_mutate(&self) -> MutexGuard<'_, ()> {
        self.mutate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_all(&self, mode: StopMode) {
        let displaced = {
            let _guard = self.lock_mutate();
            let current = self.table.load_full();
            if current.consumers().is_empty() {
                return;
            }
            let next = DispatchTable::new(current.version() + 1, Vec::new());
            self.table.swap(Arc::new(next))
        };
        stop_consumers(displaced.consumers(), mode);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.stop_all(StopMode::Graceful);
    }
}

fn stop_consumers(consumers: &[Arc<QueueConsumer>], mode: StopMode) {
    match consumers {
        [] => {}
        [consumer] => consumer.stop(mode),
        consumers => {
            std::thread::scope(|scope| {
                for consumer in consumers {
                    scope.spawn(move || consumer.stop(mode));
                }
            });
        }
    }
}

/// Builder for a [`Registry`].
#[derive(Debug)]
pub struct RegistryBuilder {
    defaults: RuleDefaults,
    trap: Box<dyn Trap>,
    sinks: Vec<SinkConfig>,
}

impl RegistryBuilder {
    /// Set the process-wide filter fallbacks: the default severity mask for
    /// rules without one, and the global exclude list unioned into every
    /// rule that does not opt out.
    pub fn defaults(mut self, defaults: RuleDefaults) -> RegistryBuilder {
        self.defaults = defaults;
        self
    }

    /// Replace the side channel internal failures are reported through.
    /// Defaults to [`DefaultTrap`], which writes to stderr.
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> RegistryBuilder {
        self.trap = trap.into();
        self
    }

    /// Add a sink to the initial configuration.
    pub fn sink(mut self, sink: SinkConfig) -> RegistryBuilder {
        self.sinks.push(sink);
        self
    }

    /// Build the registry, starting consumers for any sinks added here.
    pub fn build(self) -> Registry {
        let registry = Registry {
            shared: Arc::new(Shared {
                table: ArcSwap::from_pointee(DispatchTable::empty()),
                mutate: Mutex::new(()),
                defaults: self.defaults,
                trap: Arc::from(self.trap),
            }),
        };
        if !self.sinks.is_empty() {
            registry.reconfigure(self.sinks);
        }
        registry
    }
}
