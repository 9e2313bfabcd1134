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

use arc_swap::ArcSwap;

use crate::record::Record;
use crate::record::Severity;
use crate::registry::DispatchOutcome;
use crate::registry::Registry;

/// A per-source dispatcher holding the consumer indices that want records of
/// each severity, stamped with the table version they were computed from.
///
/// This is what hot logging code calls on every statement, so the common
/// case of [`is_enabled`](DispatchHandle::is_enabled) and
/// [`write`](DispatchHandle::write) is an array index plus a version
/// compare. Only when the registry has been reconfigured underneath the
/// handle does a call fall back to the registry lock to re-resolve, and it
/// does so transparently.
///
/// Handles are safe to share and cheap to clone; clones share one route
/// cache.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    registry: Registry,
    source: String,
    cache: Arc<ArcSwap<Routes>>,
}

#[derive(Debug)]
struct Routes {
    version: u64,
    by_severity: [Vec<usize>; Severity::COUNT],
}

impl DispatchHandle {
    pub(crate) fn new(registry: Registry, source: String) -> DispatchHandle {
        let (version, by_severity) = registry.snapshot_routes(&source);
        let routes = Routes {
            version,
            by_severity,
        };
        DispatchHandle {
            registry,
            source,
            cache: Arc::new(ArcSwap::from_pointee(routes)),
        }
    }

    /// The source this handle routes for.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The registry this handle resolves against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Whether any active sink currently wants records of this handle's
    /// source at the given severity. Cheap enough to gate the construction
    /// of expensive records.
    pub fn is_enabled(&self, severity: Severity) -> bool {
        !self.current().by_severity[severity as usize].is_empty()
    }

    /// Fan one record out to every consumer that wants this handle's source
    /// at the record's severity.
    ///
    /// Routing keys on the handle's source, so records written through a
    /// handle should be built with that same source. A record nobody wants
    /// is dropped without any work beyond the severity lookup.
    ///
    /// If a reconfiguration lands between the version check and the
    /// fan-out, the handle re-resolves and retries exactly once. Losing
    /// that race a second time drops the record; the next call starts from
    /// the fresh routes.
    pub fn write(&self, record: Record) {
        let severity = record.severity();
        let record = Arc::new(record);

        let routes = self.current();
        let targets = &routes.by_severity[severity as usize];
        if targets.is_empty() {
            return;
        }
        if self.registry.dispatch(&record, routes.version, targets) == DispatchOutcome::Delivered {
            return;
        }

        let routes = self.refresh();
        let targets = &routes.by_severity[severity as usize];
        if targets.is_empty() {
            return;
        }
        let _ = self.registry.dispatch(&record, routes.version, targets);
    }

    /// The cached routes, refreshed first if the registry has moved on.
    fn current(&self) -> Arc<Routes> {
        let routes = self.cache.load_full();
        if routes.version == self.registry.version() {
            routes
        } else {
            self.refresh()
        }
    }

    fn refresh(&self) -> Arc<Routes> {
        let (version, by_severity) = self.registry.snapshot_routes(&self.source);
        let routes = Arc::new(Routes {
            version,
            by_severity,
        });
        self.cache.store(routes.clone());
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::StopMode;
    use crate::filter::RuleSpec;
    use crate::registry::SinkConfig;
    use crate::sink::Collecting;

    #[test]
    fn test_is_enabled_tracks_rules() {
        let registry = Registry::builder()
            .sink(
                SinkConfig::new(Collecting::new("errors"))
                    .rule(RuleSpec::new().severities("ERROR")),
            )
            .build();
        let handle = registry.resolve("app");

        assert!(handle.is_enabled(Severity::Output));
        assert!(handle.is_enabled(Severity::Error));
        assert!(!handle.is_enabled(Severity::Warning));
        assert!(!handle.is_enabled(Severity::Info));
        assert!(!handle.is_enabled(Severity::Debug));
    }

    #[test]
    fn test_handle_notices_new_sinks() {
        let registry = Registry::new();
        let handle = registry.resolve("app");
        assert!(!handle.is_enabled(Severity::Info));

        let sink = Collecting::new("late");
        let records = sink.records();
        registry.reconfigure([SinkConfig::new(sink)]);

        // The same handle picks up the new table on its next use, even
        // though it cached empty routes before.
        assert!(handle.is_enabled(Severity::Info));
        handle.write(Record::builder().source("app").message("hello").build());

        registry.stop_all(StopMode::Graceful);
        assert_eq!(records.with_source("app").len(), 1);
    }

    #[test]
    fn test_clones_share_the_route_cache() {
        let registry = Registry::new();
        let handle = registry.resolve("app");
        let clone = handle.clone();

        registry.reconfigure([SinkConfig::new(Collecting::new("mem"))]);

        // Refreshing through one clone refreshes the other.
        assert!(handle.is_enabled(Severity::Info));
        assert_eq!(clone.cache.load().version, registry.version());
    }
}
