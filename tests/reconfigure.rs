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
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use logfan::Record;
use logfan::Registry;
use logfan::Severity;
use logfan::SinkConfig;
use logfan::StopMode;
use logfan::sink::Collecting;

fn record(source: &str, message: &str) -> Record {
    Record::builder()
        .severity(Severity::Info)
        .source(source)
        .message(message)
        .build()
}

#[test]
fn stale_handles_reach_the_new_sink_set() {
    let old_sink = Collecting::new("old");
    let collected_old = old_sink.records();
    let registry = Registry::builder().sink(SinkConfig::new(old_sink)).build();

    let handle = registry.resolve("app");
    handle.write(record("app", "to the old sink"));

    let new_sink = Collecting::new("new");
    let collected_new = new_sink.records();
    registry.reconfigure([SinkConfig::new(new_sink)]);

    // The handle still carries routes against the old table; its next write
    // re-resolves transparently and lands in the new sink.
    handle.write(record("app", "to the new sink"));
    registry.stop_all(StopMode::Graceful);

    let old = collected_old.with_source("app");
    assert_eq!(old.len(), 1);
    assert_eq!(old[0].message(), "to the old sink");

    let new = collected_new.with_source("app");
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].message(), "to the new sink");
}

#[test]
fn reconfigure_waits_for_displaced_queues_to_drain() {
    let old_sink = Collecting::new("old");
    let collected_old = old_sink.records();
    let registry = Registry::builder().sink(SinkConfig::new(old_sink)).build();

    let handle = registry.resolve("app");
    for i in 0..100 {
        handle.write(record("app", &format!("queued {i}")));
    }
    registry.reconfigure([SinkConfig::new(Collecting::new("new"))]);

    // Everything enqueued before the swap was flushed, in order, followed
    // by the exit marker.
    let drained = collected_old.with_source("app");
    assert_eq!(drained.len(), 100);
    for (i, record) in drained.iter().enumerate() {
        assert_eq!(record.message(), format!("queued {i}"));
    }
    let all = collected_old.snapshot();
    assert_eq!(all.last().unwrap().message(), "sink consumer exiting");
}

#[test]
fn writes_keep_flowing_through_a_reconfiguration_storm() {
    let keeper = Collecting::new("keeper");
    let collected = keeper.records();
    let registry = Registry::builder().sink(SinkConfig::new(keeper)).build();

    let stop_writing = Arc::new(AtomicBool::new(false));
    let written = Arc::new(AtomicU64::new(0));
    std::thread::scope(|scope| {
        let writer = {
            let registry = registry.clone();
            let stop_writing = stop_writing.clone();
            let written = written.clone();
            scope.spawn(move || {
                let handle = registry.resolve("app");
                while !stop_writing.load(Ordering::SeqCst) {
                    let i = written.fetch_add(1, Ordering::SeqCst);
                    handle.write(record("app", &format!("write {i}")));
                }
            })
        };

        while written.load(Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }

        // Churn the table underneath the writer. Each pass displaces the
        // previous sink and installs a fresh one; drops during the races are
        // allowed, deadlocks and panics are not.
        for _ in 0..10 {
            registry.reconfigure([SinkConfig::new(Collecting::new("transient"))]);
        }

        stop_writing.store(true, Ordering::SeqCst);
        writer.join().expect("writer panicked");
    });
    registry.stop_all(StopMode::Graceful);

    assert!(written.load(Ordering::SeqCst) > 0);

    // Whatever did get delivered kept the producer's order.
    let delivered = collected.with_source("app");
    for pair in delivered.windows(2) {
        assert!(pair[0].context().sequence() < pair[1].context().sequence());
    }
}

#[test]
fn handles_created_before_any_sink_pick_up_later_config() {
    let registry = Registry::new();
    let handle = registry.resolve("app");

    // Nothing is configured, so this write goes nowhere.
    handle.write(record("app", "dropped"));

    let sink = Collecting::new("late");
    let collected = sink.records();
    registry.reconfigure([SinkConfig::new(sink)]);

    handle.write(record("app", "delivered"));
    registry.stop_all(StopMode::Graceful);

    let delivered = collected.with_source("app");
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].message(), "delivered");
}
