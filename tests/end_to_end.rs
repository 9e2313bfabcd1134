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

use logfan::Record;
use logfan::Registry;
use logfan::RuleDefaults;
use logfan::RuleSpec;
use logfan::Severity;
use logfan::SinkConfig;
use logfan::StopMode;
use logfan::sink::Collecting;

#[test]
fn severity_rules_route_records_to_the_right_sinks() {
    let sink_a = Collecting::new("a");
    let sink_b = Collecting::new("b");
    let collected_a = sink_a.records();
    let collected_b = sink_b.records();

    let registry = Registry::builder()
        .sink(SinkConfig::new(sink_a).rule(RuleSpec::new().severities("ERROR")))
        .sink(SinkConfig::new(sink_b).rule(RuleSpec::new().severities("INFO ONLY")))
        .build();

    let handle = registry.resolve("X");
    handle.write(
        Record::builder()
            .severity(Severity::Error)
            .source("X")
            .message("boom")
            .build(),
    );
    handle.write(
        Record::builder()
            .severity(Severity::Info)
            .source("X")
            .message("hello")
            .build(),
    );
    registry.stop_all(StopMode::Graceful);

    // "ERROR" is cumulative (Output and Error), so sink A sees the error
    // record but not the info one; "INFO ONLY" is exact, so sink B sees the
    // info record alone.
    let a = collected_a.with_source("X");
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].severity(), Severity::Error);
    assert_eq!(a[0].message(), "boom");

    let b = collected_b.with_source("X");
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].severity(), Severity::Info);
    assert_eq!(b[0].message(), "hello");
}

#[test]
fn one_record_fans_out_to_every_accepting_sink() {
    let first = Collecting::new("first");
    let second = Collecting::new("second");
    let collected_first = first.records();
    let collected_second = second.records();

    let registry = Registry::builder()
        .sink(SinkConfig::new(first))
        .sink(SinkConfig::new(second))
        .build();

    registry.resolve("app").write(
        Record::builder()
            .severity(Severity::Warning)
            .source("app")
            .message("shared")
            .build(),
    );
    registry.stop_all(StopMode::Graceful);

    let at_first = collected_first.with_source("app");
    let at_second = collected_second.with_source("app");
    assert_eq!(at_first.len(), 1);
    assert_eq!(at_second.len(), 1);

    // Both sinks observe the same record, not a copy per sink.
    assert_eq!(
        at_first[0].context().sequence(),
        at_second[0].context().sequence()
    );
}

#[test]
fn source_patterns_route_by_origin() {
    let db = Collecting::new("db");
    let rest = Collecting::new("rest");
    let collected_db = db.records();
    let collected_rest = rest.records();

    let registry = Registry::builder()
        .sink(SinkConfig::new(db).rule(RuleSpec::new().include("Db*")))
        .sink(SinkConfig::new(rest).rule(RuleSpec::new().exclude("Db*")))
        .build();

    for source in ["DbPool", "dbpool", "HttpServer"] {
        registry.resolve(source).write(
            Record::builder()
                .severity(Severity::Info)
                .source(source)
                .message("event")
                .build(),
        );
    }
    registry.stop_all(StopMode::Graceful);

    // Matching is case-insensitive and anchored.
    assert_eq!(collected_db.with_source("DbPool").len(), 1);
    assert_eq!(collected_db.with_source("dbpool").len(), 1);
    assert!(collected_db.with_source("HttpServer").is_empty());

    assert!(collected_rest.with_source("DbPool").is_empty());
    assert!(collected_rest.with_source("dbpool").is_empty());
    assert_eq!(collected_rest.with_source("HttpServer").len(), 1);
}

#[test]
fn global_excludes_apply_unless_a_rule_opts_out() {
    let obeying = Collecting::new("obeying");
    let opted_out = Collecting::new("opted-out");
    let collected_obeying = obeying.records();
    let collected_opted_out = opted_out.records();

    let registry = Registry::builder()
        .defaults(RuleDefaults::new().global_exclude(["Noisy*"]))
        .sink(SinkConfig::new(obeying))
        .sink(SinkConfig::new(opted_out).rule(RuleSpec::new().use_global_exclude(false)))
        .build();

    for source in ["NoisyPoller", "Quiet"] {
        registry.resolve(source).write(
            Record::builder()
                .severity(Severity::Info)
                .source(source)
                .message("event")
                .build(),
        );
    }
    registry.stop_all(StopMode::Graceful);

    assert!(collected_obeying.with_source("NoisyPoller").is_empty());
    assert_eq!(collected_obeying.with_source("Quiet").len(), 1);

    assert_eq!(collected_opted_out.with_source("NoisyPoller").len(), 1);
    assert_eq!(collected_opted_out.with_source("Quiet").len(), 1);
}

#[test]
fn disabled_severities_are_cheap_no_ops() {
    let sink = Collecting::new("errors-only");
    let collected = sink.records();

    let registry = Registry::builder()
        .sink(SinkConfig::new(sink).rule(RuleSpec::new().severities("ERROR ONLY")))
        .build();

    let handle = registry.resolve("app");
    assert!(handle.is_enabled(Severity::Error));
    assert!(!handle.is_enabled(Severity::Debug));

    handle.write(
        Record::builder()
            .severity(Severity::Debug)
            .source("app")
            .message("nobody wants this")
            .build(),
    );
    registry.stop_all(StopMode::Graceful);

    assert!(collected.with_source("app").is_empty());
}
