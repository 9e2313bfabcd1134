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

//! Logfan is an in-process asynchronous dispatch engine for structured log
//! records: producers hand records to per-source handles, and the engine fans
//! each record out to every sink whose rules accept it, without blocking
//! producers on slow or failing destinations.
//!
//! # Overview
//!
//! A [`Registry`] owns the active sink set. Each sink runs behind its own
//! queue and consumer thread at its own pace; severity masks and source
//! patterns decide per sink which records it receives. The sink set can be
//! swapped at runtime without pausing producers, and shutdown either drains
//! the queues or drops them, per [`StopMode`].
//!
//! # Examples
//!
//! Deliver errors to one sink and check what arrived after a graceful stop:
//!
//! ```
//! use logfan::Record;
//! use logfan::Registry;
//! use logfan::RuleSpec;
//! use logfan::Severity;
//! use logfan::SinkConfig;
//! use logfan::StopMode;
//! use logfan::sink::Collecting;
//!
//! let sink = Collecting::new("errors");
//! let records = sink.records();
//!
//! let registry = Registry::builder()
//!     .sink(SinkConfig::new(sink).rule(RuleSpec::new().severities("ERROR")))
//!     .build();
//!
//! let handle = registry.resolve("db");
//! handle.write(
//!     Record::builder()
//!         .severity(Severity::Error)
//!         .source("db")
//!         .message("connection lost")
//!         .build(),
//! );
//! handle.write(
//!     Record::builder()
//!         .severity(Severity::Debug)
//!         .source("db")
//!         .message("retrying")
//!         .build(),
//! );
//!
//! registry.stop_all(StopMode::Graceful);
//! assert_eq!(records.with_source("db").len(), 1);
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod filter;
pub mod record;
pub mod sink;
pub mod trap;

pub use filter::RuleDefaults;
pub use filter::RuleSpec;
pub use record::GroupKind;
pub use record::Record;
pub use record::RecordBuilder;
pub use record::Severity;
pub use sink::Sink;
pub use trap::Trap;

mod consumer;
mod error;
mod handle;
mod registry;
mod scope;

pub use consumer::DEFAULT_FLUSH_TIMEOUT;
pub use consumer::DEFAULT_MAX_QUEUE_LEN;
pub use consumer::StopMode;
pub use error::Error;
pub use handle::DispatchHandle;
pub use registry::Registry;
pub use registry::RegistryBuilder;
pub use registry::SinkConfig;
pub use scope::ScopeContext;
