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

//! Log record, severity, and construction context.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::Error;
use crate::scope::ScopeContext;

/// Represents a borrowed value in a key-value pair.
pub type Value<'a> = value_bag::ValueBag<'a>;

/// Represents an owned value in a key-value pair.
pub type ValueOwned = value_bag::OwnedValueBag;

/// An enum representing the available severities of a log record, from the
/// highest priority (`Output`) down to the lowest (`Debug`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Designates unconditional output.
    Output,
    /// Designates very serious errors.
    Error,
    /// Designates hazardous situations.
    Warning,
    /// Designates useful information.
    Info,
    /// Designates fine-grained tracing information.
    Trace,
    /// Designates very low priority, often extremely verbose, information.
    Debug,
}

impl Severity {
    /// The number of distinct severities.
    pub const COUNT: usize = 6;

    /// All severities, from the most to the least severe.
    ///
    /// The position of each severity in this array equals its `as usize`
    /// discriminant, so the array can be used to build per-severity tables.
    pub const ALL: [Severity; Severity::COUNT] = [
        Severity::Output,
        Severity::Error,
        Severity::Warning,
        Severity::Info,
        Severity::Trace,
        Severity::Debug,
    ];

    /// Return the string representation of the `Severity`.
    ///
    /// This returns the same string as the `fmt::Display` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Output => "OUTPUT",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
        }
    }

    /// Return the numeric priority of this severity; `Output` maps to the
    /// largest value and `Debug` to zero.
    pub fn priority(self) -> u8 {
        (Self::COUNT as u8 - 1) - self as u8
    }
}

impl fmt::Debug for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;
    fn from_str(s: &str) -> Result<Severity, Self::Err> {
        for (name, severity) in [
            ("output", Severity::Output),
            ("write", Severity::Output),
            ("error", Severity::Error),
            ("warning", Severity::Warning),
            ("info", Severity::Info),
            ("trace", Severity::Trace),
            ("debug", Severity::Debug),
        ] {
            if s.eq_ignore_ascii_case(name) {
                return Ok(severity);
            }
        }

        Err(Error::new(format!("malformed severity: {s:?}")))
    }
}

/// Whether a record is a plain message or marks the boundary of a logical
/// group of records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum GroupKind {
    /// A plain log message.
    #[default]
    Message,
    /// Opens a nested logical group.
    BeginGroup,
    /// Closes the innermost logical group.
    EndGroup,
}

/// Ambient facts captured when a record is constructed.
#[derive(Clone, Copy, Debug)]
pub struct RecordContext {
    machine: &'static str,
    process_id: u32,
    thread_id: u64,
    timestamp: jiff::Timestamp,
    sequence: u64,
}

impl RecordContext {
    pub(crate) fn capture() -> RecordContext {
        RecordContext {
            machine: machine_name(),
            process_id: std::process::id(),
            thread_id: current_thread_id(),
            timestamp: jiff::Timestamp::now(),
            sequence: next_sequence(),
        }
    }

    /// The machine name, resolved once per process from the `HOSTNAME` or
    /// `COMPUTERNAME` environment variable.
    pub fn machine(&self) -> &'static str {
        self.machine
    }

    /// The operating system id of the current process.
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// The id of the thread that constructed the record, or zero if it could
    /// not be determined.
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    /// The UTC timestamp at construction.
    pub fn timestamp(&self) -> jiff::Timestamp {
        self.timestamp
    }

    /// A process-wide sequence number; strictly greater for a record
    /// constructed after another.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

fn machine_name() -> &'static str {
    static MACHINE: OnceLock<String> = OnceLock::new();
    MACHINE.get_or_init(|| {
        std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "localhost".to_string())
    })
}

fn current_thread_id() -> u64 {
    // Extract the raw id from the `Debug` output of `ThreadId`; there is no
    // stable accessor for it yet.
    let id = format!("{:?}", std::thread::current().id());
    id.strip_prefix("ThreadId(")
        .and_then(|id| id.strip_suffix(')'))
        .and_then(|id| id.parse().ok())
        .unwrap_or_default()
}

fn next_sequence() -> u64 {
    // A single atomic orders all constructions; records created in
    // happens-before order observe strictly increasing values.
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// A captured error, with its chain of causes.
#[derive(Clone, Debug)]
pub struct ExceptionInfo {
    message: String,
    stack: Option<String>,
    cause: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    /// Create a new exception info with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    /// Attach a stack text to the exception info.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attach a nested cause to the exception info.
    pub fn with_cause(mut self, cause: ExceptionInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Capture an error and its `source()` chain as nested causes.
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        Self {
            message: err.to_string(),
            stack: None,
            cause: err.source().map(|cause| Box::new(Self::from_error(cause))),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The stack text, if captured.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// The nested cause, if any.
    pub fn cause(&self) -> Option<&ExceptionInfo> {
        self.cause.as_deref()
    }
}

/// One immutable log event.
///
/// Records are constructed through [`Record::builder`], fanned out to the
/// sinks that accept their `(source, severity)` pair, and never mutated
/// afterwards.
#[derive(Clone, Debug)]
pub struct Record {
    severity: Severity,
    source: String,
    message: String,
    data: Vec<(String, ValueOwned)>,
    exception: Option<ExceptionInfo>,
    group_kind: GroupKind,
    indent: u32,
    context: RecordContext,
}

impl Record {
    /// Returns a new builder.
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// The severity of the record.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// The origin identifier used for pattern matching.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The message body.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The key-value pairs, in insertion order. Keys are not required to be
    /// unique.
    pub fn data(&self) -> &[(String, ValueOwned)] {
        &self.data
    }

    /// The captured exception, if any.
    pub fn exception(&self) -> Option<&ExceptionInfo> {
        self.exception.as_ref()
    }

    /// Whether the record is a plain message or a group boundary.
    pub fn group_kind(&self) -> GroupKind {
        self.group_kind
    }

    /// The nesting depth stamped from the scope context the record was built
    /// with, or zero.
    pub fn indent(&self) -> u32 {
        self.indent
    }

    /// The ambient facts captured at construction.
    pub fn context(&self) -> &RecordContext {
        &self.context
    }
}

/// Builder for [`Record`].
///
/// The construction context (timestamp, sequence number) is captured by
/// [`build`](RecordBuilder::build), not when the builder is created.
#[derive(Debug)]
pub struct RecordBuilder {
    severity: Severity,
    source: String,
    message: String,
    data: Vec<(String, ValueOwned)>,
    exception: Option<ExceptionInfo>,
    group_kind: GroupKind,
    indent: u32,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        RecordBuilder {
            severity: Severity::Info,
            source: String::new(),
            message: String::new(),
            data: vec![],
            exception: None,
            group_kind: GroupKind::Message,
            indent: 0,
        }
    }
}

impl RecordBuilder {
    /// Set [`severity`](Record::severity).
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set [`source`](Record::source).
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set [`message`](Record::message).
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Append one key-value pair to [`data`](Record::data).
    pub fn arg(mut self, key: impl Into<String>, value: Value<'_>) -> Self {
        self.data.push((key.into(), value.to_owned()));
        self
    }

    /// Append multiple key-value pairs to [`data`](Record::data).
    pub fn args<'a>(mut self, args: impl IntoIterator<Item = (&'a str, Value<'a>)>) -> Self {
        for (key, value) in args {
            self.data.push((key.to_string(), value.to_owned()));
        }
        self
    }

    /// Set [`exception`](Record::exception).
    pub fn exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Mark the record as a group boundary (or plain message) and stamp its
    /// indent by advancing the given scope context.
    pub fn scoped(mut self, kind: GroupKind, scope: &mut ScopeContext) -> Self {
        self.group_kind = kind;
        self.indent = scope.advance(kind);
        self
    }

    /// Capture the construction context and return the finished `Record`.
    pub fn build(self) -> Record {
        Record {
            severity: self.severity,
            source: self.source,
            message: self.message,
            data: self.data,
            exception: self.exception,
            group_kind: self.group_kind,
            indent: self.indent,
            context: RecordContext::capture(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_and_priority() {
        assert!(Severity::Output < Severity::Error);
        assert!(Severity::Trace < Severity::Debug);

        assert_eq!(Severity::Output.priority(), 5);
        assert_eq!(Severity::Warning.priority(), 3);
        assert_eq!(Severity::Debug.priority(), 0);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("warning".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!("WRITE".parse::<Severity>().unwrap(), Severity::Output);
        assert_eq!("Output".parse::<Severity>().unwrap(), Severity::Output);
        assert!("verbose".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_all_is_indexable() {
        for (index, severity) in Severity::ALL.into_iter().enumerate() {
            assert_eq!(severity as usize, index);
        }
    }

    #[test]
    fn test_builder_populates_record() {
        let record = Record::builder()
            .severity(Severity::Error)
            .source("db::pool")
            .message("connection refused")
            .arg("attempt", Value::from(3u64))
            .arg("attempt", Value::from(4u64))
            .build();

        assert_eq!(record.severity(), Severity::Error);
        assert_eq!(record.source(), "db::pool");
        assert_eq!(record.message(), "connection refused");
        assert_eq!(record.group_kind(), GroupKind::Message);
        assert_eq!(record.indent(), 0);

        // Duplicate keys are kept in insertion order.
        assert_eq!(record.data().len(), 2);
        assert_eq!(record.data()[0].1.by_ref().to_u64(), Some(3));
        assert_eq!(record.data()[1].1.by_ref().to_u64(), Some(4));
    }

    #[test]
    fn test_context_is_populated() {
        let record = Record::builder().build();
        let context = record.context();

        assert!(!context.machine().is_empty());
        assert_eq!(context.process_id(), std::process::id());
    }

    #[test]
    fn test_sequence_is_strictly_increasing() {
        let first = Record::builder().build();
        let second = Record::builder().build();
        assert!(first.context().sequence() < second.context().sequence());
    }

    #[test]
    fn test_exception_from_error_walks_causes() {
        let root = Error::new("disk full");
        let outer = Error::new("failed to write log batch").with_source(root);

        let info = ExceptionInfo::from_error(&outer);
        assert_eq!(info.message(), "failed to write log batch: disk full");

        let cause = info.cause().unwrap();
        assert_eq!(cause.message(), "disk full");
        assert!(cause.cause().is_none());
    }
}
