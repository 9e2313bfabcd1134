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

//! Per-sink queueing: each sink gets an unbounded channel and a dedicated
//! consumer thread, so producers hand off records without waiting on I/O.

mod worker;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;

use self::worker::Worker;
use crate::Error;
use crate::filter::RuleSet;
use crate::record::Record;
use crate::record::Severity;
use crate::sink::Sink;
use crate::trap::Trap;

/// Default soft cap on the number of records queued per sink.
pub const DEFAULT_MAX_QUEUE_LEN: usize = 2048;

/// Default bound on draining a consumer during a graceful stop.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on waiting for the consumer after a forced stop.
const FORCED_STOP_TIMEOUT: Duration = Duration::from_millis(100);

/// Nap between queue-length checks while a producer is throttled.
const BACKPRESSURE_NAP: Duration = Duration::from_millis(1);

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;
const STOPPED: u8 = 3;

/// How a consumer treats its queue when asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopMode {
    /// Drain everything already queued, then close the sink.
    Graceful,
    /// Discard everything still queued, then close the sink.
    Forced,
}

#[derive(Debug)]
pub(crate) enum Message {
    Record(Arc<Record>),
    Shutdown(StopMode),
}

/// The owner of one sink: a queue, a consumer thread, and the state machine
/// that gates writes between start and stop.
#[derive(Debug)]
pub(crate) struct QueueConsumer {
    name: String,
    sink: Arc<dyn Sink>,
    rules: RuleSet,
    max_queue_len: usize,
    flush_timeout: Duration,
    state: AtomicU8,
    broken: Arc<AtomicBool>,
    sender: Sender<Message>,
    receiver: Receiver<Message>,
    done: Receiver<()>,
    worker: Mutex<Option<Worker>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    trap: Arc<dyn Trap>,
}

impl QueueConsumer {
    pub(crate) fn new(
        sink: Box<dyn Sink>,
        rules: RuleSet,
        max_queue_len: usize,
        flush_timeout: Duration,
        trap: Arc<dyn Trap>,
    ) -> QueueConsumer {
        let name = sink.name().to_string();
        let sink: Arc<dyn Sink> = Arc::from(sink);
        let (sender, receiver) = crossbeam_channel::unbounded();
        let (done_sender, done_receiver) = crossbeam_channel::bounded(0);
        let broken = Arc::new(AtomicBool::new(false));

        let worker = Worker::new(
            name.clone(),
            sink.clone(),
            receiver.clone(),
            broken.clone(),
            trap.clone(),
            done_sender,
        );

        QueueConsumer {
            name,
            sink,
            rules,
            max_queue_len,
            flush_timeout,
            state: AtomicU8::new(NOT_STARTED),
            broken,
            sender,
            receiver,
            done: done_receiver,
            worker: Mutex::new(Some(worker)),
            handle: Mutex::new(None),
            trap,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Whether this consumer's sink wants records of the given pair. The
    /// configured rules decide first; the sink itself keeps a veto.
    pub(crate) fn accepts(&self, source: &str, severity: Severity) -> bool {
        self.rules.accepts(source, severity) && self.sink.accepts(source, severity)
    }

    /// Launch the consumer thread. Only the first call on a fresh consumer
    /// does anything; the sink is opened on the new thread so that slow
    /// `open` implementations never stall configuration.
    pub(crate) fn start(&self) {
        if self
            .state
            .compare_exchange(NOT_STARTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else { return };

        let handle = std::thread::Builder::new()
            .name(format!("logfan-sink-{}", self.name))
            .spawn(move || worker.run())
            .expect("failed to spawn sink consumer thread");
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Enqueue one record. A record offered before `start` or after `stop`
    /// is dropped silently, as is everything while the sink is broken.
    ///
    /// The queue itself never rejects a send; instead, while it holds more
    /// than `max_queue_len` records the producer naps and re-checks, so a
    /// slow sink throttles its producers without ever deadlocking them.
    pub(crate) fn write(&self, record: &Arc<Record>) {
        if !self.is_running() || self.broken.load(Ordering::Relaxed) {
            return;
        }

        if self.max_queue_len > 0 {
            while self.sender.len() > self.max_queue_len {
                if !self.is_running() {
                    return;
                }
                std::thread::sleep(BACKPRESSURE_NAP);
            }
        }

        let _ = self.sender.send(Message::Record(record.clone()));
    }

    /// Stop the consumer and block until it has wound down or the mode's
    /// timeout elapses. Subsequent calls return immediately.
    pub(crate) fn stop(&self, mode: StopMode) {
        // Never-started consumers have nothing to drain or join.
        if self
            .state
            .compare_exchange(NOT_STARTED, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            return;
        }
        if self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        if mode == StopMode::Forced {
            self.clear_queue();
        }
        let _ = self.sender.send(Message::Shutdown(mode));

        let timeout = match mode {
            StopMode::Graceful => self.flush_timeout,
            StopMode::Forced => FORCED_STOP_TIMEOUT,
        };
        match self.done.recv_timeout(timeout) {
            // The worker never sends on `done`; dropping its end is the
            // signal that the loop has finished.
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let handle = self
                    .handle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(handle) = handle {
                    let _ = handle.join();
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                self.trap.trap(
                    &Error::new("sink consumer did not stop in time; abandoning it")
                        .with_context("sink", &self.name)
                        .with_context("timeout", format!("{timeout:?}")),
                );
                // The stuck thread keeps whatever it still holds; the queue
                // is emptied so its contents do not linger in memory.
                self.clear_queue();
                drop(
                    self.handle
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take(),
                );
            }
        }

        self.state.store(STOPPED, Ordering::Release);
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.sender.len()
    }

    fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    fn clear_queue(&self) {
        while self.receiver.try_recv().is_ok() {}
    }
}
