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
use std::sync::atomic::Ordering;
use std::time::Duration;

use crossbeam_channel::Receiver;
use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;
use crossbeam_channel::TryRecvError;

use super::Message;
use super::StopMode;
use crate::Error;
use crate::record::Record;
use crate::record::Severity;
use crate::sink::Sink;
use crate::trap::Trap;

/// Upper bound on the wait for a wake, so a lost signal can only delay the
/// loop, never stall it.
const PULSE_INTERVAL: Duration = Duration::from_millis(100);

/// Most records handed to the sink in one `write` call.
const MAX_BATCH_LEN: usize = 64;

#[derive(Debug)]
pub(crate) struct Worker {
    name: String,
    sink: Arc<dyn Sink>,
    receiver: Receiver<Message>,
    broken: Arc<AtomicBool>,
    trap: Arc<dyn Trap>,
    done: Sender<()>,
}

impl Worker {
    pub(crate) fn new(
        name: String,
        sink: Arc<dyn Sink>,
        receiver: Receiver<Message>,
        broken: Arc<AtomicBool>,
        trap: Arc<dyn Trap>,
        done: Sender<()>,
    ) -> Worker {
        Worker {
            name,
            sink,
            receiver,
            broken,
            trap,
            done,
        }
    }

    pub(crate) fn run(self) {
        let Self {
            name,
            sink,
            receiver,
            broken,
            trap,
            done,
        } = self;

        if let Err(err) = sink.open() {
            // The consumer keeps draining but discards from now on, and the
            // shared flag stops producers from enqueueing into a void.
            broken.store(true, Ordering::Relaxed);
            trap.trap(
                &Error::new("failed to open sink")
                    .with_context("sink", &name)
                    .with_source(err),
            );
        }

        let mode = loop {
            let first = match receiver.recv_timeout(PULSE_INTERVAL) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break StopMode::Graceful,
            };

            let mut batch = Vec::new();
            match first {
                Message::Record(record) => batch.push(record),
                // FIFO means everything enqueued before a graceful shutdown
                // request has already been drained when we see it.
                Message::Shutdown(mode) => break mode,
            }

            let mut stop = None;
            while batch.len() < MAX_BATCH_LEN {
                match receiver.try_recv() {
                    Ok(Message::Record(record)) => batch.push(record),
                    Ok(Message::Shutdown(mode)) => {
                        stop = Some(mode);
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        stop = Some(StopMode::Graceful);
                        break;
                    }
                }
            }

            if !broken.load(Ordering::Relaxed) {
                if let Err(err) = sink.write(&batch) {
                    // The failed batch is not retried; delivery is
                    // at-most-once.
                    trap.trap(
                        &Error::new("failed to write log batch")
                            .with_context("sink", &name)
                            .with_context("records", batch.len())
                            .with_source(err),
                    );
                }
            }

            if let Some(mode) = stop {
                break mode;
            }

            std::thread::yield_now();
        };

        if !broken.load(Ordering::Relaxed) {
            let message = match mode {
                StopMode::Graceful => "sink consumer exiting",
                StopMode::Forced => "sink consumer terminating",
            };
            let marker = Record::builder()
                .severity(Severity::Info)
                .source(&name)
                .message(message)
                .build();
            // The marker is best-effort.
            let _ = sink.write(&[Arc::new(marker)]);
        }

        if let Err(err) = sink.close() {
            trap.trap(
                &Error::new("failed to close sink")
                    .with_context("sink", &name)
                    .with_source(err),
            );
        }

        // Dropping our end tells the consumer the loop has finished.
        drop(done);
    }
}
