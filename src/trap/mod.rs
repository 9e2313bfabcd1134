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

//! Side-channel reporting for errors that must not flow back to producers.
//!
//! Sink failures, shutdown timeouts, and rule compile errors are reported
//! through a [`Trap`] instead of the log pipeline itself, so a failing sink
//! can never start a recursive failure loop.

use std::fmt;

use crate::Error;

mod default;
pub use default::DefaultTrap;

/// A sink of last resort for internal errors.
pub trait Trap: fmt::Debug + Send + Sync + 'static {
    /// Consume an internal error. Must not panic.
    fn trap(&self, error: &Error);
}

impl<T: Trap> From<T> for Box<dyn Trap> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
