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

use std::io;
use std::io::Write;

use crate::Error;
use crate::trap::Trap;

/// The fallback trap: one line per failure to standard error.
///
/// The engine runs embedded in a host process, so each line carries a
/// `logfan:` prefix to tell its failures apart from the host's own output.
/// When standard error cannot be written there is nowhere left to report,
/// and the failure is discarded.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct DefaultTrap {}

impl Trap for DefaultTrap {
    fn trap(&self, error: &Error) {
        let _ = writeln!(io::stderr(), "logfan: {error}");
    }
}
