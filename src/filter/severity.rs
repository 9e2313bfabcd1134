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

use std::fmt;

use crate::record::Severity;

/// A bitset of the severities a rule lets through.
///
/// Masks are usually parsed from a small grammar rather than assembled by
/// hand; see [`SeverityMask::parse`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeverityMask(u8);

impl SeverityMask {
    /// The mask that lets nothing through.
    pub const EMPTY: SeverityMask = SeverityMask(0);

    /// The mask that lets every severity through.
    pub const ALL: SeverityMask = SeverityMask((1 << Severity::COUNT) - 1);

    /// The mask containing exactly the given severity.
    pub fn only(severity: Severity) -> SeverityMask {
        SeverityMask(1 << severity as u8)
    }

    /// The mask containing the given severity and everything more severe.
    pub fn cumulative(severity: Severity) -> SeverityMask {
        SeverityMask((1 << (severity as u8 + 1)) - 1)
    }

    /// Whether the given severity is in the mask.
    pub fn contains(&self, severity: Severity) -> bool {
        self.0 & (1 << severity as u8) != 0
    }

    /// Add the given severity to the mask.
    pub fn insert(&mut self, severity: Severity) {
        self.0 |= 1 << severity as u8;
    }

    /// Remove the given severity from the mask.
    pub fn remove(&mut self, severity: Severity) {
        self.0 &= !(1 << severity as u8);
    }

    /// Whether the mask lets nothing through.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Parse a severity mask from a list of tokens separated by commas,
    /// spaces, semicolons, or plus signs.
    ///
    /// Recognized tokens are `WRITE` (or `OUTPUT`), `ERROR`, `WARNING`,
    /// `INFO`, `TRACE`, `DEBUG`, and `*`/`ALL`, matched case-insensitively.
    /// Selecting a token normally enables that severity and everything more
    /// severe, which models "log at this level and up"; an `ONLY` token
    /// anywhere in the list switches additions to the exact severities named
    /// instead. A `-` prefix removes the token's cumulative set from the mask
    /// accumulated so far, so the token order matters. `*` and `ALL` yield the
    /// full mask in either mode.
    ///
    /// Input with no recognizable token at all (empty, or nothing but
    /// garbage) yields `default`. Tokens that are not recognized are skipped,
    /// and a parse that nets out to nothing (for example `"ERROR -ERROR"`)
    /// yields the empty mask, not the default.
    pub fn parse(spec: &str, default: SeverityMask) -> SeverityMask {
        let tokens = spec
            .split([',', ' ', ';', '+'])
            .filter(|token| !token.is_empty());

        let exact = tokens
            .clone()
            .any(|token| token.eq_ignore_ascii_case("ONLY"));

        let mut mask = SeverityMask::EMPTY;
        let mut recognized = exact;
        for token in tokens {
            if token.eq_ignore_ascii_case("ONLY") {
                continue;
            }

            let (subtract, name) = match token.strip_prefix('-') {
                Some(name) => (true, name),
                None => (false, token),
            };

            if name == "*" || name.eq_ignore_ascii_case("ALL") {
                recognized = true;
                if subtract {
                    mask = SeverityMask::EMPTY;
                } else {
                    mask.0 |= SeverityMask::ALL.0;
                }
                continue;
            }

            let Some(severity) = severity_token(name) else {
                continue;
            };

            recognized = true;
            if subtract {
                // Subtraction always removes the cumulative set, even in
                // ONLY mode.
                mask.0 &= !SeverityMask::cumulative(severity).0;
            } else if exact {
                mask.0 |= SeverityMask::only(severity).0;
            } else {
                mask.0 |= SeverityMask::cumulative(severity).0;
            }
        }

        if recognized { mask } else { default }
    }
}

fn severity_token(name: &str) -> Option<Severity> {
    for (token, severity) in [
        ("WRITE", Severity::Output),
        ("OUTPUT", Severity::Output),
        ("ERROR", Severity::Error),
        ("WARNING", Severity::Warning),
        ("INFO", Severity::Info),
        ("TRACE", Severity::Trace),
        ("DEBUG", Severity::Debug),
    ] {
        if name.eq_ignore_ascii_case(token) {
            return Some(severity);
        }
    }
    None
}

impl fmt::Display for SeverityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        if *self == SeverityMask::ALL {
            return write!(f, "*");
        }

        let mut first = true;
        for severity in Severity::ALL {
            if self.contains(severity) {
                if !first {
                    write!(f, "+")?;
                }
                write!(f, "{}", severity.as_str())?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for SeverityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeverityMask({self})")
    }
}
