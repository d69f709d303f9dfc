// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// What a command acts on: one outlet or the whole strip.
///
/// Outlet indices are 1-based and follow the physical port order. The index
/// is not range-checked here; that happens right before device I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// A single outlet by its 1-based index.
    Outlet(u32),
    /// Every outlet of the strip.
    Strip,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outlet(index) => write!(f, "outlet {index}"),
            Self::Strip => f.write_str("strip"),
        }
    }
}
