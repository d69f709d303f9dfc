// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command execution against the strip.
//!
//! ```text
//! topic + payload
//!       ↓
//! CommandRouter::route()  → CommandTopic::parse()
//!       ↓
//! CommandRouter::execute() → optional strip refresh
//!       ↓
//! OutletDispatcher::{toggle, turn_on, turn_off}
//!       ↓
//! PowerStrip
//! ```

mod dispatcher;
mod router;

pub use dispatcher::OutletDispatcher;
pub use router::CommandRouter;
