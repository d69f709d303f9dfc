// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Telemetry publishing.
//!
//! [`TelemetryPoller`] refreshes the strip on a fixed cadence and publishes
//! one [`TelemetryMessage`] for the strip and one per outlet:
//!
//! - `hs300/emeter` - the strip aggregate
//! - `hs300/emeter/<index>` - each outlet, `1..=N`
//!
//! ```text
//!            success: sleep interval
//!           ┌──────────┐
//!           ▼          │
//!       Polling ───────┘
//!        ▲   │ failure: report, sleep cooldown
//!        │   ▼
//!      CoolingDown
//! ```

mod message;
mod poller;

pub use message::{TelemetryMessage, telemetry_messages};
pub use poller::{PollState, PollerConfig, TelemetryPoller};
