// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by commands, the dispatcher and the strip driver.
//!
//! - [`PowerState`] - On/Off state of an outlet
//! - [`Target`] - A single outlet or the whole strip

mod power;
mod target;

pub use power::PowerState;
pub use target::Target;
