// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The power strip capability.
//!
//! The bridge only talks to the strip through [`PowerStrip`]. The dispatcher
//! and the telemetry poller share one instance; neither holds state of its
//! own about outlets.
//!
//! [`KasaStrip`] implements the capability for a Kasa HS300 reachable on the
//! local network.
//!
//! ```no_run
//! use hs300_bridge::device::{KasaStrip, PowerStrip};
//! use hs300_bridge::protocol::KasaConfig;
//!
//! # async fn example() -> Result<(), hs300_bridge::DeviceError> {
//! let strip = KasaStrip::new(KasaConfig::new("192.168.0.215"));
//! strip.update().await?;
//!
//! if !strip.is_on(2).await? {
//!     strip.turn_on(2).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod kasa;
mod telemetry;

pub use kasa::KasaStrip;
pub use telemetry::{EmeterReading, OutletTelemetry, StripTelemetry};

use crate::error::DeviceError;

/// Async operations a multi-outlet strip exposes.
///
/// Outlet indices are 1-based. Callers validate them against
/// [`outlet_count`](PowerStrip::outlet_count) before issuing I/O.
#[allow(async_fn_in_trait)]
pub trait PowerStrip {
    /// Returns the number of outlets known from the last refresh.
    fn outlet_count(&self) -> u32;

    /// Refreshes all state: outlet list, relay states and energy readings.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the strip cannot be queried.
    async fn update(&self) -> Result<(), DeviceError>;

    /// Reads the live relay state of one outlet.
    ///
    /// This always queries the strip; it never answers from cached state.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the strip cannot be queried.
    async fn is_on(&self, outlet: u32) -> Result<bool, DeviceError>;

    /// Closes the relay of one outlet.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the strip rejects or does not receive the request.
    async fn turn_on(&self, outlet: u32) -> Result<(), DeviceError>;

    /// Opens the relay of one outlet.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the strip rejects or does not receive the request.
    async fn turn_off(&self, outlet: u32) -> Result<(), DeviceError>;

    /// Returns the snapshot taken by the last [`update`](PowerStrip::update).
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if no refresh has succeeded yet.
    fn telemetry(&self) -> Result<StripTelemetry, DeviceError>;
}
