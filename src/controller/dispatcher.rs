// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-outlet power operations.

use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::device::PowerStrip;
use crate::error::{Error, Result};
use crate::types::{PowerState, Target};

/// Validates outlet indices and issues power operations against the strip.
///
/// Every operation checks `1 <= index <= N` before switching anything. While
/// the outlet count is still unknown (zero) the strip is refreshed once to
/// learn it; that refresh is the only I/O allowed before the check. A toggle
/// without an explicit state reads the live outlet state right before
/// switching; the read and the switch are not atomic on the device, so two
/// concurrent toggles of the same outlet may race.
#[derive(Debug)]
pub struct OutletDispatcher<S> {
    strip: Arc<S>,
}

impl<S: PowerStrip> OutletDispatcher<S> {
    /// Creates a dispatcher for `strip`.
    #[must_use]
    pub fn new(strip: Arc<S>) -> Self {
        Self { strip }
    }

    /// Returns the strip this dispatcher drives.
    #[must_use]
    pub fn strip(&self) -> &Arc<S> {
        &self.strip
    }

    /// Returns the outlets `target` covers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOutlet`] if an outlet index is outside `1..=N`.
    pub fn outlets(&self, target: Target) -> Result<RangeInclusive<u32>> {
        let count = self.strip.outlet_count();
        match target {
            Target::Outlet(index) if (1..=count).contains(&index) => Ok(index..=index),
            Target::Outlet(index) => Err(Error::InvalidOutlet {
                index,
                min: 1,
                max: count,
            }),
            Target::Strip => Ok(1..=count),
        }
    }

    /// Switches `target` on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOutlet`] before switching for a bad index, or
    /// [`Error::Device`] if the strip fails.
    pub async fn turn_on(&self, target: Target) -> Result<()> {
        self.set(target, PowerState::On).await
    }

    /// Switches `target` off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOutlet`] before switching for a bad index, or
    /// [`Error::Device`] if the strip fails.
    pub async fn turn_off(&self, target: Target) -> Result<()> {
        self.set(target, PowerState::Off).await
    }

    /// Sets `target` to `desired`, or flips its observed state when `desired`
    /// is `None`.
    ///
    /// For the whole strip, flipping means switching everything off when any
    /// outlet is on, and everything on otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOutlet`] before switching for a bad index, or
    /// [`Error::Device`] if the strip fails.
    pub async fn toggle(&self, target: Target, desired: Option<PowerState>) -> Result<()> {
        let outlets = self.resolve(target).await?;

        let state = match desired {
            Some(state) => state,
            None => {
                let mut any_on = false;
                for outlet in outlets.clone() {
                    if self.strip.is_on(outlet).await? {
                        any_on = true;
                        break;
                    }
                }
                let observed = PowerState::from(any_on);
                tracing::debug!(%target, %observed, "Toggling observed state");
                !observed
            }
        };

        self.apply(outlets, state).await
    }

    async fn set(&self, target: Target, state: PowerState) -> Result<()> {
        let outlets = self.resolve(target).await?;
        self.apply(outlets, state).await
    }

    /// Like [`outlets`](Self::outlets), but learns the outlet layout first if
    /// the strip has not reported it yet.
    async fn resolve(&self, target: Target) -> Result<RangeInclusive<u32>> {
        if self.strip.outlet_count() == 0 {
            tracing::debug!(%target, "Outlet count unknown, refreshing strip");
            self.strip.update().await?;
        }
        self.outlets(target)
    }

    async fn apply(&self, outlets: RangeInclusive<u32>, state: PowerState) -> Result<()> {
        for outlet in outlets {
            match state {
                PowerState::On => self.strip.turn_on(outlet).await?,
                PowerState::Off => self.strip.turn_off(outlet).await?,
            }
            tracing::info!(outlet, %state, "Outlet set");
        }
        Ok(())
    }
}
