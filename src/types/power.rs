// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power state of an outlet.

use std::fmt;
use std::ops::Not;

/// Represents the power state of an outlet or of the whole strip.
///
/// # Examples
///
/// ```
/// use hs300_bridge::types::PowerState;
///
/// assert_eq!(PowerState::On.as_str(), "on");
/// assert_eq!(!PowerState::On, PowerState::Off);
/// assert_eq!(PowerState::from_payload("off"), Some(PowerState::Off));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    /// Relay is open.
    Off,
    /// Relay is closed.
    On,
}

impl PowerState {
    /// Returns the lowercase name used in command payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
        }
    }

    /// Returns the numeric relay state used by the strip.
    #[must_use]
    pub const fn as_num(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    /// Parses a payload status value.
    ///
    /// Only the exact spellings `on` and `off` are recognized.
    #[must_use]
    pub fn from_payload(value: &str) -> Option<Self> {
        match value {
            "on" => Some(Self::On),
            "off" => Some(Self::Off),
            _ => None,
        }
    }

    /// Returns `true` for [`PowerState::On`].
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl Not for PowerState {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On => Self::Off,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<bool> for PowerState {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_state_from_payload() {
        assert_eq!(PowerState::from_payload("on"), Some(PowerState::On));
        assert_eq!(PowerState::from_payload("off"), Some(PowerState::Off));
    }

    #[test]
    fn power_state_from_payload_is_strict() {
        assert_eq!(PowerState::from_payload("ON"), None);
        assert_eq!(PowerState::from_payload("toggle"), None);
        assert_eq!(PowerState::from_payload(""), None);
    }

    #[test]
    fn power_state_inverts() {
        assert_eq!(!PowerState::On, PowerState::Off);
        assert_eq!(!PowerState::Off, PowerState::On);
    }

    #[test]
    fn power_state_from_bool() {
        assert_eq!(PowerState::from(true), PowerState::On);
        assert_eq!(PowerState::from(false), PowerState::Off);
        assert_eq!(PowerState::On.as_num(), 1);
        assert_eq!(PowerState::Off.as_num(), 0);
    }
}
