// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Telemetry payloads published on the emeter topics.

use serde::Serialize;

use crate::device::{EmeterReading, OutletTelemetry, StripTelemetry};

/// JSON payload of one telemetry message.
///
/// Serializes as
/// `{"name": str, "status": bool, "V": float, "W": float, "A": float, "total_wh": float}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryMessage {
    /// Strip or outlet name.
    pub name: String,
    /// Whether the strip or outlet is on.
    pub status: bool,
    /// Voltage in Volts.
    #[serde(rename = "V")]
    pub voltage: f64,
    /// Power in Watts.
    #[serde(rename = "W")]
    pub power: f64,
    /// Current in Amperes.
    #[serde(rename = "A")]
    pub current: f64,
    /// Cumulative energy in Watt-hours.
    pub total_wh: f64,
}

impl TelemetryMessage {
    fn new(name: &str, status: bool, emeter: EmeterReading) -> Self {
        Self {
            name: name.to_string(),
            status,
            voltage: emeter.voltage,
            power: emeter.power,
            current: emeter.current,
            total_wh: emeter.total_wh,
        }
    }

    /// Aggregate message for the whole strip.
    #[must_use]
    pub fn from_strip(strip: &StripTelemetry) -> Self {
        Self::new(&strip.name, strip.is_on(), strip.emeter())
    }

    /// Message for a single outlet.
    #[must_use]
    pub fn from_outlet(outlet: &OutletTelemetry) -> Self {
        Self::new(&outlet.name, outlet.is_on, outlet.emeter)
    }
}

/// Builds the strip message on `base` followed by one message per outlet on
/// `<base>/<index>`.
#[must_use]
pub fn telemetry_messages(base: &str, strip: &StripTelemetry) -> Vec<(String, TelemetryMessage)> {
    std::iter::once((base.to_string(), TelemetryMessage::from_strip(strip)))
        .chain(strip.outlets.iter().map(|outlet| {
            (
                format!("{base}/{}", outlet.index),
                TelemetryMessage::from_outlet(outlet),
            )
        }))
        .collect()
}
