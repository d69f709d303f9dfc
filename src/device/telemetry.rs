// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live electrical readings of the strip and its outlets.

/// One energy-meter reading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmeterReading {
    /// Voltage in Volts.
    pub voltage: f64,
    /// Current in Amperes.
    pub current: f64,
    /// Power in Watts.
    pub power: f64,
    /// Cumulative energy in Watt-hours.
    pub total_wh: f64,
}

/// Snapshot of one outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct OutletTelemetry {
    /// 1-based outlet index.
    pub index: u32,
    /// User-assigned outlet name.
    pub name: String,
    /// Whether the relay is closed.
    pub is_on: bool,
    /// Energy-meter reading.
    pub emeter: EmeterReading,
}

/// Snapshot of the whole strip, outlets in physical port order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StripTelemetry {
    /// User-assigned strip name.
    pub name: String,
    /// Outlets, index 1 first.
    pub outlets: Vec<OutletTelemetry>,
}

impl StripTelemetry {
    /// The strip counts as on when any outlet is on.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.outlets.iter().any(|outlet| outlet.is_on)
    }

    /// Aggregate reading: power, current and energy are summed, voltage is
    /// averaged over the outlets.
    #[must_use]
    pub fn emeter(&self) -> EmeterReading {
        let mut total = self
            .outlets
            .iter()
            .fold(EmeterReading::default(), |acc, outlet| EmeterReading {
                voltage: acc.voltage + outlet.emeter.voltage,
                current: acc.current + outlet.emeter.current,
                power: acc.power + outlet.emeter.power,
                total_wh: acc.total_wh + outlet.emeter.total_wh,
            });

        if !self.outlets.is_empty() {
            // At most a handful of outlets.
            #[allow(clippy::cast_precision_loss)]
            let count = self.outlets.len() as f64;
            total.voltage /= count;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outlet(index: u32, is_on: bool, voltage: f64, power: f64) -> OutletTelemetry {
        OutletTelemetry {
            index,
            name: format!("Plug {index}"),
            is_on,
            emeter: EmeterReading {
                voltage,
                current: power / voltage,
                power,
                total_wh: 10.0,
            },
        }
    }

    #[test]
    fn strip_emeter_sums_and_averages() {
        let strip = StripTelemetry {
            name: "Strip".to_string(),
            outlets: vec![outlet(1, true, 120.0, 60.0), outlet(2, false, 122.0, 0.0)],
        };
        let emeter = strip.emeter();
        assert!((emeter.voltage - 121.0).abs() < f64::EPSILON);
        assert!((emeter.power - 60.0).abs() < f64::EPSILON);
        assert!((emeter.current - 0.5).abs() < f64::EPSILON);
        assert!((emeter.total_wh - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn strip_is_on_when_any_outlet_is_on() {
        let mut strip = StripTelemetry {
            name: "Strip".to_string(),
            outlets: vec![outlet(1, false, 120.0, 0.0), outlet(2, true, 120.0, 5.0)],
        };
        assert!(strip.is_on());
        strip.outlets[1].is_on = false;
        assert!(!strip.is_on());
    }

    #[test]
    fn empty_strip_reading_is_zero() {
        assert_eq!(StripTelemetry::default().emeter(), EmeterReading::default());
    }
}
