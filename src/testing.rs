// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test doubles for the strip and the bus.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::device::{EmeterReading, OutletTelemetry, PowerStrip, StripTelemetry};
use crate::error::{DeviceError, TransportError};
use crate::protocol::Bus;

/// A call received by [`FakeStrip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeviceCall {
    Update,
    IsOn(u32),
    TurnOn(u32),
    TurnOff(u32),
}

/// In-memory strip that records every I/O call.
#[derive(Debug)]
pub(crate) struct FakeStrip {
    states: Mutex<Vec<bool>>,
    /// Outlets revealed by the first successful update.
    hidden: Mutex<Vec<bool>>,
    calls: Mutex<Vec<DeviceCall>>,
    failing: AtomicBool,
    failing_updates: AtomicBool,
    latency: Mutex<Duration>,
}

impl FakeStrip {
    pub(crate) fn new(states: &[bool]) -> Self {
        Self {
            states: Mutex::new(states.to_vec()),
            hidden: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            failing_updates: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Six outlets, all off.
    pub(crate) fn hs300() -> Self {
        Self::new(&[false; 6])
    }

    /// A strip that reports no outlets until it has been updated.
    pub(crate) fn unrefreshed(states: &[bool]) -> Self {
        let strip = Self::new(&[]);
        *strip.hidden.lock() = states.to_vec();
        strip
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fails only [`PowerStrip::update`], leaving outlet operations working.
    pub(crate) fn set_failing_updates(&self, failing: bool) {
        self.failing_updates.store(failing, Ordering::SeqCst);
    }

    /// Delays every I/O call by `latency`.
    pub(crate) fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub(crate) fn set_state(&self, outlet: u32, on: bool) {
        self.states.lock()[outlet as usize - 1] = on;
    }

    pub(crate) fn state(&self, outlet: u32) -> bool {
        self.states.lock()[outlet as usize - 1]
    }

    pub(crate) fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    async fn record(&self, call: DeviceCall) -> Result<(), DeviceError> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.calls.lock().push(call);
        let failing = self.failing.load(Ordering::SeqCst)
            || (call == DeviceCall::Update && self.failing_updates.load(Ordering::SeqCst));
        if failing {
            Err(DeviceError::Timeout(5000))
        } else {
            Ok(())
        }
    }
}

impl PowerStrip for FakeStrip {
    fn outlet_count(&self) -> u32 {
        u32::try_from(self.states.lock().len()).unwrap_or(u32::MAX)
    }

    async fn update(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::Update).await?;
        let hidden = std::mem::take(&mut *self.hidden.lock());
        if !hidden.is_empty() {
            *self.states.lock() = hidden;
        }
        Ok(())
    }

    async fn is_on(&self, outlet: u32) -> Result<bool, DeviceError> {
        self.record(DeviceCall::IsOn(outlet)).await?;
        Ok(self.state(outlet))
    }

    async fn turn_on(&self, outlet: u32) -> Result<(), DeviceError> {
        self.record(DeviceCall::TurnOn(outlet)).await?;
        self.set_state(outlet, true);
        Ok(())
    }

    async fn turn_off(&self, outlet: u32) -> Result<(), DeviceError> {
        self.record(DeviceCall::TurnOff(outlet)).await?;
        self.set_state(outlet, false);
        Ok(())
    }

    fn telemetry(&self) -> Result<StripTelemetry, DeviceError> {
        let outlets = (1..)
            .zip(self.states.lock().iter())
            .map(|(index, &is_on)| OutletTelemetry {
                index,
                name: format!("Plug {index}"),
                is_on,
                emeter: EmeterReading {
                    voltage: 120.0,
                    current: if is_on { 0.5 } else { 0.0 },
                    power: if is_on { 60.0 } else { 0.0 },
                    total_wh: 100.0,
                },
            })
            .collect();
        Ok(StripTelemetry {
            name: "Fake Strip".to_string(),
            outlets,
        })
    }
}

/// Bus that records publishes and reports a settable connectivity.
#[derive(Debug)]
pub(crate) struct RecordingBus {
    connected: AtomicBool,
    failing: AtomicBool,
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingBus {
    pub(crate) fn connected() -> Self {
        Self {
            connected: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            published: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    pub(crate) fn published_on(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| serde_json::from_str(payload).unwrap_or_default())
            .collect()
    }
}

impl Bus for RecordingBus {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Thread("request queue closed".to_string()));
        }
        self.published.lock().push((topic.to_string(), payload));
        Ok(())
    }
}
