// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The supervised telemetry loop.

use std::sync::Arc;
use std::time::Duration;

use crate::device::PowerStrip;
use crate::error::{Error, Result, TransportError};
use crate::protocol::Bus;
use crate::report::ErrorReporter;
use crate::telemetry::telemetry_messages;

const LOCATION: &str = "telemetry_poller.step";

/// Timing of the telemetry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    interval: Duration,
    failure_period: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            failure_period: Self::DEFAULT_FAILURE_PERIOD,
        }
    }
}

impl PollerConfig {
    /// Delay between successful polls.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
    /// Time from a failed poll to the next attempt, counting the interval.
    pub const DEFAULT_FAILURE_PERIOD: Duration = Duration::from_secs(60);

    /// Sets the delay after a successful poll.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the total period between a failed poll and the next attempt.
    #[must_use]
    pub fn with_failure_period(mut self, failure_period: Duration) -> Self {
        self.failure_period = failure_period;
        self
    }

    /// Returns the delay after a successful poll.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the failure period.
    #[must_use]
    pub fn failure_period(&self) -> Duration {
        self.failure_period
    }

    /// Returns the delay after a failed poll: the failure period minus the
    /// interval, or zero if the interval is longer.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.failure_period.saturating_sub(self.interval)
    }
}

/// State of the telemetry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// The last poll succeeded, or no poll ran yet.
    Polling,
    /// The last poll failed; the next one waits for the cooldown.
    CoolingDown,
}

/// Periodically publishes strip and outlet telemetry.
///
/// Each step refreshes the strip, then publishes one message on
/// `<namespace>/emeter` and one per outlet on `<namespace>/emeter/<index>`.
/// A failed step is reported and followed by the longer cooldown. The loop
/// only ends when a failure cannot be reported.
pub struct TelemetryPoller<S> {
    strip: Arc<S>,
    bus: Arc<dyn Bus>,
    reporter: ErrorReporter,
    topic: String,
    config: PollerConfig,
    state: PollState,
}

impl<S> std::fmt::Debug for TelemetryPoller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPoller")
            .field("topic", &self.topic)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: PowerStrip> TelemetryPoller<S> {
    /// Creates a poller in the [`PollState::Polling`] state.
    #[must_use]
    pub fn new(
        strip: Arc<S>,
        bus: Arc<dyn Bus>,
        reporter: ErrorReporter,
        namespace: &str,
        config: PollerConfig,
    ) -> Self {
        Self {
            strip,
            bus,
            reporter,
            topic: format!("{namespace}/emeter"),
            config,
            state: PollState::Polling,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Refreshes the strip and publishes its telemetry.
    ///
    /// Returns the number of messages published. Nothing is published while
    /// the bus is disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the refresh fails, or
    /// [`Error::Transport`] if a message cannot be queued.
    pub async fn poll(&self) -> Result<usize> {
        self.strip.update().await?;
        let telemetry = self.strip.telemetry()?;

        if !self.bus.is_connected() {
            tracing::debug!(topic = %self.topic, "Bus disconnected, skipping telemetry publish");
            return Ok(0);
        }

        let messages = telemetry_messages(&self.topic, &telemetry);
        for (topic, message) in &messages {
            let payload = serde_json::to_string(message).map_err(TransportError::from)?;
            self.bus.publish(topic, payload)?;
        }
        Ok(messages.len())
    }

    /// Runs one poll and returns the delay before the next one.
    ///
    /// # Errors
    ///
    /// Returns the poll failure if it could not be reported because the bus
    /// is disconnected.
    pub async fn step(&mut self) -> Result<Duration> {
        match self.poll().await {
            Ok(published) => {
                if self.state == PollState::CoolingDown {
                    tracing::info!("Telemetry recovered");
                }
                self.state = PollState::Polling;
                tracing::debug!(published, "Published telemetry");
                Ok(self.config.interval)
            }
            Err(error) => {
                self.state = PollState::CoolingDown;
                self.reporter.report(error, LOCATION)?;
                let cooldown = self.config.cooldown();
                tracing::warn!(cooldown_secs = cooldown.as_secs(), "Telemetry cooling down");
                Ok(cooldown)
            }
        }
    }

    /// Polls until a failure cannot be reported, and returns that failure.
    pub async fn run(mut self) -> Error {
        tracing::info!(
            topic = %self.topic,
            interval_secs = self.config.interval.as_secs(),
            "Telemetry poller started"
        );
        loop {
            match self.step().await {
                Ok(delay) => tokio::time::sleep(delay).await,
                Err(error) => return error,
            }
        }
    }
}
