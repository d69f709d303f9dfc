// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Publishing failures back onto the bus.
//!
//! Every failure is logged first. When the bus is connected an
//! [`ErrorEnvelope`] is published on the error topic at QoS 0; when it is
//! not, [`ErrorReporter::report`] hands the original error back to the
//! caller so it cannot disappear silently.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, TransportError};
use crate::protocol::Bus;

/// JSON body published for each failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    /// Error kind and where it was raised, e.g. `InvalidOutlet in router`.
    pub exception: String,
    /// The chain of underlying causes, one per line.
    pub traceback: String,
    /// The human readable error message.
    pub message: String,
}

impl ErrorEnvelope {
    /// Builds the envelope for `error` raised at `location`.
    #[must_use]
    pub fn new(error: &Error, location: &str) -> Self {
        let mut traceback = format!("{}: {error}", error.kind());
        let mut source = error.source();
        while let Some(cause) = source {
            let _ = write!(traceback, "\ncaused by: {cause}");
            source = cause.source();
        }
        let _ = write!(traceback, "\n  at {location}");

        Self {
            exception: format!("{} in {location}", error.kind()),
            traceback,
            message: error.to_string(),
        }
    }
}

/// Converts failures into [`ErrorEnvelope`]s published on the bus.
#[derive(Clone)]
pub struct ErrorReporter {
    bus: Arc<dyn Bus>,
    topic: String,
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("topic", &self.topic)
            .field("connected", &self.bus.is_connected())
            .finish_non_exhaustive()
    }
}

impl ErrorReporter {
    /// Creates a reporter publishing on `<namespace>/error`.
    #[must_use]
    pub fn new(bus: Arc<dyn Bus>, namespace: &str) -> Self {
        Self {
            bus,
            topic: format!("{namespace}/error"),
        }
    }

    /// Returns the error topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns whether the bus is currently connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }

    /// Logs `error` and publishes its envelope if the bus is connected.
    ///
    /// A failed publish on a connected bus is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] if the bus is disconnected.
    pub fn publish(&self, error: &Error, location: &str) -> Result<(), TransportError> {
        tracing::error!(kind = error.kind(), location, error = %error, "Command or poll failed");

        if !self.bus.is_connected() {
            tracing::warn!(topic = %self.topic, "Bus disconnected, error not published");
            return Err(TransportError::NotConnected);
        }

        let envelope = ErrorEnvelope::new(error, location);
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode error envelope");
                return Ok(());
            }
        };

        if let Err(e) = self.bus.publish(&self.topic, payload) {
            tracing::warn!(topic = %self.topic, error = %e, "Failed to publish error envelope");
        }
        Ok(())
    }

    /// Reports `error`, consuming it.
    ///
    /// # Errors
    ///
    /// Returns `error` unchanged when the bus is disconnected.
    pub fn report(&self, error: Error, location: &str) -> Result<(), Error> {
        match self.publish(&error, location) {
            Ok(()) => Ok(()),
            Err(_) => Err(error),
        }
    }
}
