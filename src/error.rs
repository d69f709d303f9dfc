// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the HS300 bridge.
//!
//! Every failure the bridge can observe is expressed as an [`Error`]. The
//! nested enums group failures by the boundary they come from: the strip
//! ([`DeviceError`]), the message bus ([`TransportError`]), an inbound
//! payload ([`PayloadError`]) and the environment ([`ConfigError`]).

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The inbound topic does not have the `<namespace>/command/<verb>[/<index>]` shape.
    #[error("malformed topic: {0}")]
    MalformedTopic(String),

    /// The topic names a verb the bridge does not know.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The outlet index is outside `min..max` (both inclusive).
    #[error("invalid outlet {index}, must be in range {min}..{max}")]
    InvalidOutlet {
        /// The requested outlet index.
        index: u32,
        /// Lowest valid index (always 1).
        min: u32,
        /// Highest valid index, the number of outlets.
        max: u32,
    },

    /// The message payload could not be turned into command arguments.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    /// The strip could not be reached or answered with an error.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The message bus could not carry a message.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The process configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns the taxonomy name of this error.
    ///
    /// This is the name published in the `exception` field of error envelopes.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedTopic(_) => "MalformedTopic",
            Self::UnknownCommand(_) => "UnknownCommand",
            Self::InvalidOutlet { .. } => "InvalidOutlet",
            Self::InvalidPayload(_) => "InvalidPayload",
            Self::Device(_) => "DeviceIO",
            Self::Transport(TransportError::NotConnected) => "TransportUnavailable",
            Self::Transport(_) => "Transport",
            Self::Config(_) => "Config",
        }
    }
}

/// Errors raised while talking to the strip.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Network I/O with the strip failed.
    #[error("I/O error talking to {host}: {source}")]
    Io {
        /// The strip address.
        host: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The strip did not answer in time.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The strip answered with something that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The strip answered with a non-zero `err_code`.
    #[error("{method} failed with err_code {code}: {message}")]
    Rejected {
        /// The `module.method` that failed.
        method: String,
        /// The device error code.
        code: i64,
        /// The device error message, if any.
        message: String,
    },

    /// The response could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the message bus transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is not connected to the broker.
    #[error("not connected to the MQTT broker")]
    NotConnected,

    /// The broker did not acknowledge the connection in time.
    #[error("no connection acknowledgement from the MQTT broker within {0:?}")]
    ConnectTimeout(std::time::Duration),

    /// The MQTT client rejected the request.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport thread could not be started or joined.
    #[error("transport thread error: {0}")]
    Thread(String),
}

/// Errors raised while decoding an inbound payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload is not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is not UTF-8.
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    /// The payload is valid JSON but not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// The payload carries arguments the command does not accept.
    #[error("{command} does not accept arguments: {fields}")]
    UnexpectedArguments {
        /// The command verb.
        command: &'static str,
        /// The rejected field names, comma separated.
        fields: String,
    },
}

/// Errors raised while loading the configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required variable {0}")]
    Missing(&'static str),

    /// A variable has a value that cannot be used.
    #[error("invalid value for {name}: {value}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
