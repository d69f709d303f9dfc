// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload decoding and per-verb argument validation.

use serde_json::{Map, Value};

use crate::command::Verb;
use crate::error::PayloadError;
use crate::types::PowerState;

/// Decodes a raw message payload into named arguments.
///
/// An empty payload is read as `{}`.
///
/// # Errors
///
/// Returns [`PayloadError`] if the payload is not UTF-8, not JSON, or not a
/// JSON object.
pub fn decode_payload(raw: &[u8]) -> Result<Map<String, Value>, PayloadError> {
    let text = std::str::from_utf8(raw).map_err(|_| PayloadError::NotUtf8)?;
    if text.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str(text)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(PayloadError::NotAnObject("null")),
        Value::Bool(_) => Err(PayloadError::NotAnObject("boolean")),
        Value::Number(_) => Err(PayloadError::NotAnObject("number")),
        Value::String(_) => Err(PayloadError::NotAnObject("string")),
        Value::Array(_) => Err(PayloadError::NotAnObject("array")),
    }
}

/// Rejects any argument not listed in `accepted`.
///
/// # Errors
///
/// Returns [`PayloadError::UnexpectedArguments`] naming every extra field.
pub fn reject_arguments(
    verb: Verb,
    payload: &Map<String, Value>,
    accepted: &[&str],
) -> Result<(), PayloadError> {
    let unexpected: Vec<&str> = payload
        .keys()
        .map(String::as_str)
        .filter(|key| !accepted.contains(key))
        .collect();

    if unexpected.is_empty() {
        Ok(())
    } else {
        Err(PayloadError::UnexpectedArguments {
            command: verb.as_str(),
            fields: unexpected.join(", "),
        })
    }
}

/// Arguments accepted by [`Verb::Toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToggleArguments {
    /// Explicit target state; `None` means flip the observed state.
    ///
    /// A `status` value other than `"on"` or `"off"` is treated as absent.
    pub status: Option<PowerState>,
}

impl ToggleArguments {
    /// Extracts toggle arguments from a payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::UnexpectedArguments`] if fields other than
    /// `status` are present.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, PayloadError> {
        reject_arguments(Verb::Toggle, payload, &["status"])?;
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .and_then(PowerState::from_payload);
        Ok(Self { status })
    }
}
