// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound command definitions.
//!
//! A [`Command`] is built once per inbound bus message by [`CommandTopic::parse`]
//! and never mutated afterwards.
//!
//! # Topic Structure
//!
//! | Topic | Verb | Target |
//! |-------|------|--------|
//! | `hs300/command/toggle/2` | [`Verb::Toggle`] | outlet 2 |
//! | `hs300/command/on/5` | [`Verb::TurnOn`] | outlet 5 |
//! | `hs300/command/off` | [`Verb::TurnOff`] | the default outlet |
//!
//! # Examples
//!
//! ```
//! use hs300_bridge::command::{CommandTopic, Verb};
//! use hs300_bridge::types::Target;
//!
//! let topics = CommandTopic::default();
//! let command = topics.parse("hs300/command/toggle/2").unwrap();
//!
//! assert_eq!(command.verb(), Verb::Toggle);
//! assert_eq!(command.target(), Target::Outlet(2));
//! ```

mod arguments;
mod topic;

pub use arguments::{ToggleArguments, decode_payload, reject_arguments};
pub use topic::CommandTopic;

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::types::{PowerState, Target};

/// The command type carried in the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Flip an outlet, or set it to the `status` given in the payload.
    Toggle,
    /// Switch an outlet on.
    TurnOn,
    /// Switch an outlet off.
    TurnOff,
}

impl Verb {
    /// All known verbs.
    pub const ALL: [Self; 3] = [Self::Toggle, Self::TurnOn, Self::TurnOff];

    /// Returns the topic segment for this verb.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::TurnOn => "on",
            Self::TurnOff => "off",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| Error::UnknownCommand(s.to_string()))
    }
}

/// A command addressed to the strip.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    verb: Verb,
    target: Target,
    payload: Map<String, Value>,
}

impl Command {
    /// Creates a command with an empty payload.
    #[must_use]
    pub fn new(verb: Verb, target: Target) -> Self {
        Self {
            verb,
            target,
            payload: Map::new(),
        }
    }

    /// Attaches the decoded message payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Returns the command verb.
    #[must_use]
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Returns what the command acts on.
    #[must_use]
    pub fn target(&self) -> Target {
        self.target
    }

    /// Returns the named arguments sent with the command.
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Returns the explicit `status` argument when it is `on` or `off`.
    #[must_use]
    pub fn desired_status(&self) -> Option<PowerState> {
        self.payload
            .get("status")
            .and_then(Value::as_str)
            .and_then(PowerState::from_payload)
    }
}
