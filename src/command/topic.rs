// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic to command parsing.

use crate::command::{Command, Verb};
use crate::error::{Error, Result};
use crate::types::Target;

/// Parser for `<namespace>/command/<verb>[/<index>]` topics.
///
/// Parsing is pure: it never touches the device and does not check the
/// outlet index against the strip size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTopic {
    namespace: String,
    default_outlet: u32,
}

impl Default for CommandTopic {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAMESPACE)
    }
}

impl CommandTopic {
    /// Default topic namespace.
    pub const DEFAULT_NAMESPACE: &'static str = "hs300";
    /// Outlet targeted by topics without a trailing index.
    pub const DEFAULT_OUTLET: u32 = 1;

    /// Creates a parser for the given namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            default_outlet: Self::DEFAULT_OUTLET,
        }
    }

    /// Sets the outlet used when the topic carries no index.
    #[must_use]
    pub fn with_default_outlet(mut self, outlet: u32) -> Self {
        self.default_outlet = outlet;
        self
    }

    /// Returns the topic namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the outlet used when the topic carries no index.
    #[must_use]
    pub fn default_outlet(&self) -> u32 {
        self.default_outlet
    }

    /// Returns the subscription filter covering every command topic.
    #[must_use]
    pub fn subscription(&self) -> String {
        format!("{}/command/#", self.namespace)
    }

    /// Parses a topic into a command with an empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedTopic`] if the topic does not have the
    /// command shape, and [`Error::UnknownCommand`] if the verb segment is
    /// well formed but names no known verb.
    pub fn parse(&self, topic: &str) -> Result<Command> {
        let malformed = || Error::MalformedTopic(topic.to_string());

        let segments: Vec<&str> = topic.split('/').collect();
        let (verb, index) = match segments.as_slice() {
            [namespace, "command", verb] if *namespace == self.namespace => (*verb, None),
            [namespace, "command", verb, index] if *namespace == self.namespace => {
                (*verb, Some(*index))
            }
            _ => return Err(malformed()),
        };

        if verb.is_empty() || !verb.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(malformed());
        }

        let outlet = match index {
            None => self.default_outlet,
            Some(index) => {
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed());
                }
                index.parse().map_err(|_| malformed())?
            }
        };

        let verb: Verb = verb.parse()?;
        Ok(Command::new(verb, Target::Outlet(outlet)))
    }
}
