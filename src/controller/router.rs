// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command routing from topics to dispatcher operations.

use serde_json::{Map, Value};

use crate::command::{Command, CommandTopic, ToggleArguments, Verb, reject_arguments};
use crate::controller::OutletDispatcher;
use crate::device::PowerStrip;
use crate::error::Result;

/// Parses commands and runs them through the [`OutletDispatcher`].
///
/// The router does not report failures itself; every error is returned to
/// the caller unchanged.
#[derive(Debug)]
pub struct CommandRouter<S> {
    dispatcher: OutletDispatcher<S>,
    topics: CommandTopic,
    refresh_verbs: Vec<Verb>,
}

impl<S: PowerStrip> CommandRouter<S> {
    /// Creates a router with no verb requiring a refresh.
    #[must_use]
    pub fn new(dispatcher: OutletDispatcher<S>, topics: CommandTopic) -> Self {
        Self {
            dispatcher,
            topics,
            refresh_verbs: Vec::new(),
        }
    }

    /// Marks verbs that always refresh the strip state before dispatch.
    #[must_use]
    pub fn with_refresh_verbs(mut self, verbs: impl IntoIterator<Item = Verb>) -> Self {
        self.refresh_verbs = verbs.into_iter().collect();
        self
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &OutletDispatcher<S> {
        &self.dispatcher
    }

    /// Returns the topic parser.
    #[must_use]
    pub fn topics(&self) -> &CommandTopic {
        &self.topics
    }

    /// Parses `topic`, attaches `payload` and executes the command.
    ///
    /// # Errors
    ///
    /// Returns the parser's error for a bad topic, otherwise whatever
    /// [`execute`](Self::execute) returns.
    pub async fn route(&self, topic: &str, payload: Map<String, Value>) -> Result<()> {
        let command = self.topics.parse(topic)?.with_payload(payload);
        self.execute(&command, false).await
    }

    /// Executes a command.
    ///
    /// When `refresh_required` is set, or the verb is configured to need it,
    /// the full strip state is refreshed first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`](crate::Error::InvalidPayload) if the
    /// payload carries arguments the verb does not accept, and any error the
    /// refresh or the dispatcher raises.
    pub async fn execute(&self, command: &Command, refresh_required: bool) -> Result<()> {
        let verb = command.verb();
        let target = command.target();

        if refresh_required || self.refresh_verbs.contains(&verb) {
            tracing::info!(%verb, %target, "Refreshing strip state before command");
            self.dispatcher.strip().update().await?;
        }

        tracing::debug!(%verb, %target, payload = ?command.payload(), "Executing command");

        match verb {
            Verb::Toggle => {
                let args = ToggleArguments::from_payload(command.payload())?;
                self.dispatcher.toggle(target, args.status).await
            }
            Verb::TurnOn => {
                reject_arguments(verb, command.payload(), &[])?;
                self.dispatcher.turn_on(target).await
            }
            Verb::TurnOff => {
                reject_arguments(verb, command.payload(), &[])?;
                self.dispatcher.turn_off(target).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::{DeviceCall, FakeStrip};
    use crate::types::Target;
    use serde_json::json;
    use std::sync::Arc;

    fn router(strip: &Arc<FakeStrip>) -> CommandRouter<FakeStrip> {
        CommandRouter::new(
            OutletDispatcher::new(Arc::clone(strip)),
            CommandTopic::default(),
        )
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[tokio::test]
    async fn route_toggle_with_index() {
        let strip = Arc::new(FakeStrip::hs300());
        strip.set_state(2, true);

        router(&strip)
            .route("hs300/command/toggle/2", Map::new())
            .await
            .unwrap();

        assert_eq!(
            strip.calls(),
            vec![DeviceCall::IsOn(2), DeviceCall::TurnOff(2)]
        );
    }

    #[tokio::test]
    async fn route_toggle_with_status_payload() {
        let strip = Arc::new(FakeStrip::hs300());
        strip.set_state(5, true);

        router(&strip)
            .route("hs300/command/toggle/5", object(json!({"status": "on"})))
            .await
            .unwrap();

        assert_eq!(strip.calls(), vec![DeviceCall::TurnOn(5)]);
    }

    #[tokio::test]
    async fn route_on_without_index_uses_default_outlet() {
        let strip = Arc::new(FakeStrip::hs300());

        router(&strip)
            .route("hs300/command/on", Map::new())
            .await
            .unwrap();

        assert_eq!(
            strip.calls(),
            vec![DeviceCall::TurnOn(CommandTopic::DEFAULT_OUTLET)]
        );
    }

    #[tokio::test]
    async fn unknown_verb_does_not_touch_device() {
        let strip = Arc::new(FakeStrip::hs300());

        let err = router(&strip)
            .route("hs300/command/blink/1", Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownCommand(_)));
        assert!(strip.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_topic_does_not_touch_device() {
        let strip = Arc::new(FakeStrip::hs300());

        let err = router(&strip)
            .route("hs300/command/on/one", Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedTopic(_)));
        assert!(strip.calls().is_empty());
    }

    #[tokio::test]
    async fn unexpected_arguments_are_invalid_payload() {
        let strip = Arc::new(FakeStrip::hs300());
        let router = router(&strip);

        let err = router
            .route("hs300/command/on/1", object(json!({"status": "on"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidPayload");

        let err = router
            .route("hs300/command/toggle/1", object(json!({"delay": 10})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidPayload");

        assert!(strip.calls().is_empty());
    }

    #[tokio::test]
    async fn refresh_required_updates_first() {
        let strip = Arc::new(FakeStrip::hs300());
        let command = Command::new(Verb::TurnOff, Target::Outlet(3));

        router(&strip).execute(&command, true).await.unwrap();

        assert_eq!(
            strip.calls(),
            vec![DeviceCall::Update, DeviceCall::TurnOff(3)]
        );
    }

    #[tokio::test]
    async fn no_verb_refreshes_by_default() {
        let strip = Arc::new(FakeStrip::hs300());
        let router = router(&strip);

        for verb in Verb::ALL {
            router
                .execute(&Command::new(verb, Target::Outlet(1)), false)
                .await
                .unwrap();
        }
        assert!(!strip.calls().contains(&DeviceCall::Update));
    }

    #[tokio::test]
    async fn refresh_verbs_hook() {
        let strip = Arc::new(FakeStrip::hs300());
        let router = router(&strip).with_refresh_verbs([Verb::Toggle]);

        router
            .execute(&Command::new(Verb::Toggle, Target::Outlet(1)), false)
            .await
            .unwrap();

        assert_eq!(strip.calls()[0], DeviceCall::Update);
    }

    #[tokio::test]
    async fn dispatcher_errors_propagate_unchanged() {
        let strip = Arc::new(FakeStrip::hs300());

        let err = router(&strip)
            .route("hs300/command/toggle/9", Map::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidOutlet {
                index: 9,
                min: 1,
                max: 6
            }
        ));
    }
}
