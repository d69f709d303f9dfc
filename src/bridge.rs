// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handoff of inbound messages from the transport thread to the runtime.
//!
//! The MQTT connection is driven on its own thread. [`MessageBridge`] runs
//! there and only decodes the payload and pushes it onto an unbounded
//! channel, so the transport is never blocked by command execution.
//! [`CommandIntake`] owns the receiving end inside the runtime and spawns
//! one local task per message.
//!
//! ```text
//! mqtt-transport thread          runtime (LocalSet)
//! ─────────────────────          ──────────────────
//! MessageBridge::on_message
//!   decode_payload ──Inbound──▶ CommandIntake::run
//!                                 └─ spawn_local(handle_message)
//!                                      ├─ CommandRouter::route
//!                                      └─ ErrorReporter::report
//! ```

use std::rc::Rc;

use rumqttc::{Publish, QoS};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use crate::command::decode_payload;
use crate::controller::CommandRouter;
use crate::device::PowerStrip;
use crate::error::Error;
use crate::protocol::MessageHandler;
use crate::report::ErrorReporter;

const LOCATION: &str = "command_intake.handle_message";

/// A message handed from the transport thread to the runtime.
#[derive(Debug)]
pub enum Inbound {
    /// A message whose payload decoded into named arguments.
    Message {
        /// The topic the message arrived on.
        topic: String,
        /// The decoded arguments.
        payload: Map<String, Value>,
    },
    /// A message whose payload could not be decoded.
    Undecodable {
        /// The topic the message arrived on.
        topic: String,
        /// The decoding failure.
        error: Error,
    },
}

/// Sending half of the handoff, run by the transport thread.
#[derive(Debug, Clone)]
pub struct MessageBridge {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl MessageBridge {
    /// Creates a bridge and the receiver to hand to [`CommandIntake`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Decodes and enqueues one message. Never blocks.
    ///
    /// Returns `false` if the intake has stopped and the message was dropped.
    pub fn submit(&self, topic: &str, payload: &[u8], qos: QoS) -> bool {
        tracing::info!(
            payload = %String::from_utf8_lossy(payload),
            topic,
            ?qos,
            "Received message"
        );

        let inbound = match decode_payload(payload) {
            Ok(payload) => Inbound::Message {
                topic: topic.to_string(),
                payload,
            },
            Err(e) => Inbound::Undecodable {
                topic: topic.to_string(),
                error: e.into(),
            },
        };

        if self.tx.send(inbound).is_err() {
            tracing::debug!(topic, "Command intake stopped, message dropped");
            return false;
        }
        true
    }
}

impl MessageHandler for MessageBridge {
    fn on_message(&self, publish: &Publish) {
        self.submit(&publish.topic, &publish.payload, publish.qos);
    }
}

/// Receiving half of the handoff.
///
/// Must run inside a [`tokio::task::LocalSet`].
pub struct CommandIntake<S> {
    rx: mpsc::UnboundedReceiver<Inbound>,
    router: Rc<CommandRouter<S>>,
    reporter: ErrorReporter,
    tasks: JoinSet<()>,
}

impl<S> std::fmt::Debug for CommandIntake<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandIntake")
            .field("in_flight", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl<S: PowerStrip + 'static> CommandIntake<S> {
    /// Creates an intake reading from `rx`.
    #[must_use]
    pub fn new(
        rx: mpsc::UnboundedReceiver<Inbound>,
        router: Rc<CommandRouter<S>>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            rx,
            router,
            reporter,
            tasks: JoinSet::new(),
        }
    }

    /// Spawns a task per inbound message until `stop` fires or every
    /// [`MessageBridge`] is dropped.
    ///
    /// On exit no new message is accepted; messages already queued are
    /// dropped and in-flight commands run to completion.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut stop => break,
                inbound = self.rx.recv() => match inbound {
                    Some(inbound) => {
                        let router = Rc::clone(&self.router);
                        let reporter = self.reporter.clone();
                        self.tasks.spawn_local(handle_message(router, reporter, inbound));
                    }
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Command task failed");
                    }
                }
            }
        }

        self.rx.close();
        let mut dropped = 0_usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(dropped, "Dropped queued commands on shutdown");
        }

        tracing::debug!(in_flight = self.tasks.len(), "Draining command tasks");
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Command task failed");
            }
        }
        tracing::info!("Command intake stopped");
    }
}

async fn handle_message<S: PowerStrip>(
    router: Rc<CommandRouter<S>>,
    reporter: ErrorReporter,
    inbound: Inbound,
) {
    let (topic, result) = match inbound {
        Inbound::Message { topic, payload } => {
            let result = router.route(&topic, payload).await;
            (topic, result)
        }
        Inbound::Undecodable { topic, error } => {
            // A bad topic takes precedence over a bad payload.
            let result = router.topics().parse(&topic).and(Err(error));
            (topic, result)
        }
    };

    match result {
        Ok(()) => tracing::debug!(%topic, "Command completed"),
        Err(Error::MalformedTopic(reason)) => {
            tracing::warn!(%topic, %reason, "Ignoring message on malformed topic");
        }
        Err(error) => {
            if let Err(error) = reporter.report(error, LOCATION) {
                tracing::error!(
                    %topic,
                    kind = error.kind(),
                    error = %error,
                    "Command failed and could not be reported"
                );
            }
        }
    }
}
