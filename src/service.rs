// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process lifecycle: wiring, supervision and shutdown.
//!
//! [`run`] owns the real transport and strip connection. The work between
//! startup and shutdown is done by a [`Supervisor`], which takes its strip
//! and bus as arguments.

use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;

use crate::bridge::{CommandIntake, Inbound, MessageBridge};
use crate::command::CommandTopic;
use crate::config::BridgeConfig;
use crate::controller::{CommandRouter, OutletDispatcher};
use crate::device::{KasaStrip, PowerStrip};
use crate::error::{Result, TransportError};
use crate::protocol::{Bus, MqttTransport};
use crate::report::ErrorReporter;
use crate::telemetry::{PollerConfig, TelemetryPoller};

const LOCATION: &str = "service.run";

/// Runs the bridge until a termination signal or a fatal error.
///
/// Starts the MQTT transport thread and waits for the broker's first
/// acknowledgement, then runs a [`Supervisor`] on a [`LocalSet`] of the
/// current runtime. The transport thread is joined before this returns.
///
/// # Errors
///
/// Returns [`Error::Transport`](crate::Error::Transport) if the transport
/// cannot be started, or the poller's failure if it could not be reported
/// because the bus was disconnected.
pub async fn run(config: BridgeConfig) -> Result<()> {
    LocalSet::new()
        .run_until(serve(config, shutdown_signal()))
        .await
}

async fn serve<F>(config: BridgeConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = &'static str>,
{
    let topics = config.command_topic();
    tracing::info!(
        broker = %format!("{}:{}", config.mqtt.host(), config.mqtt.port()),
        device = %config.device.address(),
        subscription = %topics.subscription(),
        "Starting HS300 bridge"
    );

    let (bridge, rx) = MessageBridge::channel();
    let (mut transport, bus) = MqttTransport::start(&config.mqtt, topics.subscription(), bridge)?;
    // Failures before the first ConnAck would otherwise find the bus down.
    if let Err(e) = transport.wait_connected().await {
        tracing::warn!(error = %e, "Continuing without a broker connection");
    }

    let strip = Arc::new(KasaStrip::new(config.device.clone()));
    let outcome = Supervisor::new(strip, Arc::new(bus), topics, config.poll)
        .run(rx, shutdown)
        .await;

    match tokio::task::spawn_blocking(move || transport.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "MQTT transport did not stop cleanly"),
        Err(e) => tracing::warn!(
            error = %TransportError::Thread(e.to_string()),
            "MQTT transport shutdown task failed"
        ),
    }

    tracing::info!("Exited");
    outcome
}

/// Runs the command intake and the telemetry poller over one strip and bus.
pub struct Supervisor<S> {
    strip: Arc<S>,
    bus: Arc<dyn Bus>,
    topics: CommandTopic,
    poll: PollerConfig,
}

impl<S> std::fmt::Debug for Supervisor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("topics", &self.topics)
            .field("poll", &self.poll)
            .finish_non_exhaustive()
    }
}

impl<S: PowerStrip + 'static> Supervisor<S> {
    /// Creates a supervisor publishing under `topics`' namespace.
    #[must_use]
    pub fn new(
        strip: Arc<S>,
        bus: Arc<dyn Bus>,
        topics: CommandTopic,
        poll: PollerConfig,
    ) -> Self {
        Self {
            strip,
            bus,
            topics,
            poll,
        }
    }

    /// Runs until `shutdown` resolves or the poller fails with an error that
    /// could not be reported.
    ///
    /// Refreshes the strip once, then consumes `inbound` and polls telemetry
    /// concurrently. On the way out no new message is accepted and in-flight
    /// commands complete before this returns. Must run inside a
    /// [`LocalSet`].
    ///
    /// # Errors
    ///
    /// Returns the poller's failure if the bus was disconnected when it
    /// happened.
    pub async fn run<F>(
        self,
        inbound: mpsc::UnboundedReceiver<Inbound>,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = &'static str>,
    {
        let namespace = self.topics.namespace().to_string();
        let reporter = ErrorReporter::new(Arc::clone(&self.bus), &namespace);

        // Outlets are unknown until the first refresh.
        if let Err(e) = self.strip.update().await {
            tracing::warn!(error = %e, "Initial strip refresh failed");
        }

        let dispatcher = OutletDispatcher::new(Arc::clone(&self.strip));
        let router = CommandRouter::new(dispatcher, self.topics);
        let (stop_tx, stop_rx) = oneshot::channel();
        let intake = tokio::task::spawn_local(
            CommandIntake::new(inbound, Rc::new(router), reporter.clone()).run(stop_rx),
        );

        let poller = TelemetryPoller::new(
            self.strip,
            self.bus,
            reporter.clone(),
            &namespace,
            self.poll,
        );

        let outcome = tokio::select! {
            error = poller.run() => {
                // Already logged by the reporter; publish only if the bus is back.
                if reporter.is_connected() && reporter.publish(&error, LOCATION).is_ok() {
                    tracing::info!("Fatal error published");
                }
                Err(error)
            }
            signal = shutdown => {
                tracing::info!(signal, "Shutdown requested");
                Ok(())
            }
        };

        if stop_tx.send(()).is_err() {
            tracing::debug!("Command intake already stopped");
        }
        if let Err(e) = intake.await {
            tracing::error!(error = %e, "Command intake failed");
        }
        outcome
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix, and names the signal.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}
