// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport running on its own thread.
//!
//! The transport drives a synchronous `rumqttc` connection on a dedicated OS
//! thread. Inbound publishes are handed to a [`MessageHandler`] on that
//! thread; everything else in the bridge talks to the broker through the
//! [`Bus`] handle, which only enqueues requests and never waits on the
//! network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use rumqttc::{
    Client, ConnectReturnCode, Connection, Event, MqttOptions, Outgoing, Packet, Publish, QoS,
    SubscribeReasonCode,
};
use tokio::sync::oneshot;

use crate::error::TransportError;

/// Pause after a connection error before the next reconnect attempt.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Capacity of the client request queue.
const REQUEST_CAPACITY: usize = 64;

/// Publishing side of the message bus.
pub trait Bus: Send + Sync {
    /// Returns whether the transport currently has a broker connection.
    fn is_connected(&self) -> bool;

    /// Publishes `payload` on `topic` at QoS 0 without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request cannot be queued.
    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError>;
}

/// Receives inbound publishes on the transport thread.
///
/// Implementations must return quickly and must not block: the transport
/// cannot process keep-alives while the handler runs.
pub trait MessageHandler: Send + 'static {
    /// Called once per inbound publish.
    fn on_message(&self, publish: &Publish);
}

/// Configuration for the broker connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connect_timeout: Duration,
    client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            credentials: None,
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            client_id: format!("hs300_bridge_{}", std::process::id()),
        }
    }
}

impl MqttConfig {
    /// Default broker host.
    pub const DEFAULT_HOST: &'static str = "localhost";
    /// Default broker port.
    pub const DEFAULT_PORT: u16 = 1883;
    /// Default keep-alive interval.
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
    /// Default wait for the first connection acknowledgement.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the broker at `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Sets the broker port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets how long [`MqttTransport::wait_connected`] waits for the broker.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the client identifier.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns whether credentials are configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the connection acknowledgement timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        options
    }
}

/// Cloneable publishing handle backed by the transport's client.
#[derive(Clone)]
pub struct MqttBus {
    client: Client,
    connected: Arc<AtomicBool>,
}

impl std::fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBus")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Bus for MqttBus {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn publish(&self, topic: &str, payload: String) -> Result<(), TransportError> {
        tracing::debug!(topic = %topic, payload = %payload, "Publishing MQTT message");
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(TransportError::Mqtt)
    }
}

/// Owner of the transport thread.
///
/// Dropping the transport without calling [`shutdown`](MqttTransport::shutdown)
/// leaves the thread running until the process exits.
pub struct MqttTransport {
    client: Client,
    shutdown: Arc<AtomicBool>,
    connack: Option<oneshot::Receiver<()>>,
    connect_timeout: Duration,
    thread: JoinHandle<()>,
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("thread", &self.thread.thread().name())
            .field("stopping", &self.shutdown.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl MqttTransport {
    /// Starts the transport thread.
    ///
    /// The thread connects to the broker, subscribes to `subscription` at
    /// QoS 0 after every successful connect, and passes inbound publishes to
    /// `handler`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Thread`] if the thread cannot be spawned.
    pub fn start<H: MessageHandler>(
        config: &MqttConfig,
        subscription: String,
        handler: H,
    ) -> Result<(Self, MqttBus), TransportError> {
        let (client, connection) = Client::new(config.options(), REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        // Signals the first successful ConnAck
        let (connack_tx, connack_rx) = oneshot::channel();

        let driver = ConnectionDriver {
            client: client.clone(),
            connected: Arc::clone(&connected),
            shutdown: Arc::clone(&shutdown),
            connack: Some(connack_tx),
            subscription,
            handler,
        };

        let thread = std::thread::Builder::new()
            .name("mqtt-transport".to_string())
            .spawn(move || driver.run(connection))
            .map_err(|e| TransportError::Thread(e.to_string()))?;

        tracing::info!(
            host = %config.host,
            port = %config.port,
            "MQTT transport started"
        );

        let bus = MqttBus {
            client: client.clone(),
            connected,
        };
        Ok((
            Self {
                client,
                shutdown,
                connack: Some(connack_rx),
                connect_timeout: config.connect_timeout,
                thread,
            },
            bus,
        ))
    }

    /// Waits for the broker to acknowledge the first connection.
    ///
    /// Returns immediately once the first acknowledgement has been observed
    /// by an earlier call. Reconnects after that are not awaited.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectTimeout`] if no acknowledgement
    /// arrives within the configured connect timeout, or
    /// [`TransportError::Thread`] if the transport thread exited first.
    pub async fn wait_connected(&mut self) -> Result<(), TransportError> {
        let Some(connack) = self.connack.as_mut() else {
            return Ok(());
        };

        match tokio::time::timeout(self.connect_timeout, connack).await {
            Ok(Ok(())) => {
                self.connack = None;
                Ok(())
            }
            Ok(Err(_)) => {
                self.connack = None;
                Err(TransportError::Thread(
                    "transport thread exited before connecting".to_string(),
                ))
            }
            Err(_) => Err(TransportError::ConnectTimeout(self.connect_timeout)),
        }
    }

    /// Disconnects from the broker and joins the transport thread.
    ///
    /// This blocks until the thread exits.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Thread`] if the thread panicked.
    pub fn shutdown(self) -> Result<(), TransportError> {
        tracing::info!("Stopping MQTT transport");
        self.shutdown.store(true, Ordering::Release);

        // Without a broker connection the loop exits on its next connect error.
        if let Err(e) = self.client.disconnect() {
            tracing::debug!(error = %e, "Disconnect request not queued");
        }

        self.thread
            .join()
            .map_err(|_| TransportError::Thread("transport thread panicked".to_string()))
    }
}

/// State moved onto the transport thread.
struct ConnectionDriver<H> {
    client: Client,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    connack: Option<oneshot::Sender<()>>,
    subscription: String,
    handler: H,
}

impl<H: MessageHandler> ConnectionDriver<H> {
    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn run(mut self, mut connection: Connection) {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    if connack.code == ConnectReturnCode::Success {
                        tracing::info!(code = ?connack.code, "Connected to MQTT broker");
                        self.connected.store(true, Ordering::Release);
                        if let Some(connack) = self.connack.take() {
                            // The receiver may already be gone.
                            let _ = connack.send(());
                        }
                        if let Err(e) = self
                            .client
                            .try_subscribe(self.subscription.as_str(), QoS::AtMostOnce)
                        {
                            tracing::error!(error = %e, topic = %self.subscription, "Failed to subscribe");
                        }
                    } else {
                        tracing::warn!(code = ?connack.code, "MQTT broker refused connection");
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    // Only one filter is subscribed, so one return code.
                    match suback.return_codes.first() {
                        Some(SubscribeReasonCode::Success(qos)) => {
                            tracing::info!(?qos, topic = %self.subscription, "Broker granted subscription");
                        }
                        other => {
                            tracing::warn!(code = ?other, topic = %self.subscription, "Broker rejected subscription");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.handler.on_message(&publish);
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::info!("MQTT broker disconnected");
                    self.connected.store(false, Ordering::Release);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    self.connected.store(false, Ordering::Release);
                    if self.stopping() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::Release);
                    if self.stopping() {
                        tracing::debug!(error = %e, "MQTT connection closed during shutdown");
                        break;
                    }
                    tracing::error!(error = %e, "MQTT connection error, reconnecting");
                    std::thread::sleep(RECONNECT_DELAY);
                }
            }
        }
        self.connected.store(false, Ordering::Release);
        tracing::info!("MQTT transport stopped");
    }
}
