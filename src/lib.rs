// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HS300 Bridge - connects a Kasa HS300 smart power strip to an MQTT bus.
//!
//! The bridge listens for commands on `hs300/command/<verb>[/<index>]`,
//! switches the strip's outlets accordingly, and publishes energy-meter
//! telemetry for the strip and each outlet on `hs300/emeter[/<index>]`.
//! Failures are published as JSON envelopes on `hs300/error`.
//!
//! # Topics
//!
//! | Topic | Direction | Payload |
//! |---|---|---|
//! | `hs300/command/toggle[/<index>]` | in | `{}` or `{"status": "on" \| "off"}` |
//! | `hs300/command/on[/<index>]` | in | `{}` |
//! | `hs300/command/off[/<index>]` | in | `{}` |
//! | `hs300/emeter` | out | strip aggregate [`TelemetryMessage`] |
//! | `hs300/emeter/<index>` | out | outlet [`TelemetryMessage`] |
//! | `hs300/error` | out | [`ErrorEnvelope`] |
//!
//! # Architecture
//!
//! The MQTT connection runs on a dedicated thread. Inbound messages are
//! handed to the async runtime through [`MessageBridge`] without blocking
//! the transport. Inside the runtime, each message becomes a task that
//! runs the [`CommandRouter`], while the [`TelemetryPoller`] publishes
//! readings on a fixed cadence.
//!
//! # Quick Start
//!
//! ```no_run
//! use hs300_bridge::{BridgeConfig, service};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::from_env()?;
//!     let runtime = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!     runtime.block_on(service::run(config))?;
//!     Ok(())
//! }
//! ```
//!
//! # Driving the strip directly
//!
//! ```no_run
//! use std::sync::Arc;
//! use hs300_bridge::{KasaConfig, KasaStrip, OutletDispatcher, PowerState, PowerStrip, Target};
//!
//! # async fn example() -> hs300_bridge::Result<()> {
//! let strip = Arc::new(KasaStrip::new(KasaConfig::new("192.168.1.50")));
//! strip.update().await?;
//!
//! let dispatcher = OutletDispatcher::new(strip);
//! dispatcher.toggle(Target::Outlet(2), None).await?;
//! dispatcher.toggle(Target::Outlet(3), Some(PowerState::Off)).await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod command;
mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod protocol;
pub mod report;
pub mod service;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod testing;

pub use bridge::{CommandIntake, Inbound, MessageBridge};
pub use command::{Command, CommandTopic, Verb};
pub use config::BridgeConfig;
pub use controller::{CommandRouter, OutletDispatcher};
pub use device::{EmeterReading, KasaStrip, OutletTelemetry, PowerStrip, StripTelemetry};
pub use error::{ConfigError, DeviceError, Error, PayloadError, Result, TransportError};
pub use protocol::{
    Bus, KasaClient, KasaConfig, MessageHandler, MqttBus, MqttConfig, MqttTransport,
};
pub use report::{ErrorEnvelope, ErrorReporter};
pub use service::Supervisor;
pub use telemetry::{PollState, PollerConfig, TelemetryMessage, TelemetryPoller};
pub use types::{PowerState, Target};
