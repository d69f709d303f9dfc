// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire protocols spoken by the bridge.
//!
//! # Protocols
//!
//! - [`KasaClient`]: framed, XOR-obfuscated JSON over TCP to the strip
//! - [`MqttTransport`]: the broker connection, driven on its own thread,
//!   with [`MqttBus`] as the publishing handle

mod kasa;
mod mqtt;

pub use kasa::{KasaClient, KasaConfig, decrypt, encode_frame};
pub use mqtt::{Bus, MessageHandler, MqttBus, MqttConfig, MqttTransport};
