// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kasa smart-home TCP protocol.
//!
//! Each request opens a TCP connection to port 9999 and sends one frame: a
//! 4-byte big-endian length followed by the JSON request obfuscated with an
//! XOR autokey cipher (initial key 171). The response uses the same framing.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::DeviceError;

/// Initial key of the autokey cipher.
const INITIAL_KEY: u8 = 171;

/// Upper bound for a response frame; larger lengths are treated as corrupt.
const MAX_FRAME_LEN: usize = 1 << 20;

/// Connection parameters for a Kasa strip.
///
/// # Examples
///
/// ```
/// use hs300_bridge::protocol::KasaConfig;
/// use std::time::Duration;
///
/// let config = KasaConfig::new("192.168.0.215").with_timeout(Duration::from_secs(3));
/// assert_eq!(config.port(), 9999);
/// assert_eq!(config.address(), "192.168.0.215:9999");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KasaConfig {
    host: String,
    port: u16,
    timeout: Duration,
}

impl KasaConfig {
    /// Default Kasa TCP port.
    pub const DEFAULT_PORT: u16 = 9999;
    /// Default per-request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration for the strip at `host`.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets a custom port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Encrypts a request and prepends the length header.
#[must_use]
pub fn encode_frame(plain: &[u8]) -> Vec<u8> {
    // Frames never come near u32::MAX; requests are a few hundred bytes.
    #[allow(clippy::cast_possible_truncation)]
    let len = plain.len() as u32;

    let mut frame = Vec::with_capacity(plain.len() + 4);
    frame.extend_from_slice(&len.to_be_bytes());

    let mut key = INITIAL_KEY;
    for &byte in plain {
        key ^= byte;
        frame.push(key);
    }
    frame
}

/// Decrypts a frame body (without the length header).
#[must_use]
pub fn decrypt(cipher: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    cipher
        .iter()
        .map(|&byte| {
            let plain = key ^ byte;
            key = byte;
            plain
        })
        .collect()
}

/// Client for the Kasa TCP protocol.
///
/// Requests are serialized: the strip handles one connection at a time
/// reliably, so concurrent callers queue on an internal lock.
#[derive(Debug)]
pub struct KasaClient {
    config: KasaConfig,
    io_lock: Mutex<()>,
}

impl KasaClient {
    /// Creates a client. No connection is made until the first request.
    #[must_use]
    pub fn new(config: KasaConfig) -> Self {
        Self {
            config,
            io_lock: Mutex::new(()),
        }
    }

    /// Returns the connection parameters.
    #[must_use]
    pub fn config(&self) -> &KasaConfig {
        &self.config
    }

    /// Sends a JSON request and returns the decoded JSON response.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Timeout`] if the exchange exceeds the configured
    /// timeout, [`DeviceError::Io`] on network failure, and
    /// [`DeviceError::Protocol`] or [`DeviceError::Json`] on a bad response.
    pub async fn request(&self, request: &Value) -> Result<Value, DeviceError> {
        let body = serde_json::to_vec(request)?;
        let frame = encode_frame(&body);

        let _guard = self.io_lock.lock().await;
        tracing::debug!(host = %self.config.host, request = %request, "Sending Kasa request");

        let timeout = self.config.timeout;
        let response = tokio::time::timeout(timeout, self.exchange(&frame))
            .await
            .map_err(|_| {
                // Timeouts are configured in seconds; they fit in u64 milliseconds.
                #[allow(clippy::cast_possible_truncation)]
                let timeout_ms = timeout.as_millis() as u64;
                DeviceError::Timeout(timeout_ms)
            })??;

        let value: Value = serde_json::from_slice(&decrypt(&response))?;
        tracing::trace!(host = %self.config.host, response = %value, "Received Kasa response");
        Ok(value)
    }

    /// Writes one frame and reads one frame back.
    async fn exchange(&self, frame: &[u8]) -> Result<Vec<u8>, DeviceError> {
        let io_error = |source| DeviceError::Io {
            host: self.config.host.clone(),
            source,
        };

        let mut stream = TcpStream::connect(self.config.address())
            .await
            .map_err(io_error)?;
        stream.write_all(frame).await.map_err(io_error)?;

        let len = stream.read_u32().await.map_err(io_error)? as usize;
        if len > MAX_FRAME_LEN {
            return Err(DeviceError::Protocol(format!(
                "response frame of {len} bytes exceeds {MAX_FRAME_LEN}"
            )));
        }

        let mut body = vec![0; len];
        stream.read_exact(&mut body).await.map_err(io_error)?;
        Ok(body)
    }
}
