// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Process configuration read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `MQTT_HOST` | `localhost` |
//! | `MQTT_PORT` | `1883` |
//! | `MQTT_USERNAME`, `MQTT_PASSWORD` | unset |
//! | `MQTT_CONNECT_TIMEOUT_SECS` | `10` |
//! | `HS300_HOST` | required |
//! | `HS300_PORT` | `9999` |
//! | `HS300_DEFAULT_OUTLET` | `1` |
//! | `HS300_POLL_INTERVAL_SECS` | `5` |
//! | `HS300_FAILURE_PERIOD_SECS` | `60` |

use std::str::FromStr;
use std::time::Duration;

use crate::command::CommandTopic;
use crate::error::ConfigError;
use crate::protocol::{KasaConfig, MqttConfig};
use crate::telemetry::PollerConfig;

/// Everything the bridge needs to start.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Broker connection.
    pub mqtt: MqttConfig,
    /// Strip connection.
    pub device: KasaConfig,
    /// Topic namespace, `hs300`.
    pub namespace: String,
    /// Outlet addressed by command topics without an index.
    pub default_outlet: u32,
    /// Telemetry loop timing.
    pub poll: PollerConfig,
}

impl BridgeConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `HS300_HOST` is unset or a value does not
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if set.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `HS300_HOST` is unset or a value does not
    /// parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut mqtt = MqttConfig::new(
            var("MQTT_HOST").unwrap_or_else(|| MqttConfig::DEFAULT_HOST.to_string()),
        )
        .with_port(parse(&var, "MQTT_PORT", MqttConfig::DEFAULT_PORT)?)
        .with_connect_timeout(Duration::from_secs(parse(
            &var,
            "MQTT_CONNECT_TIMEOUT_SECS",
            MqttConfig::DEFAULT_CONNECT_TIMEOUT.as_secs(),
        )?));
        if let (Some(username), Some(password)) = (var("MQTT_USERNAME"), var("MQTT_PASSWORD")) {
            mqtt = mqtt.with_credentials(username, password);
        }

        let device = KasaConfig::new(var("HS300_HOST").ok_or(ConfigError::Missing("HS300_HOST"))?)
            .with_port(parse(&var, "HS300_PORT", KasaConfig::DEFAULT_PORT)?);

        let default_outlet = parse(&var, "HS300_DEFAULT_OUTLET", CommandTopic::DEFAULT_OUTLET)?;
        if default_outlet == 0 {
            return Err(ConfigError::Invalid {
                name: "HS300_DEFAULT_OUTLET",
                value: "0".to_string(),
            });
        }

        let defaults = PollerConfig::default();
        let interval = parse(
            &var,
            "HS300_POLL_INTERVAL_SECS",
            defaults.interval().as_secs(),
        )?;
        let failure_period = parse(
            &var,
            "HS300_FAILURE_PERIOD_SECS",
            defaults.failure_period().as_secs(),
        )?;
        let poll = defaults
            .with_interval(Duration::from_secs(interval))
            .with_failure_period(Duration::from_secs(failure_period));

        Ok(Self {
            mqtt,
            device,
            namespace: CommandTopic::DEFAULT_NAMESPACE.to_string(),
            default_outlet,
            poll,
        })
    }

    /// Returns the command topic parser for this configuration.
    #[must_use]
    pub fn command_topic(&self) -> CommandTopic {
        CommandTopic::new(self.namespace.clone()).with_default_outlet(self.default_outlet)
    }
}

fn parse<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<BridgeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        BridgeConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("HS300_HOST", "192.168.1.50")]).unwrap();

        assert_eq!(config.mqtt.host(), "localhost");
        assert_eq!(config.mqtt.port(), 1883);
        assert!(!config.mqtt.has_credentials());
        assert_eq!(config.device.host(), "192.168.1.50");
        assert_eq!(config.device.port(), 9999);
        assert_eq!(config.namespace, "hs300");
        assert_eq!(config.default_outlet, 1);
        assert_eq!(config.poll, PollerConfig::default());
        assert_eq!(config.command_topic().subscription(), "hs300/command/#");
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("MQTT_HOST", "broker.lan"),
            ("MQTT_PORT", "8883"),
            ("MQTT_USERNAME", "bridge"),
            ("MQTT_PASSWORD", "secret"),
            ("MQTT_CONNECT_TIMEOUT_SECS", "3"),
            ("HS300_HOST", "strip.lan"),
            ("HS300_PORT", "10000"),
            ("HS300_DEFAULT_OUTLET", "4"),
            ("HS300_POLL_INTERVAL_SECS", "10"),
            ("HS300_FAILURE_PERIOD_SECS", "120"),
        ])
        .unwrap();

        assert_eq!(config.mqtt.host(), "broker.lan");
        assert_eq!(config.mqtt.port(), 8883);
        assert!(config.mqtt.has_credentials());
        assert_eq!(config.mqtt.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.device.address(), "strip.lan:10000");
        assert_eq!(config.command_topic().default_outlet(), 4);
        assert_eq!(config.poll.cooldown(), Duration::from_secs(110));
    }

    #[test]
    fn missing_device_host() {
        assert_eq!(
            config(&[("MQTT_HOST", "broker.lan")]).unwrap_err(),
            ConfigError::Missing("HS300_HOST")
        );
        assert_eq!(
            config(&[("HS300_HOST", "  ")]).unwrap_err(),
            ConfigError::Missing("HS300_HOST")
        );
    }

    #[test]
    fn invalid_values() {
        assert_eq!(
            config(&[("HS300_HOST", "strip"), ("MQTT_PORT", "70000")]).unwrap_err(),
            ConfigError::Invalid {
                name: "MQTT_PORT",
                value: "70000".to_string()
            }
        );
        assert!(matches!(
            config(&[("HS300_HOST", "strip"), ("HS300_DEFAULT_OUTLET", "0")]),
            Err(ConfigError::Invalid {
                name: "HS300_DEFAULT_OUTLET",
                ..
            })
        ));
    }

    #[test]
    fn credentials_need_both_halves() {
        let config = config(&[("HS300_HOST", "strip"), ("MQTT_USERNAME", "bridge")]).unwrap();
        assert!(!config.mqtt.has_credentials());
    }
}
