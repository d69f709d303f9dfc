// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kasa HS300 strip driver.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::device::{EmeterReading, OutletTelemetry, PowerStrip, StripTelemetry};
use crate::error::DeviceError;
use crate::protocol::{KasaClient, KasaConfig};
use crate::types::PowerState;

/// A Kasa multi-outlet strip.
///
/// The outlet list is learned from `system.get_sysinfo`; until the first
/// successful [`update`](PowerStrip::update) the strip reports zero outlets.
#[derive(Debug)]
pub struct KasaStrip {
    client: KasaClient,
    state: RwLock<StripState>,
}

#[derive(Debug, Default)]
struct StripState {
    alias: String,
    children: Vec<ChildState>,
    refreshed: bool,
}

#[derive(Debug, Clone)]
struct ChildState {
    id: String,
    alias: String,
    is_on: bool,
    emeter: EmeterReading,
}

#[derive(Debug, Deserialize)]
struct SysInfo {
    #[serde(default)]
    alias: String,
    #[serde(default)]
    children: Vec<ChildInfo>,
}

#[derive(Debug, Deserialize)]
struct ChildInfo {
    id: String,
    #[serde(default)]
    alias: String,
    state: u8,
}

/// Realtime emeter answer; firmware versions report either milli-units or units.
#[derive(Debug, Default, Deserialize)]
struct RawEmeter {
    voltage_mv: Option<f64>,
    voltage: Option<f64>,
    current_ma: Option<f64>,
    current: Option<f64>,
    power_mw: Option<f64>,
    power: Option<f64>,
    total_wh: Option<f64>,
    /// kWh
    total: Option<f64>,
}

impl From<RawEmeter> for EmeterReading {
    fn from(raw: RawEmeter) -> Self {
        let pick = |milli: Option<f64>, unit: Option<f64>| {
            milli.map(|v| v / 1000.0).or(unit).unwrap_or_default()
        };
        Self {
            voltage: pick(raw.voltage_mv, raw.voltage),
            current: pick(raw.current_ma, raw.current),
            power: pick(raw.power_mw, raw.power),
            total_wh: raw
                .total_wh
                .or(raw.total.map(|kwh| kwh * 1000.0))
                .unwrap_or_default(),
        }
    }
}

impl KasaStrip {
    /// Creates a strip handle. No request is made until it is used.
    #[must_use]
    pub fn new(config: KasaConfig) -> Self {
        Self {
            client: KasaClient::new(config),
            state: RwLock::new(StripState::default()),
        }
    }

    /// Returns the connection parameters.
    #[must_use]
    pub fn config(&self) -> &KasaConfig {
        self.client.config()
    }

    /// Sends `module.method` with `params`, optionally scoped to one child,
    /// and returns the method's result object.
    async fn call(
        &self,
        child_id: Option<&str>,
        module: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, DeviceError> {
        let mut request = json!({ module: { method: params } });
        if let Some(id) = child_id {
            request["context"] = json!({ "child_ids": [id] });
        }

        let mut response = self.client.request(&request).await?;
        let result = response
            .get_mut(module)
            .and_then(|m| m.get_mut(method))
            .map(Value::take)
            .ok_or_else(|| {
                DeviceError::Protocol(format!("response is missing {module}.{method}"))
            })?;

        check_err_code(&result, module, method)?;
        Ok(result)
    }

    async fn sysinfo(&self) -> Result<SysInfo, DeviceError> {
        let value = self.call(None, "system", "get_sysinfo", json!({})).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn realtime(&self, child_id: &str) -> Result<EmeterReading, DeviceError> {
        let value = self
            .call(Some(child_id), "emeter", "get_realtime", json!({}))
            .await?;
        let raw: RawEmeter = serde_json::from_value(value)?;
        Ok(raw.into())
    }

    /// Merges a sysinfo answer into the cached state, keeping known readings.
    fn apply_sysinfo(&self, info: SysInfo) {
        let mut state = self.state.write();
        let children = info
            .children
            .into_iter()
            .map(|child| {
                let emeter = state
                    .children
                    .iter()
                    .find(|known| known.id == child.id)
                    .map(|known| known.emeter)
                    .unwrap_or_default();
                ChildState {
                    id: child.id,
                    alias: child.alias,
                    is_on: child.state != 0,
                    emeter,
                }
            })
            .collect();
        state.alias = info.alias;
        state.children = children;
    }

    fn child(&self, outlet: u32) -> Result<ChildState, DeviceError> {
        let state = self.state.read();
        outlet
            .checked_sub(1)
            .and_then(|i| state.children.get(i as usize))
            .cloned()
            .ok_or_else(|| {
                DeviceError::Protocol(format!(
                    "strip has no outlet {outlet} ({} known)",
                    state.children.len()
                ))
            })
    }

    /// Resolves an outlet to its child id, learning the outlet list first if needed.
    async fn child_id(&self, outlet: u32) -> Result<String, DeviceError> {
        if self.state.read().children.is_empty() {
            let info = self.sysinfo().await?;
            self.apply_sysinfo(info);
        }
        Ok(self.child(outlet)?.id)
    }

    async fn set_relay(&self, outlet: u32, power: PowerState) -> Result<(), DeviceError> {
        let id = self.child_id(outlet).await?;
        self.call(
            Some(&id),
            "system",
            "set_relay_state",
            json!({ "state": power.as_num() }),
        )
        .await?;

        tracing::info!(outlet, state = %power, "Outlet switched");
        if let Some(child) = self.state.write().children.iter_mut().find(|c| c.id == id) {
            child.is_on = power.is_on();
        }
        Ok(())
    }
}

impl PowerStrip for KasaStrip {
    fn outlet_count(&self) -> u32 {
        u32::try_from(self.state.read().children.len()).unwrap_or(u32::MAX)
    }

    async fn update(&self) -> Result<(), DeviceError> {
        let info = self.sysinfo().await?;
        self.apply_sysinfo(info);

        let ids: Vec<String> = self
            .state
            .read()
            .children
            .iter()
            .map(|c| c.id.clone())
            .collect();

        let mut readings = Vec::with_capacity(ids.len());
        for id in &ids {
            readings.push(self.realtime(id).await?);
        }

        let mut state = self.state.write();
        for (child, reading) in state.children.iter_mut().zip(readings) {
            child.emeter = reading;
        }
        state.refreshed = true;
        tracing::debug!(outlets = state.children.len(), "Strip state refreshed");
        Ok(())
    }

    async fn is_on(&self, outlet: u32) -> Result<bool, DeviceError> {
        let info = self.sysinfo().await?;
        self.apply_sysinfo(info);
        Ok(self.child(outlet)?.is_on)
    }

    async fn turn_on(&self, outlet: u32) -> Result<(), DeviceError> {
        self.set_relay(outlet, PowerState::On).await
    }

    async fn turn_off(&self, outlet: u32) -> Result<(), DeviceError> {
        self.set_relay(outlet, PowerState::Off).await
    }

    fn telemetry(&self) -> Result<StripTelemetry, DeviceError> {
        let state = self.state.read();
        if !state.refreshed {
            return Err(DeviceError::Protocol(
                "strip has not been refreshed yet".to_string(),
            ));
        }

        let outlets = (1..)
            .zip(&state.children)
            .map(|(index, child)| OutletTelemetry {
                index,
                name: child.alias.clone(),
                is_on: child.is_on,
                emeter: child.emeter,
            })
            .collect();

        Ok(StripTelemetry {
            name: state.alias.clone(),
            outlets,
        })
    }
}

/// Fails when a method result carries a non-zero `err_code`.
fn check_err_code(result: &Value, module: &str, method: &str) -> Result<(), DeviceError> {
    let code = result.get("err_code").and_then(Value::as_i64).unwrap_or(0);
    if code == 0 {
        return Ok(());
    }

    Err(DeviceError::Rejected {
        method: format!("{module}.{method}"),
        code,
        message: result
            .get("err_msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decrypt, encode_frame};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sysinfo(states: &[u8]) -> Value {
        let children: Vec<Value> = states
            .iter()
            .enumerate()
            .map(|(i, state)| json!({"id": format!("CHILD0{i}"), "alias": format!("Plug {}", i + 1), "state": state}))
            .collect();
        json!({"system": {"get_sysinfo": {"alias": "Office", "children": children, "err_code": 0}}})
    }

    /// Fake strip answering every request from `respond`, recording requests.
    async fn fake_strip<F>(respond: F) -> (KasaStrip, tokio::sync::mpsc::UnboundedReceiver<Value>)
    where
        F: Fn(&Value) -> Value + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let len = socket.read_u32().await.unwrap() as usize;
                let mut body = vec![0; len];
                socket.read_exact(&mut body).await.unwrap();
                let request: Value = serde_json::from_slice(&decrypt(&body)).unwrap();
                let response = respond(&request);
                let _ = tx.send(request);
                socket
                    .write_all(&encode_frame(response.to_string().as_bytes()))
                    .await
                    .unwrap();
            }
        });

        (
            KasaStrip::new(KasaConfig::new("127.0.0.1").with_port(port)),
            rx,
        )
    }

    #[test]
    fn raw_emeter_milli_units() {
        let raw: RawEmeter = serde_json::from_value(json!({
            "voltage_mv": 120_500, "current_ma": 250, "power_mw": 30_000, "total_wh": 42
        }))
        .unwrap();
        let reading = EmeterReading::from(raw);
        assert!((reading.voltage - 120.5).abs() < 1e-9);
        assert!((reading.current - 0.25).abs() < 1e-9);
        assert!((reading.power - 30.0).abs() < 1e-9);
        assert!((reading.total_wh - 42.0).abs() < 1e-9);
    }

    #[test]
    fn raw_emeter_units() {
        let raw: RawEmeter = serde_json::from_value(json!({
            "voltage": 230.0, "current": 0.1, "power": 23.0, "total": 1.5
        }))
        .unwrap();
        let reading = EmeterReading::from(raw);
        assert!((reading.voltage - 230.0).abs() < 1e-9);
        assert!((reading.total_wh - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn err_code_is_checked() {
        assert!(check_err_code(&json!({"err_code": 0}), "system", "get_sysinfo").is_ok());
        assert!(check_err_code(&json!({}), "system", "get_sysinfo").is_ok());
        let err = check_err_code(
            &json!({"err_code": -1, "err_msg": "module not support"}),
            "emeter",
            "get_realtime",
        )
        .unwrap_err();
        assert!(matches!(err, DeviceError::Rejected { code: -1, .. }));
    }

    #[tokio::test]
    async fn telemetry_requires_refresh() {
        let strip = KasaStrip::new(KasaConfig::new("127.0.0.1"));
        assert_eq!(strip.outlet_count(), 0);
        assert!(strip.telemetry().is_err());
    }

    #[tokio::test]
    async fn update_collects_outlets_and_readings() {
        let (strip, _requests) = fake_strip(|request| {
            if request.get("emeter").is_some() {
                json!({"emeter": {"get_realtime": {"voltage_mv": 120_000, "current_ma": 500, "power_mw": 60_000, "total_wh": 7, "err_code": 0}}})
            } else {
                sysinfo(&[1, 0, 1])
            }
        })
        .await;

        strip.update().await.unwrap();
        assert_eq!(strip.outlet_count(), 3);

        let telemetry = strip.telemetry().unwrap();
        assert_eq!(telemetry.name, "Office");
        assert_eq!(telemetry.outlets.len(), 3);
        assert_eq!(telemetry.outlets[1].index, 2);
        assert_eq!(telemetry.outlets[1].name, "Plug 2");
        assert!(!telemetry.outlets[1].is_on);
        assert!((telemetry.outlets[2].emeter.power - 60.0).abs() < 1e-9);
        assert!(telemetry.is_on());
    }

    #[tokio::test]
    async fn turn_on_targets_child_context() {
        let (strip, mut requests) = fake_strip(|request| {
            if request.get("context").is_some() {
                json!({"system": {"set_relay_state": {"err_code": 0}}})
            } else {
                sysinfo(&[0, 0])
            }
        })
        .await;

        strip.turn_on(2).await.unwrap();

        let first = requests.recv().await.unwrap();
        assert!(first["system"].get("get_sysinfo").is_some());
        let second = requests.recv().await.unwrap();
        assert_eq!(second["context"]["child_ids"], json!(["CHILD01"]));
        assert_eq!(second["system"]["set_relay_state"]["state"], 1);
    }

    #[tokio::test]
    async fn is_on_reads_live_state() {
        let (strip, _requests) = fake_strip(|_| sysinfo(&[0, 1])).await;
        assert!(!strip.is_on(1).await.unwrap());
        assert!(strip.is_on(2).await.unwrap());
        assert!(matches!(
            strip.is_on(3).await,
            Err(DeviceError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn rejected_relay_change_is_reported() {
        let (strip, _requests) = fake_strip(|request| {
            if request.get("context").is_some() {
                json!({"system": {"set_relay_state": {"err_code": -3, "err_msg": "invalid argument"}}})
            } else {
                sysinfo(&[1])
            }
        })
        .await;

        let err = strip.turn_off(1).await.unwrap_err();
        assert!(matches!(err, DeviceError::Rejected { code: -3, .. }), "{err:?}");
    }
}
