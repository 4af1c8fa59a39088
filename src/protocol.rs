use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::types::{Change, FanMode, HvacMode, PhysicalUnit, SwingMode, Temperature};

/// Body of a full group-state fetch. The controller expects the JSON
/// wrapped in a `=`-prefixed form field.
pub(crate) fn group_data_request() -> String {
    r#"={"GetReqGroupData":{"FloorNo":["1"]}}"#.to_string()
}

pub(crate) fn command_body(payload: &Value) -> String {
    format!("={payload}")
}

/// One `GroupData` record as the controller reports it. Everything is a
/// string on the wire; absent readings come through as `"--"` or empty.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawUnit {
    #[serde(rename = "GroupNo")]
    pub group_no: String,
    #[serde(rename = "GroupName", default)]
    pub group_name: String,
    #[serde(rename = "Drive", default)]
    pub drive: String,
    #[serde(rename = "Mode", default)]
    pub mode: String,
    #[serde(rename = "InletTemp", default)]
    pub inlet_temp: String,
    #[serde(rename = "SetTemp", default)]
    pub set_temp: String,
    #[serde(rename = "FanSpeed", default)]
    pub fan_speed: String,
    #[serde(rename = "AirDirection", default)]
    pub air_direction: String,
    #[serde(rename = "FilterSign", default)]
    pub filter_sign: String,
    #[serde(rename = "RcProhibition", default)]
    pub rc_prohibition: String,
}

impl RawUnit {
    pub fn into_unit(self) -> PhysicalUnit {
        PhysicalUnit {
            hvac_mode: HvacMode::from_vendor(&self.drive, &self.mode),
            fan_mode: FanMode::from_vendor_code(&self.fan_speed),
            swing_mode: SwingMode::from_vendor_code(&self.air_direction),
            current_temperature: parse_temp(&self.inlet_temp),
            target_temperature: parse_temp(&self.set_temp),
            filter_signaled: self.filter_sign == "1",
            remote_locked: self.rc_prohibition == "1",
            id: self.group_no,
            name: self.group_name,
            stale: false,
        }
    }
}

fn parse_temp(raw: &str) -> Option<Temperature> {
    match raw {
        "" | "--" => None,
        s => s.parse::<f64>().ok().map(Temperature::from_celsius),
    }
}

/// Parse a group-list response into raw unit records.
///
/// A `FloorNo` of `"-1"` is the controller's way of reporting an expired
/// session; surfaced as `Error::SessionExpired` so the caller can
/// re-authenticate and retry.
pub(crate) fn parse_group_data(body: &str) -> Result<Vec<RawUnit>> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| Error::Protocol(format!("invalid group list JSON: {e}")))?;
    let floor = parsed
        .pointer("/GetResGroupData/FloorData/0")
        .ok_or_else(|| Error::Protocol("missing FloorData".to_string()))?;
    if floor.get("FloorNo").and_then(|v| v.as_str()) == Some("-1") {
        return Err(Error::SessionExpired);
    }
    let groups = match floor.get("GroupData") {
        Some(Value::Array(groups)) => groups,
        _ => return Ok(Vec::new()),
    };
    groups
        .iter()
        .map(|g| {
            serde_json::from_value(g.clone())
                .map_err(|e| Error::Protocol(format!("bad group record: {e}")))
        })
        .collect()
}

/// Build the `SetReqChangeGroup` payload for one unit.
pub(crate) fn change_group_payload(unit_id: &str, change: &Change) -> Value {
    let mut props = match change {
        Change::HvacMode(mode) => match mode.vendor_mode_code() {
            Some(code) => json!({ "Drive": "1", "Mode": code }),
            None => json!({ "Drive": "0" }),
        },
        Change::FanMode(mode) => json!({ "FanSpeed": mode.as_vendor_code() }),
        Change::SwingMode(mode) => json!({ "AirDirection": mode.as_vendor_code() }),
        Change::TargetTemperature(t) => {
            json!({ "SetTemp": format!("{:.1}", t.to_vendor_celsius()) })
        }
    };
    props["GroupNo"] = Value::String(unit_id.to_string());
    json!({ "SetReqChangeGroup": props })
}

/// Interpret a command response. An empty body means the session cookie
/// has expired; an `ErrorData` object is a vendor-side rejection.
pub(crate) fn parse_command_ack(unit_id: &str, body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::SessionExpired);
    }
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| Error::Protocol(format!("invalid command ack: {e}")))?;
    if let Some(err) = parsed.get("ErrorData") {
        let code = err
            .get("ErrorNo")
            .and_then(|v| v.as_str())
            .unwrap_or("unspecified");
        return Err(Error::Rejected {
            unit_id: unit_id.to_string(),
            reason: format!("controller error {code}"),
        });
    }
    if parsed.get("SetResChangeGroup").is_some() {
        return Ok(());
    }
    Err(Error::Protocol("unrecognized command ack".to_string()))
}
