use std::fmt;

use crate::error::{Error, Result};

/// Temperature stored as Celsius. The SC-SL reports and accepts Celsius
/// only; set-points move in 0.5 degree steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f64);

impl Temperature {
    pub fn from_celsius(c: f64) -> Self {
        Self(c)
    }

    pub fn celsius(&self) -> f64 {
        self.0
    }

    /// Round to the controller's set-point precision (0.5 increments).
    pub fn to_vendor_celsius(&self) -> f64 {
        (self.0 * 2.0).round() / 2.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}\u{00b0}C", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Off,
    Cool,
    Dry,
    FanOnly,
    Heat,
}

impl HvacMode {
    pub fn as_display_str(&self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Cool => "cool",
            HvacMode::Dry => "dry",
            HvacMode::FanOnly => "fan_only",
            HvacMode::Heat => "heat",
        }
    }

    pub fn from_display_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(HvacMode::Off),
            "cool" => Some(HvacMode::Cool),
            "dry" => Some(HvacMode::Dry),
            "fan_only" => Some(HvacMode::FanOnly),
            "heat" => Some(HvacMode::Heat),
            _ => None,
        }
    }

    /// Vendor `Mode` code. `Off` has none; it is encoded as `Drive: "0"`.
    pub fn vendor_mode_code(&self) -> Option<&'static str> {
        match self {
            HvacMode::Off => None,
            HvacMode::Cool => Some("1"),
            HvacMode::Dry => Some("2"),
            HvacMode::FanOnly => Some("3"),
            HvacMode::Heat => Some("4"),
        }
    }

    /// Decode the `Drive`/`Mode` pair of a group record. Unrecognized codes
    /// decode to `None`, never an error.
    pub fn from_vendor(drive: &str, mode: &str) -> Option<Self> {
        match drive {
            "0" => Some(HvacMode::Off),
            "1" => match mode {
                "1" => Some(HvacMode::Cool),
                "2" => Some(HvacMode::Dry),
                "3" => Some(HvacMode::FanOnly),
                "4" => Some(HvacMode::Heat),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Low,
    Medium,
    High,
    Diffuse,
}

impl FanMode {
    pub fn as_display_str(&self) -> &'static str {
        match self {
            FanMode::Low => "low",
            FanMode::Medium => "medium",
            FanMode::High => "high",
            FanMode::Diffuse => "diffuse",
        }
    }

    pub fn from_display_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(FanMode::Low),
            "medium" => Some(FanMode::Medium),
            "high" => Some(FanMode::High),
            "diffuse" => Some(FanMode::Diffuse),
            _ => None,
        }
    }

    pub fn as_vendor_code(&self) -> &'static str {
        match self {
            FanMode::Low => "1",
            FanMode::Medium => "2",
            FanMode::High => "3",
            FanMode::Diffuse => "4",
        }
    }

    pub fn from_vendor_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(FanMode::Low),
            "2" => Some(FanMode::Medium),
            "3" => Some(FanMode::High),
            "4" => Some(FanMode::Diffuse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingMode {
    Auto,
    Stop1,
    Stop2,
    Stop3,
    Stop4,
}

impl SwingMode {
    pub fn as_display_str(&self) -> &'static str {
        match self {
            SwingMode::Auto => "auto",
            SwingMode::Stop1 => "stop1",
            SwingMode::Stop2 => "stop2",
            SwingMode::Stop3 => "stop3",
            SwingMode::Stop4 => "stop4",
        }
    }

    pub fn from_display_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(SwingMode::Auto),
            "stop1" => Some(SwingMode::Stop1),
            "stop2" => Some(SwingMode::Stop2),
            "stop3" => Some(SwingMode::Stop3),
            "stop4" => Some(SwingMode::Stop4),
            _ => None,
        }
    }

    pub fn as_vendor_code(&self) -> &'static str {
        match self {
            SwingMode::Auto => "0",
            SwingMode::Stop1 => "1",
            SwingMode::Stop2 => "2",
            SwingMode::Stop3 => "3",
            SwingMode::Stop4 => "4",
        }
    }

    pub fn from_vendor_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(SwingMode::Auto),
            "1" => Some(SwingMode::Stop1),
            "2" => Some(SwingMode::Stop2),
            "3" => Some(SwingMode::Stop3),
            "4" => Some(SwingMode::Stop4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeField {
    Hvac,
    Fan,
    Swing,
}

impl fmt::Display for ModeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeField::Hvac => write!(f, "hvac mode"),
            ModeField::Fan => write!(f, "fan mode"),
            ModeField::Swing => write!(f, "swing mode"),
        }
    }
}

/// A single desired state change, the unit of command dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    HvacMode(HvacMode),
    FanMode(FanMode),
    SwingMode(SwingMode),
    TargetTemperature(Temperature),
}

impl Change {
    /// Parse a display-vocabulary mode value (`"cool"`, `"high"`, …) for
    /// the given field. Rejected values never reach the network.
    pub fn parse_mode(field: ModeField, value: &str) -> Result<Self> {
        let parsed = match field {
            ModeField::Hvac => HvacMode::from_display_str(value).map(Change::HvacMode),
            ModeField::Fan => FanMode::from_display_str(value).map(Change::FanMode),
            ModeField::Swing => SwingMode::from_display_str(value).map(Change::SwingMode),
        };
        parsed.ok_or_else(|| Error::UnsupportedMode {
            field,
            value: value.to_string(),
        })
    }
}

/// One addressable unit as the controller reports it (a vendor "group").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalUnit {
    pub id: String,
    pub name: String,
    pub current_temperature: Option<Temperature>,
    pub target_temperature: Option<Temperature>,
    pub hvac_mode: Option<HvacMode>,
    pub fan_mode: Option<FanMode>,
    pub swing_mode: Option<SwingMode>,
    pub filter_signaled: bool,
    pub remote_locked: bool,
    /// Set by the registry when the unit was absent from the latest fetch.
    pub stale: bool,
}

/// Caller-facing snapshot of a device, physical or virtual. Snapshots are
/// recomputed per read; mutating one has no effect on the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub key: String,
    pub name: String,
    pub current_temperature: Option<Temperature>,
    pub target_temperature: Option<Temperature>,
    pub hvac_mode: Option<HvacMode>,
    pub fan_mode: Option<FanMode>,
    pub swing_mode: Option<SwingMode>,
    pub filter_signaled: Option<bool>,
    pub remote_locked: Option<bool>,
    /// False when members disagree on the set-point; the reported value is
    /// then the first member's (ascending id).
    pub is_consistent: bool,
    pub is_virtual: bool,
    /// Member unit ids in ascending order. Empty for physical devices.
    pub member_ids: Vec<String>,
}

/// Emitted when a refresh changes unit state.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UnitDiscovered { id: String, name: String },
    TemperatureChanged { id: String, name: String, temp: Temperature },
    TargetChanged { id: String, name: String, target: Temperature },
    HvacModeChanged { id: String, name: String, mode: Option<HvacMode> },
    FanModeChanged { id: String, name: String, mode: Option<FanMode> },
    SwingModeChanged { id: String, name: String, mode: Option<SwingMode> },
    FilterSignChanged { id: String, name: String, signaled: bool },
    RemoteLockChanged { id: String, name: String, locked: bool },
    UnitStale { id: String, name: String },
    UnitRestored { id: String, name: String },
}
