mod aggregate;
mod api;
mod controller;
mod dispatch;
mod error;
mod groups;
mod logger;
mod protocol;
mod registry;
mod types;

pub use aggregate::{aggregate, physical_state};
pub use api::{DeviceApi, LocalApi, LocalApiBuilder};
pub use controller::{SystemController, SystemControllerBuilder};
pub use dispatch::{CommandOutcome, MemberFailure, SETPOINT_MAX_C, SETPOINT_MIN_C};
pub use error::{Error, Result};
pub use groups::{VirtualGroupSpec, resolve};
pub use logger::MessageLogMode;
pub use registry::UnitRegistry;
pub use types::*;
