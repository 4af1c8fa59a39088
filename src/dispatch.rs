use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::api::DeviceApi;
use crate::error::{Error, Result};
use crate::registry::UnitRegistry;
use crate::types::{Change, DeviceState};

/// Accepted set-point range, degrees Celsius inclusive.
pub const SETPOINT_MIN_C: f64 = 18.0;
pub const SETPOINT_MAX_C: f64 = 30.0;

#[derive(Debug)]
pub struct MemberFailure {
    pub unit_id: String,
    pub error: Error,
}

/// Reconciled result of a command fan-out. A partial failure carries
/// enough detail to retry just the failed subset.
#[derive(Debug)]
pub enum CommandOutcome {
    Success,
    PartialFailure(Vec<MemberFailure>),
    Failure(Vec<MemberFailure>),
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }

    pub fn failures(&self) -> &[MemberFailure] {
        match self {
            CommandOutcome::Success => &[],
            CommandOutcome::PartialFailure(failures) | CommandOutcome::Failure(failures) => {
                failures
            }
        }
    }
}

/// Send one change to a device, physical or virtual.
///
/// Validation happens before any network call. Member commands are issued
/// concurrently; the registry is updated in a single batch once every
/// outcome is known, succeeded members only, so no reader observes a
/// half-applied fan-out.
pub(crate) async fn dispatch<D: DeviceApi>(
    api: &D,
    registry: &mut UnitRegistry,
    target: &DeviceState,
    change: Change,
) -> Result<CommandOutcome> {
    if let Change::TargetTemperature(t) = change {
        let celsius = t.celsius();
        if !(SETPOINT_MIN_C..=SETPOINT_MAX_C).contains(&celsius) {
            return Err(Error::InvalidRange(celsius));
        }
    }

    let members: Vec<&str> = if target.is_virtual {
        target.member_ids.iter().map(String::as_str).collect()
    } else {
        vec![target.key.as_str()]
    };
    if members.is_empty() {
        debug!(device = %target.key, "no members to command");
        return Ok(CommandOutcome::Success);
    }

    debug!(device = %target.key, members = members.len(), ?change, "dispatching");
    let results = join_all(members.iter().map(|&id| async move {
        (id, api.send_command(id, &change).await)
    }))
    .await;

    let mut succeeded = Vec::new();
    let mut failures = Vec::new();
    for (unit_id, result) in results {
        match result {
            Ok(()) => succeeded.push(unit_id),
            Err(error) => {
                warn!(unit = unit_id, %error, "member command failed");
                failures.push(MemberFailure {
                    unit_id: unit_id.to_string(),
                    error,
                });
            }
        }
    }

    for id in &succeeded {
        registry.apply_change(id, &change);
    }

    Ok(if failures.is_empty() {
        CommandOutcome::Success
    } else if succeeded.is_empty() {
        CommandOutcome::Failure(failures)
    } else {
        CommandOutcome::PartialFailure(failures)
    })
}
