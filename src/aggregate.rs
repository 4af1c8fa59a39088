use crate::types::{DeviceState, PhysicalUnit, Temperature};

/// Members count as agreeing on a set-point when within half the
/// controller's 0.5 degree granularity of the first member.
const TARGET_AGREEMENT_TOLERANCE_C: f64 = 0.25;

/// Compute the aggregate state of a virtual device from its members.
///
/// `members` must already be in ascending id order; the first member is
/// the deterministic tie-break when set-points diverge. Zero members yield
/// a state with every field absent, vacuously consistent.
pub fn aggregate(key: &str, name: &str, members: &[&PhysicalUnit]) -> DeviceState {
    let mut state = DeviceState {
        key: key.to_string(),
        name: name.to_string(),
        current_temperature: mean_of(members, |u| u.current_temperature),
        target_temperature: None,
        hvac_mode: uniform(members, |u| u.hvac_mode),
        fan_mode: uniform(members, |u| u.fan_mode),
        swing_mode: uniform(members, |u| u.swing_mode),
        filter_signaled: if members.is_empty() {
            None
        } else {
            Some(members.iter().any(|u| u.filter_signaled))
        },
        remote_locked: if members.is_empty() {
            None
        } else {
            Some(members.iter().all(|u| u.remote_locked))
        },
        is_consistent: true,
        is_virtual: true,
        member_ids: members.iter().map(|u| u.id.clone()).collect(),
    };

    let targets: Vec<f64> = members
        .iter()
        .filter_map(|u| u.target_temperature)
        .map(|t| t.celsius())
        .collect();
    if let Some(&first) = targets.first() {
        if targets
            .iter()
            .all(|t| (t - first).abs() <= TARGET_AGREEMENT_TOLERANCE_C)
        {
            let mean = targets.iter().sum::<f64>() / targets.len() as f64;
            state.target_temperature = Some(Temperature::from_celsius(mean));
        } else {
            state.target_temperature = Some(Temperature::from_celsius(first));
            state.is_consistent = false;
        }
    }

    state
}

/// A physical unit viewed through the same aggregation (a single-member
/// group), so physical and virtual devices share one code path.
pub fn physical_state(unit: &PhysicalUnit) -> DeviceState {
    let mut state = aggregate(&unit.id, &unit.name, &[unit]);
    state.is_virtual = false;
    state.member_ids = Vec::new();
    state
}

/// Sum-then-divide mean over the members that report a value, so the
/// result does not depend on summation order.
fn mean_of(
    members: &[&PhysicalUnit],
    field: impl Fn(&PhysicalUnit) -> Option<Temperature>,
) -> Option<Temperature> {
    let values: Vec<f64> = members
        .iter()
        .filter_map(|&u| field(u))
        .map(|t| t.celsius())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(Temperature::from_celsius(
            values.iter().sum::<f64>() / values.len() as f64,
        ))
    }
}

/// The shared value when every member agrees (including all-absent), else
/// `None` — disagreement is reported as mixed, never resolved by guessing.
fn uniform<T>(
    members: &[&PhysicalUnit],
    field: impl Fn(&PhysicalUnit) -> Option<T>,
) -> Option<T>
where
    T: Copy + PartialEq,
{
    let first = field(*members.first()?);
    if members.iter().all(|&u| field(u) == first) {
        first
    } else {
        None
    }
}
