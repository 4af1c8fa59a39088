use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::types::{Change, Event, PhysicalUnit};

/// Latest known state of every physical unit, keyed by id.
///
/// Units missing from a fetch are retained and marked stale rather than
/// dropped, so a transient gap does not erase a virtual group's membership.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: BTreeMap<String, PhysicalUnit>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a fetched snapshot and report what changed.
    pub fn update(&mut self, fetched: Vec<PhysicalUnit>) -> Vec<Event> {
        let mut events = Vec::new();

        let fetched_ids: BTreeSet<&str> = fetched.iter().map(|u| u.id.as_str()).collect();
        for unit in self.units.values_mut() {
            if !fetched_ids.contains(unit.id.as_str()) && !unit.stale {
                unit.stale = true;
                events.push(Event::UnitStale {
                    id: unit.id.clone(),
                    name: unit.name.clone(),
                });
            }
        }

        for mut unit in fetched {
            unit.stale = false;
            match self.units.get_mut(&unit.id) {
                None => {
                    events.push(Event::UnitDiscovered {
                        id: unit.id.clone(),
                        name: unit.name.clone(),
                    });
                    self.units.insert(unit.id.clone(), unit);
                }
                Some(prev) => {
                    if prev.stale {
                        events.push(Event::UnitRestored {
                            id: unit.id.clone(),
                            name: unit.name.clone(),
                        });
                    }
                    diff_unit(prev, &unit, &mut events);
                    *prev = unit;
                }
            }
        }

        if !events.is_empty() {
            debug!(count = events.len(), "registry changes");
        }
        events
    }

    pub fn get(&self, id: &str) -> Option<&PhysicalUnit> {
        self.units.get(id)
    }

    /// All known units, ascending id.
    pub fn all(&self) -> impl Iterator<Item = &PhysicalUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Optimistic write-back after a confirmed command; the next refresh
    /// remains the source of truth.
    pub(crate) fn apply_change(&mut self, id: &str, change: &Change) {
        if let Some(unit) = self.units.get_mut(id) {
            match change {
                Change::HvacMode(mode) => unit.hvac_mode = Some(*mode),
                Change::FanMode(mode) => unit.fan_mode = Some(*mode),
                Change::SwingMode(mode) => unit.swing_mode = Some(*mode),
                Change::TargetTemperature(t) => unit.target_temperature = Some(*t),
            }
        }
    }
}

fn diff_unit(prev: &PhysicalUnit, next: &PhysicalUnit, events: &mut Vec<Event>) {
    let id = next.id.clone();
    let name = next.name.clone();

    if next.current_temperature != prev.current_temperature
        && let Some(temp) = next.current_temperature
    {
        events.push(Event::TemperatureChanged {
            id: id.clone(),
            name: name.clone(),
            temp,
        });
    }
    if next.target_temperature != prev.target_temperature
        && let Some(target) = next.target_temperature
    {
        events.push(Event::TargetChanged {
            id: id.clone(),
            name: name.clone(),
            target,
        });
    }
    if next.hvac_mode != prev.hvac_mode {
        events.push(Event::HvacModeChanged {
            id: id.clone(),
            name: name.clone(),
            mode: next.hvac_mode,
        });
    }
    if next.fan_mode != prev.fan_mode {
        events.push(Event::FanModeChanged {
            id: id.clone(),
            name: name.clone(),
            mode: next.fan_mode,
        });
    }
    if next.swing_mode != prev.swing_mode {
        events.push(Event::SwingModeChanged {
            id: id.clone(),
            name: name.clone(),
            mode: next.swing_mode,
        });
    }
    if next.filter_signaled != prev.filter_signaled {
        events.push(Event::FilterSignChanged {
            id: id.clone(),
            name: name.clone(),
            signaled: next.filter_signaled,
        });
    }
    if next.remote_locked != prev.remote_locked {
        events.push(Event::RemoteLockChanged {
            id,
            name,
            locked: next.remote_locked,
        });
    }
}
