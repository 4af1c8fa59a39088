use tracing::debug;

use crate::aggregate::{aggregate, physical_state};
use crate::api::DeviceApi;
use crate::dispatch::{self, CommandOutcome};
use crate::error::{Error, Result};
use crate::groups::{VirtualGroupSpec, resolve};
use crate::registry::UnitRegistry;
use crate::types::{Change, DeviceState, Event, ModeField, PhysicalUnit, Temperature};

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;

pub struct SystemControllerBuilder<D> {
    api: D,
    groups: Vec<VirtualGroupSpec>,
    event_callbacks: Vec<EventCallback>,
}

impl<D: DeviceApi> SystemControllerBuilder<D> {
    pub fn new(api: D) -> Self {
        Self {
            api,
            groups: Vec::new(),
            event_callbacks: Vec::new(),
        }
    }

    pub fn group(mut self, spec: VirtualGroupSpec) -> Self {
        self.groups.push(spec);
        self
    }

    pub fn groups(mut self, specs: impl IntoIterator<Item = VirtualGroupSpec>) -> Self {
        self.groups.extend(specs);
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> SystemController<D> {
        SystemController {
            api: self.api,
            registry: UnitRegistry::new(),
            groups: self.groups,
            event_callbacks: self.event_callbacks,
        }
    }
}

/// Orchestration façade: owns the registry, runs refresh cycles, routes
/// reads through the resolver and aggregation, writes through the
/// dispatcher.
pub struct SystemController<D: DeviceApi> {
    api: D,
    registry: UnitRegistry,
    groups: Vec<VirtualGroupSpec>,
    event_callbacks: Vec<EventCallback>,
}

impl<D: DeviceApi> SystemController<D> {
    pub fn builder(api: D) -> SystemControllerBuilder<D> {
        SystemControllerBuilder::new(api)
    }

    /// Fetch the latest unit states and merge them into the registry.
    ///
    /// A failed fetch leaves the registry at its last good snapshot.
    /// Taking `&mut self` serializes refresh cycles.
    pub async fn refresh(&mut self) -> Result<()> {
        let units = self.api.fetch_units().await?;
        debug!(count = units.len(), "refreshing registry");
        let events = self.registry.update(units);
        for event in &events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    /// Snapshot of every device: physical units first (ascending id), then
    /// virtual groups in configuration order.
    pub fn device_states(&self) -> Vec<DeviceState> {
        let mut states: Vec<DeviceState> = self.registry.all().map(physical_state).collect();
        states.extend(self.groups.iter().map(|spec| self.group_state(spec)));
        states
    }

    /// Look up one device by physical id or virtual group key.
    pub fn device(&self, key: &str) -> Option<DeviceState> {
        if let Some(unit) = self.registry.get(key) {
            return Some(physical_state(unit));
        }
        self.groups
            .iter()
            .find(|spec| spec.key == key)
            .map(|spec| self.group_state(spec))
    }

    fn group_state(&self, spec: &VirtualGroupSpec) -> DeviceState {
        let mut ids = resolve(spec, &self.registry);
        // Aggregation tie-breaks and fan-out both run in ascending id order.
        ids.sort();
        let members: Vec<&PhysicalUnit> =
            ids.iter().filter_map(|id| self.registry.get(id)).collect();
        aggregate(&spec.key, &spec.display_name, &members)
    }

    /// Set a mode field from its display vocabulary (`"cool"`, `"high"`,
    /// …). Unrecognized values fail before any command is issued.
    pub async fn set_mode(
        &mut self,
        key: &str,
        field: ModeField,
        value: &str,
    ) -> Result<CommandOutcome> {
        let change = Change::parse_mode(field, value)?;
        self.send(key, change).await
    }

    /// Set the target temperature in Celsius. Values outside 18-30 are
    /// rejected before any command is issued.
    pub async fn set_target_temperature(
        &mut self,
        key: &str,
        celsius: f64,
    ) -> Result<CommandOutcome> {
        self.send(key, Change::TargetTemperature(Temperature::from_celsius(celsius)))
            .await
    }

    /// Dispatch an already-typed change to a device, physical or virtual.
    pub async fn send(&mut self, key: &str, change: Change) -> Result<CommandOutcome> {
        let target = self
            .device(key)
            .ok_or_else(|| Error::UnknownDevice(key.to_string()))?;
        dispatch::dispatch(&self.api, &mut self.registry, &target, change).await
    }

    /// Replace the virtual group set (explicit configuration reload).
    pub fn reload_groups(&mut self, specs: Vec<VirtualGroupSpec>) {
        self.groups = specs;
    }
}
