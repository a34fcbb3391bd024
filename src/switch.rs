//! Vehicle switches
//!
//! A switch reads its on/off state from the cached snapshot and flips it by
//! sending a remote command. After the command succeeds the new value is
//! written into the snapshot so the state changes before the next poll.

use std::sync::Arc;

use serde_json::Value;

use crate::api::VehicleCommand;
use crate::coordinator::Coordinator;
use crate::entity::{DeviceInfo, EntityState, Platform, entity_id};
use crate::error::Result;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::projection::assign;
use crate::snapshot::{Snapshot, vin_of};

/// Value stored at a switch path for the on or off position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchValue {
    Bool(bool),
    Text(&'static str),
}

impl SwitchValue {
    pub fn to_json(self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Text(s) => Value::String(s.to_string()),
        }
    }

    /// Exact comparison, no coercion between strings and booleans
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Bool(a), Value::Bool(b)) => a == *b,
            (Self::Text(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchDescription {
    pub key: &'static str,
    pub translation_key: &'static str,
    pub on_value: SwitchValue,
    pub off_value: SwitchValue,
    pub turn_on: VehicleCommand,
    pub turn_off: VehicleCommand,
}

const fn toggle(
    key: &'static str,
    translation_key: &'static str,
    turn_on: VehicleCommand,
    turn_off: VehicleCommand,
) -> SwitchDescription {
    SwitchDescription {
        key,
        translation_key,
        on_value: SwitchValue::Bool(true),
        off_value: SwitchValue::Bool(false),
        turn_on,
        turn_off,
    }
}

pub static SWITCH_DESCRIPTIONS: &[SwitchDescription] = &[
    SwitchDescription {
        key: "last_state.charge_state.charging_state",
        translation_key: "charging_state_switch",
        on_value: SwitchValue::Text("Charging"),
        off_value: SwitchValue::Text("Stopped"),
        turn_on: VehicleCommand::StartCharging,
        turn_off: VehicleCommand::StopCharging,
    },
    toggle(
        "last_state.charge_state.charge_port_door_open",
        "charge_port_door_open_switch",
        VehicleCommand::OpenChargePort,
        VehicleCommand::CloseChargePort,
    ),
    toggle(
        "last_state.climate_state.is_climate_on",
        "is_climate_on_switch",
        VehicleCommand::StartClimate,
        VehicleCommand::StopClimate,
    ),
    toggle(
        "last_state.climate_state.steering_wheel_heater",
        "steering_wheel_heater_switch",
        VehicleCommand::StartSteeringWheelHeater,
        VehicleCommand::StopSteeringWheelHeater,
    ),
    toggle(
        "last_state.vehicle_state.locked",
        "locked_switch",
        VehicleCommand::Lock,
        VehicleCommand::Unlock,
    ),
    toggle(
        "last_state.vehicle_state.sentry_mode",
        "sentry_mode_switch",
        VehicleCommand::EnableSentry,
        VehicleCommand::DisableSentry,
    ),
    toggle(
        "last_state.vehicle_state.valet_mode",
        "valet_mode_switch",
        VehicleCommand::EnableValet,
        VehicleCommand::DisableValet,
    ),
];

/// One switch bound to one vehicle
pub struct VehicleSwitch {
    pub vin: String,
    pub entity_id: String,
    pub unique_id: String,
    pub device: DeviceInfo,
    pub description: &'static SwitchDescription,
    coordinator: Arc<Coordinator>,
    logger: StructuredLogger,
}

impl VehicleSwitch {
    pub fn new(
        coordinator: Arc<Coordinator>,
        device: DeviceInfo,
        vin: &str,
        description: &'static SwitchDescription,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            vin: vin.to_string(),
            entity_id: entity_id(Platform::Switch, &device.name, description.translation_key),
            unique_id: format!("{}-{}", vin, description.translation_key),
            device,
            description,
            coordinator,
            logger,
        }
    }

    /// `true` only when the stored value equals the on-value
    pub fn is_on(&self, snapshot: &Snapshot) -> bool {
        snapshot
            .vehicle_value(&self.vin, self.description.key)
            .is_some_and(|v| self.description.on_value.matches(v))
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.switch_to(self.description.turn_on, self.description.on_value)
            .await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.switch_to(self.description.turn_off, self.description.off_value)
            .await
    }

    async fn switch_to(&self, command: VehicleCommand, value: SwitchValue) -> Result<()> {
        self.coordinator
            .api()
            .send_command(&self.vin, command)
            .await
            .inspect_err(|e| {
                self.logger
                    .warn(&format!("{} on {} failed: {}", command, self.entity_id, e));
            })?;

        let key = self.description.key;
        let applied = self
            .coordinator
            .update_vehicle(&self.vin, |vehicle| assign(vehicle, key, value.to_json()))
            .await;
        if !applied {
            self.logger.debug(&format!(
                "Vehicle {} not in snapshot, skipping optimistic write",
                self.vin
            ));
        }
        Ok(())
    }

    pub fn state(&self, snapshot: Option<&Snapshot>, available: bool) -> EntityState {
        EntityState {
            entity_id: self.entity_id.clone(),
            unique_id: self.unique_id.clone(),
            platform: Platform::Switch,
            translation_key: self.description.translation_key,
            device_id: self.device.id.clone(),
            vin: self.vin.clone(),
            state: Value::Bool(snapshot.is_some_and(|s| self.is_on(s))),
            unit_of_measurement: None,
            device_class: None,
            available,
        }
    }
}

/// Instantiate every switch for every vehicle in `snapshot`
pub fn build_switches(
    coordinator: &Arc<Coordinator>,
    snapshot: &Snapshot,
) -> Vec<VehicleSwitch> {
    let mut switches = Vec::new();
    for vehicle in snapshot.vehicles() {
        let (Some(device), Some(vin)) = (DeviceInfo::from_vehicle(vehicle), vin_of(vehicle))
        else {
            continue;
        };
        let logger = get_logger_with_context(
            LogContext::new("switch")
                .with_entry_id(coordinator.entry_id())
                .with_vin(vin),
        );
        for description in SWITCH_DESCRIPTIONS {
            switches.push(VehicleSwitch::new(
                Arc::clone(coordinator),
                device.clone(),
                vin,
                description,
                logger.clone(),
            ));
        }
    }
    switches
}
