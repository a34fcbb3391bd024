//! Read-only vehicle sensors
//!
//! Every vehicle gets one sensor per entry of [`SENSOR_DESCRIPTIONS`]. A
//! sensor holds no state of its own: its value is resolved from the current
//! snapshot on every read.

use serde::Serialize;
use serde_json::Value;

use crate::entity::{DeviceInfo, EntityState, Platform, entity_id};
use crate::snapshot::{Snapshot, vin_of};

/// Unit of measurement of a sensor value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    Percentage,
    Kilometers,
    Miles,
    Ampere,
    KilowattHour,
    Watt,
    Volt,
    Minutes,
}

impl Unit {
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Percentage => "%",
            Self::Kilometers => "km",
            Self::Miles => "mi",
            Self::Ampere => "A",
            Self::KilowattHour => "kWh",
            Self::Watt => "W",
            Self::Volt => "V",
            Self::Minutes => "min",
        }
    }
}

/// What kind of quantity a sensor reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceClass {
    Battery,
    Distance,
    Current,
    Energy,
    Power,
    Voltage,
    Duration,
}

impl DeviceClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::Distance => "distance",
            Self::Current => "current",
            Self::Energy => "energy",
            Self::Power => "power",
            Self::Voltage => "voltage",
            Self::Duration => "duration",
        }
    }
}

/// Static sensor binding: display key, dotted path, unit and class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescription {
    pub translation_key: &'static str,
    pub key: &'static str,
    pub unit: Option<Unit>,
    pub device_class: Option<DeviceClass>,
}

impl SensorDescription {
    pub const fn new(
        translation_key: &'static str,
        key: &'static str,
        unit: Option<Unit>,
        device_class: Option<DeviceClass>,
    ) -> Self {
        Self {
            translation_key,
            key,
            unit,
            device_class,
        }
    }
}

pub static SENSOR_DESCRIPTIONS: &[SensorDescription] = &[
    SensorDescription::new("display_name", "last_state.display_name", None, None),
    SensorDescription::new("vin", "vin", None, None),
    SensorDescription::new(
        "battery_heater_on",
        "last_state.charge_state.battery_heater_on",
        None,
        None,
    ),
    SensorDescription::new(
        "battery_level",
        "last_state.charge_state.battery_level",
        Some(Unit::Percentage),
        Some(DeviceClass::Battery),
    ),
    SensorDescription::new(
        "battery_range",
        "last_state.charge_state.battery_range",
        Some(Unit::Kilometers),
        Some(DeviceClass::Distance),
    ),
    SensorDescription::new(
        "charge_amps",
        "last_state.charge_state.charge_amps",
        Some(Unit::Ampere),
        Some(DeviceClass::Current),
    ),
    SensorDescription::new(
        "charge_current_request",
        "last_state.charge_state.charge_current_request",
        Some(Unit::Ampere),
        Some(DeviceClass::Current),
    ),
    SensorDescription::new(
        "charge_current_request_max",
        "last_state.charge_state.charge_current_request_max",
        Some(Unit::Ampere),
        Some(DeviceClass::Current),
    ),
    SensorDescription::new(
        "charge_enable_request",
        "last_state.charge_state.charge_enable_request",
        None,
        None,
    ),
    SensorDescription::new(
        "charge_energy_added",
        "last_state.charge_state.charge_energy_added",
        Some(Unit::KilowattHour),
        Some(DeviceClass::Energy),
    ),
    SensorDescription::new(
        "charge_limit_soc",
        "last_state.charge_state.charge_limit_soc",
        Some(Unit::Percentage),
        Some(DeviceClass::Battery),
    ),
    SensorDescription::new(
        "charge_limit_soc_max",
        "last_state.charge_state.charge_limit_soc_max",
        Some(Unit::Percentage),
        Some(DeviceClass::Battery),
    ),
    SensorDescription::new(
        "charge_limit_soc_min",
        "last_state.charge_state.charge_limit_soc_min",
        Some(Unit::Percentage),
        Some(DeviceClass::Battery),
    ),
    SensorDescription::new(
        "charge_limit_soc_std",
        "last_state.charge_state.charge_limit_soc_std",
        Some(Unit::Percentage),
        Some(DeviceClass::Battery),
    ),
    SensorDescription::new(
        "charge_miles_added_ideal",
        "last_state.charge_state.charge_miles_added_ideal",
        Some(Unit::Miles),
        Some(DeviceClass::Distance),
    ),
    SensorDescription::new(
        "charge_miles_added_rated",
        "last_state.charge_state.charge_miles_added_rated",
        Some(Unit::Miles),
        Some(DeviceClass::Distance),
    ),
    SensorDescription::new(
        "charge_port_cold_weather_mode",
        "last_state.charge_state.charge_port_cold_weather_mode",
        None,
        None,
    ),
    SensorDescription::new(
        "charge_port_color",
        "last_state.charge_state.charge_port_color",
        None,
        None,
    ),
    SensorDescription::new(
        "charge_port_door_open",
        "last_state.charge_state.charge_port_door_open",
        None,
        None,
    ),
    SensorDescription::new(
        "charge_port_latch",
        "last_state.charge_state.charge_port_latch",
        None,
        None,
    ),
    SensorDescription::new(
        "charge_rate",
        "last_state.charge_state.charge_rate",
        Some(Unit::Ampere),
        Some(DeviceClass::Current),
    ),
    SensorDescription::new(
        "charger_actual_current",
        "last_state.charge_state.charger_actual_current",
        Some(Unit::Ampere),
        Some(DeviceClass::Current),
    ),
    SensorDescription::new(
        "charger_phases",
        "last_state.charge_state.charger_phases",
        None,
        None,
    ),
    SensorDescription::new(
        "charger_pilot_current",
        "last_state.charge_state.charger_pilot_current",
        Some(Unit::Ampere),
        Some(DeviceClass::Current),
    ),
    SensorDescription::new(
        "charger_power",
        "last_state.charge_state.charger_power",
        Some(Unit::Watt),
        Some(DeviceClass::Power),
    ),
    SensorDescription::new(
        "charger_voltage",
        "last_state.charge_state.charger_voltage",
        Some(Unit::Volt),
        Some(DeviceClass::Voltage),
    ),
    SensorDescription::new(
        "charging_state",
        "last_state.charge_state.charging_state",
        None,
        None,
    ),
    SensorDescription::new(
        "conn_charge_cable",
        "last_state.charge_state.conn_charge_cable",
        None,
        None,
    ),
    SensorDescription::new(
        "est_battery_range",
        "last_state.charge_state.est_battery_range",
        Some(Unit::Kilometers),
        Some(DeviceClass::Distance),
    ),
    SensorDescription::new(
        "fast_charger_brand",
        "last_state.charge_state.fast_charger_brand",
        None,
        None,
    ),
    SensorDescription::new(
        "fast_charger_present",
        "last_state.charge_state.fast_charger_present",
        None,
        None,
    ),
    SensorDescription::new(
        "fast_charger_type",
        "last_state.charge_state.fast_charger_type",
        None,
        None,
    ),
    SensorDescription::new(
        "ideal_battery_range",
        "last_state.charge_state.ideal_battery_range",
        Some(Unit::Kilometers),
        Some(DeviceClass::Distance),
    ),
    SensorDescription::new(
        "max_range_charge_counter",
        "last_state.charge_state.max_range_charge_counter",
        None,
        None,
    ),
    SensorDescription::new(
        "minutes_to_full_charge",
        "last_state.charge_state.minutes_to_full_charge",
        Some(Unit::Minutes),
        Some(DeviceClass::Duration),
    ),
    SensorDescription::new(
        "not_enough_power_to_heat",
        "last_state.charge_state.not_enough_power_to_heat",
        None,
        None,
    ),
    SensorDescription::new(
        "off_peak_charging_enabled",
        "last_state.charge_state.off_peak_charging_enabled",
        None,
        None,
    ),
    SensorDescription::new(
        "off_peak_charging_times",
        "last_state.charge_state.off_peak_charging_times",
        None,
        None,
    ),
    SensorDescription::new(
        "off_peak_hours_end_time",
        "last_state.charge_state.off_peak_hours_end_time",
        None,
        None,
    ),
    SensorDescription::new(
        "preconditioning_enabled",
        "last_state.charge_state.preconditioning_enabled",
        None,
        None,
    ),
    SensorDescription::new(
        "preconditioning_times",
        "last_state.charge_state.preconditioning_times",
        None,
        None,
    ),
    SensorDescription::new(
        "scheduled_charging_mode",
        "last_state.charge_state.scheduled_charging_mode",
        None,
        None,
    ),
    SensorDescription::new(
        "scheduled_charging_pending",
        "last_state.charge_state.scheduled_charging_pending",
        None,
        None,
    ),
    SensorDescription::new(
        "scheduled_charging_start_time",
        "last_state.charge_state.scheduled_charging_start_time",
        None,
        None,
    ),
    SensorDescription::new(
        "scheduled_departure_time",
        "last_state.charge_state.scheduled_departure_time",
        None,
        None,
    ),
    SensorDescription::new(
        "scheduled_departure_time_minutes",
        "last_state.charge_state.scheduled_departure_time_minutes",
        None,
        None,
    ),
    SensorDescription::new(
        "supercharger_session_trip_planner",
        "last_state.charge_state.supercharger_session_trip_planner",
        None,
        None,
    ),
    SensorDescription::new(
        "time_to_full_charge",
        "last_state.charge_state.time_to_full_charge",
        Some(Unit::Minutes),
        Some(DeviceClass::Duration),
    ),
    SensorDescription::new("timestamp", "last_state.charge_state.timestamp", None, None),
    SensorDescription::new(
        "trip_charging",
        "last_state.charge_state.trip_charging",
        None,
        None,
    ),
    SensorDescription::new(
        "usable_battery_level",
        "last_state.charge_state.usable_battery_level",
        Some(Unit::Percentage),
        Some(DeviceClass::Battery),
    ),
    SensorDescription::new(
        "user_charge_enable_request",
        "last_state.charge_state.user_charge_enable_request",
        None,
        None,
    ),
];

/// Translation key of the sensor exposing the VIN
pub const VIN_SENSOR_KEY: &str = "vin";

/// One sensor bound to one vehicle
#[derive(Debug, Clone)]
pub struct VehicleSensor {
    pub vin: String,
    pub entity_id: String,
    pub unique_id: String,
    pub device: DeviceInfo,
    pub description: &'static SensorDescription,
}

impl VehicleSensor {
    pub fn new(device: DeviceInfo, vin: &str, description: &'static SensorDescription) -> Self {
        Self {
            vin: vin.to_string(),
            entity_id: entity_id(Platform::Sensor, &device.name, description.translation_key),
            unique_id: format!("{}-{}", vin, description.key),
            device,
            description,
        }
    }

    /// Current value, `None` when the vehicle or path is absent
    pub fn native_value(&self, snapshot: &Snapshot) -> Option<Value> {
        snapshot
            .vehicle_value(&self.vin, self.description.key)
            .cloned()
    }

    pub fn state(&self, snapshot: Option<&Snapshot>, available: bool) -> EntityState {
        EntityState {
            entity_id: self.entity_id.clone(),
            unique_id: self.unique_id.clone(),
            platform: Platform::Sensor,
            translation_key: self.description.translation_key,
            device_id: self.device.id.clone(),
            vin: self.vin.clone(),
            state: snapshot
                .and_then(|s| self.native_value(s))
                .unwrap_or(Value::Null),
            unit_of_measurement: self.description.unit.as_ref().map(Unit::symbol),
            device_class: self.description.device_class.as_ref().map(DeviceClass::as_str),
            available,
        }
    }
}

/// Instantiate every sensor for every vehicle in `snapshot`
pub fn build_sensors(snapshot: &Snapshot) -> Vec<VehicleSensor> {
    let mut sensors = Vec::new();
    for vehicle in snapshot.vehicles() {
        let (Some(device), Some(vin)) = (DeviceInfo::from_vehicle(vehicle), vin_of(vehicle))
        else {
            continue;
        };
        for description in SENSOR_DESCRIPTIONS {
            sensors.push(VehicleSensor::new(device.clone(), vin, description));
        }
    }
    sensors
}
