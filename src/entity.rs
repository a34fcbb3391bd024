//! Shared entity identity: devices, entity ids and rendered states

use serde::Serialize;
use serde_json::Value;

use crate::snapshot::{car_type_of, display_name_of, vin_of};

/// Integration domain, used as the device id prefix
pub const DOMAIN: &str = "tessie";
/// Manufacturer reported for every vehicle device
pub const MANUFACTURER: &str = "Tessie";

/// Kind of entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Sensor,
    Switch,
}

impl Platform {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Switch => "switch",
        }
    }
}

/// One device per vehicle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub model: Option<String>,
    pub manufacturer: &'static str,
}

impl DeviceInfo {
    /// Build the device for a vehicle record; `None` without a VIN
    pub fn from_vehicle(vehicle: &Value) -> Option<Self> {
        let vin = vin_of(vehicle)?;
        Some(Self {
            id: device_id_for_vin(vin),
            name: display_name_of(vehicle).unwrap_or(vin).to_string(),
            model: car_type_of(vehicle).map(str::to_string),
            manufacturer: MANUFACTURER,
        })
    }
}

pub fn device_id_for_vin(vin: &str) -> String {
    format!("{}_{}", DOMAIN, vin.to_lowercase())
}

/// State of one entity as exposed to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub entity_id: String,
    pub unique_id: String,
    pub platform: Platform,
    pub translation_key: &'static str,
    pub device_id: String,
    pub vin: String,
    /// `null` when the value is unknown
    pub state: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    pub available: bool,
}

impl EntityState {
    /// Plain string rendering of the state, `None` when unknown
    pub fn state_string(&self) -> Option<String> {
        match &self.state {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Lowercase, `_`-separated form of `input` suitable for entity ids
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        "unknown".to_string()
    } else {
        out
    }
}

/// `platform.device_name_key`
pub fn entity_id(platform: Platform, device_name: &str, key: &str) -> String {
    format!(
        "{}.{}_{}",
        platform.as_str(),
        slugify(device_name),
        slugify(key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Blue  Thunder!"), "blue_thunder");
        assert_eq!(slugify("--Model 3--"), "model_3");
        assert_eq!(slugify("***"), "unknown");
    }

    #[test]
    fn entity_ids_follow_platform_and_device() {
        assert_eq!(
            entity_id(Platform::Sensor, "Blue Thunder", "battery_level"),
            "sensor.blue_thunder_battery_level"
        );
        assert_eq!(
            entity_id(Platform::Switch, "Blue", "locked_switch"),
            "switch.blue_locked_switch"
        );
    }

    #[test]
    fn device_from_vehicle() {
        let v = json!({"vin": "5YJ3X", "last_state": {
            "display_name": "Blue",
            "vehicle_config": {"car_type": "model3"}
        }});
        let d = DeviceInfo::from_vehicle(&v).unwrap();
        assert_eq!(d.id, "tessie_5yj3x");
        assert_eq!(d.name, "Blue");
        assert_eq!(d.model.as_deref(), Some("model3"));
        assert_eq!(d.manufacturer, "Tessie");

        assert!(DeviceInfo::from_vehicle(&json!({"last_state": {}})).is_none());
    }

    #[test]
    fn state_string_renders_scalars() {
        let mut s = EntityState {
            entity_id: "sensor.x".into(),
            unique_id: "x".into(),
            platform: Platform::Sensor,
            translation_key: "x",
            device_id: "d".into(),
            vin: "V".into(),
            state: json!(16),
            unit_of_measurement: None,
            device_class: None,
            available: true,
        };
        assert_eq!(s.state_string().as_deref(), Some("16"));
        s.state = json!("Charging");
        assert_eq!(s.state_string().as_deref(), Some("Charging"));
        s.state = Value::Null;
        assert_eq!(s.state_string(), None);
    }
}
