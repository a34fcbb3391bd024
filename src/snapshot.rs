//! Fleet-state snapshot and vehicle lookup
//!
//! A snapshot is the full body returned by the fleet-state endpoint. Vehicles
//! live in the `results` list and are identified by their `vin`.

use crate::projection::resolve;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key holding the vehicle list at the top of a snapshot
pub const RESULTS_KEY: &str = "results";
/// Key holding a vehicle's VIN
pub const VIN_KEY: &str = "vin";
/// Path of the human-readable vehicle name
pub const DISPLAY_NAME_PATH: &str = "last_state.display_name";
/// Path of the vehicle model
pub const CAR_TYPE_PATH: &str = "last_state.vehicle_config.car_type";

/// Full fleet state captured at one poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Value);

impl Snapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Vehicle records; empty when `results` is missing or not a list
    pub fn vehicles(&self) -> &[Value] {
        self.0
            .get(RESULTS_KEY)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Linear scan for the first vehicle with the given VIN
    pub fn find_by_vin(&self, vin: &str) -> Option<&Value> {
        self.vehicles().iter().find(|v| vin_of(v) == Some(vin))
    }

    /// Mutable variant of [`Snapshot::find_by_vin`]
    pub fn find_by_vin_mut(&mut self, vin: &str) -> Option<&mut Value> {
        self.0
            .get_mut(RESULTS_KEY)
            .and_then(Value::as_array_mut)?
            .iter_mut()
            .find(|v| vin_of(v) == Some(vin))
    }

    /// Resolve a dotted path on the vehicle with the given VIN
    pub fn vehicle_value(&self, vin: &str, path: &str) -> Option<&Value> {
        self.find_by_vin(vin).and_then(|v| resolve(v, path))
    }

    /// VINs of all vehicles, in snapshot order
    pub fn vins(&self) -> Vec<String> {
        self.vehicles()
            .iter()
            .filter_map(|v| vin_of(v).map(str::to_string))
            .collect()
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// VIN of a vehicle record
pub fn vin_of(vehicle: &Value) -> Option<&str> {
    vehicle.get(VIN_KEY).and_then(Value::as_str)
}

/// Display name of a vehicle record, falling back to its VIN
pub fn display_name_of(vehicle: &Value) -> Option<&str> {
    resolve(vehicle, DISPLAY_NAME_PATH)
        .and_then(Value::as_str)
        .or_else(|| vin_of(vehicle))
}

/// Model of a vehicle record
pub fn car_type_of(vehicle: &Value) -> Option<&str> {
    resolve(vehicle, CAR_TYPE_PATH).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fleet() -> Snapshot {
        Snapshot::new(json!({
            "results": [
                {"vin": "V1", "last_state": {
                    "display_name": "Blue",
                    "vehicle_config": {"car_type": "model3"},
                    "charge_state": {"charging_state": "Stopped"}
                }},
                {"vin": "V2", "last_state": {"charge_state": {"charging_state": "Charging"}}}
            ]
        }))
    }

    #[test]
    fn finds_vehicle_by_vin() {
        let s = fleet();
        let v = s.find_by_vin("V2").unwrap();
        assert_eq!(vin_of(v), Some("V2"));
        assert!(s.find_by_vin("V3").is_none());
    }

    #[test]
    fn resolves_path_on_vehicle() {
        let s = fleet();
        assert_eq!(
            s.vehicle_value("V1", "last_state.charge_state.charging_state"),
            Some(&json!("Stopped"))
        );
        assert_eq!(
            s.vehicle_value("V9", "last_state.charge_state.charging_state"),
            None
        );
    }

    #[test]
    fn missing_or_malformed_results_has_no_vehicles() {
        assert!(Snapshot::new(json!({})).vehicles().is_empty());
        assert!(Snapshot::new(json!({"results": {"vin": "V1"}})).vehicles().is_empty());
        assert!(Snapshot::new(json!({"results": []})).find_by_vin("V1").is_none());
    }

    #[test]
    fn mutable_lookup_writes_through() {
        let mut s = fleet();
        let v = s.find_by_vin_mut("V1").unwrap();
        crate::projection::assign(v, "last_state.vehicle_state.locked", json!(true));
        assert_eq!(
            s.vehicle_value("V1", "last_state.vehicle_state.locked"),
            Some(&json!(true))
        );
    }

    #[test]
    fn identity_helpers() {
        let s = fleet();
        let v1 = s.find_by_vin("V1").unwrap();
        assert_eq!(display_name_of(v1), Some("Blue"));
        assert_eq!(car_type_of(v1), Some("model3"));
        let v2 = s.find_by_vin("V2").unwrap();
        assert_eq!(display_name_of(v2), Some("V2"));
        assert_eq!(car_type_of(v2), None);
        assert_eq!(s.vins(), vec!["V1".to_string(), "V2".to_string()]);
    }
}
