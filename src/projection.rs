//! Dotted-path access into vehicle state
//!
//! Vehicle records are kept as a tagged value tree (`serde_json::Value`:
//! mapping, sequence or scalar). A dotted path such as
//! `last_state.charge_state.charging_state` names a location inside it.
//!
//! Reads and writes are asymmetric:
//!
//! - [`resolve`] fails closed: any missing or non-mapping intermediate
//!   yields `None`.
//! - [`assign`] fails open: missing intermediates are created as empty
//!   mappings and a non-mapping intermediate is replaced by one.
//!
//! The empty path is treated as the single segment `""`.

use serde_json::{Map, Value};

/// Separator between path segments
pub const PATH_SEPARATOR: char = '.';

/// Resolve `path` inside `fragment`, returning the raw stored value.
pub fn resolve<'a>(fragment: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(fragment, |current, segment| current.as_object()?.get(segment))
}

/// Write `value` at `path` inside `fragment`, creating intermediates.
pub fn assign(fragment: &mut Value, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    // split always yields at least one segment
    let last = segments.pop().unwrap_or_default();

    let mut current = fragment;
    for segment in segments {
        let Some(map) = reset_to_object(current) else {
            return;
        };
        current = map
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if let Some(map) = reset_to_object(current) {
        map.insert(last.to_string(), value);
    }
}

/// Borrow `value` as a mapping, replacing it with an empty one first if it
/// is anything else.
fn reset_to_object(value: &mut Value) -> Option<&mut Map<String, Value>> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    value.as_object_mut()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vehicle() -> Value {
        json!({
            "vin": "V1",
            "last_state": {
                "display_name": "Roadrunner",
                "charge_state": {"charging_state": "Stopped", "battery_level": 81},
                "climate_state": {"is_climate_on": false},
                "drive_state": null,
                "tags": ["a", "b"]
            }
        })
    }

    #[test]
    fn resolves_nested_scalar() {
        let v = vehicle();
        assert_eq!(
            resolve(&v, "last_state.charge_state.charging_state"),
            Some(&json!("Stopped"))
        );
        assert_eq!(
            resolve(&v, "last_state.charge_state.battery_level"),
            Some(&json!(81))
        );
    }

    #[test]
    fn resolves_top_level_and_subtrees() {
        let v = vehicle();
        assert_eq!(resolve(&v, "vin"), Some(&json!("V1")));
        assert_eq!(
            resolve(&v, "last_state.climate_state"),
            Some(&json!({"is_climate_on": false}))
        );
    }

    #[test]
    fn missing_intermediate_is_absent() {
        let v = vehicle();
        assert_eq!(resolve(&v, "last_state.vehicle_state.locked"), None);
        assert_eq!(resolve(&v, "nope.charge_state"), None);
        assert_eq!(resolve(&v, "last_state.charge_state.missing"), None);
    }

    #[test]
    fn walking_through_non_mapping_is_absent() {
        let v = vehicle();
        assert_eq!(resolve(&v, "vin.length"), None);
        assert_eq!(resolve(&v, "last_state.tags.0"), None);
        assert_eq!(resolve(&v, "last_state.drive_state.latitude"), None);
        assert_eq!(resolve(&json!(42), "anything"), None);
    }

    #[test]
    fn null_leaf_is_returned_raw() {
        let v = vehicle();
        assert_eq!(resolve(&v, "last_state.drive_state"), Some(&Value::Null));
    }

    #[test]
    fn empty_path_is_single_empty_segment() {
        let v = vehicle();
        assert_eq!(resolve(&v, ""), None);

        let mut v = json!({});
        assign(&mut v, "", json!(1));
        assert_eq!(resolve(&v, ""), Some(&json!(1)));
    }

    #[test]
    fn assign_overwrites_existing_leaf() {
        let mut v = vehicle();
        assign(
            &mut v,
            "last_state.charge_state.charging_state",
            json!("Charging"),
        );
        assert_eq!(
            resolve(&v, "last_state.charge_state.charging_state"),
            Some(&json!("Charging"))
        );
        // siblings untouched
        assert_eq!(
            resolve(&v, "last_state.charge_state.battery_level"),
            Some(&json!(81))
        );
    }

    #[test]
    fn assign_creates_missing_intermediates() {
        let mut v = vehicle();
        assign(&mut v, "last_state.vehicle_state.locked", json!(true));
        assert_eq!(
            resolve(&v, "last_state.vehicle_state.locked"),
            Some(&json!(true))
        );
    }

    #[test]
    fn assign_replaces_non_mapping_intermediate() {
        let mut v = vehicle();
        assign(&mut v, "vin.check_digit", json!("7"));
        assert_eq!(resolve(&v, "vin"), Some(&json!({"check_digit": "7"})));

        let mut scalar = json!("not a map");
        assign(&mut scalar, "a.b", json!(1));
        assert_eq!(scalar, json!({"a": {"b": 1}}));
    }

    #[test]
    fn assign_replaces_null_and_sequence_leaves_on_the_way() {
        let mut v = vehicle();
        assign(&mut v, "last_state.drive_state.latitude", json!(52.1));
        assign(&mut v, "last_state.tags.first", json!("a"));
        assert_eq!(
            resolve(&v, "last_state.drive_state"),
            Some(&json!({"latitude": 52.1}))
        );
        assert_eq!(resolve(&v, "last_state.tags.first"), Some(&json!("a")));
    }

    #[test]
    fn assign_then_resolve_round_trips() {
        let paths = [
            "x",
            "last_state.display_name",
            "deep.er.than.before",
            "last_state.tags.inner",
        ];
        let mut v = vehicle();
        for (i, p) in paths.iter().enumerate() {
            assign(&mut v, p, json!(i));
            assert_eq!(resolve(&v, p), Some(&json!(i)), "path {p}");
        }
    }
}
