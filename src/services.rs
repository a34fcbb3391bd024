//! `set_charging_amps` action
//!
//! The amperage comes either from the call itself or from the current state
//! of another entity. When that entity's state is a plain digit string it
//! takes precedence over `amps`.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::logging::get_logger;
use crate::registry::IntegrationRegistry;

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SetChargingAmpsCall {
    /// Device id of the target vehicle
    #[serde(default)]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub amps: Option<f64>,
    /// Entity whose state supplies the amperage
    #[serde(default)]
    pub entity_amps: Option<String>,
}

/// What a call ended up doing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ServiceOutcome {
    Sent { vin: String, amps: f64 },
    Skipped { reason: &'static str },
}

fn digit_amps(state: &str) -> Option<f64> {
    if state.is_empty() || !state.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    state.parse().ok()
}

pub async fn set_charging_amps(
    registry: &IntegrationRegistry,
    call: SetChargingAmpsCall,
) -> Result<ServiceOutcome> {
    let logger = get_logger("services");

    let Some(device_id) = call.vehicle else {
        return Ok(ServiceOutcome::Skipped {
            reason: "no vehicle given",
        });
    };

    let mut amps = call.amps;
    if let Some(entity_id) = call.entity_amps.as_deref().filter(|e| !e.is_empty()) {
        let override_amps = registry
            .entity_state(entity_id)
            .await
            .and_then(|s| s.state_string())
            .and_then(|s| digit_amps(&s));
        match override_amps {
            Some(value) => amps = Some(value),
            None => logger.debug(&format!(
                "Entity {} has no usable amperage, keeping {:?}",
                entity_id, amps
            )),
        }
    }

    if amps.is_none() && call.entity_amps.is_none() {
        return Ok(ServiceOutcome::Skipped {
            reason: "no amperage given",
        });
    }

    let target = registry.device_target(&device_id).await?;
    let amps = amps.ok_or_else(|| {
        BridgeError::validation(
            "entity_amps".to_string(),
            "entity state is not a whole number of amperes".to_string(),
        )
    })?;

    target.api.set_charging_amps(&target.vin, amps).await?;
    logger.info(&format!("Charging current for {} set to {} A", target.vin, amps));
    Ok(ServiceOutcome::Sent {
        vin: target.vin,
        amps,
    })
}
