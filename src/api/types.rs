use serde::{Deserialize, Serialize};

/// Named per-vehicle commands understood by the Tessie API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCommand {
    Lock,
    Unlock,
    EnableSentry,
    DisableSentry,
    EnableValet,
    DisableValet,
    StartCharging,
    StopCharging,
    OpenChargePort,
    CloseChargePort,
    StartClimate,
    StopClimate,
    StartSteeringWheelHeater,
    StopSteeringWheelHeater,
}

impl VehicleCommand {
    /// Path segment used in `/{vin}/command/{name}`
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::EnableSentry => "enable_sentry",
            Self::DisableSentry => "disable_sentry",
            Self::EnableValet => "enable_valet",
            Self::DisableValet => "disable_valet",
            Self::StartCharging => "start_charging",
            Self::StopCharging => "stop_charging",
            Self::OpenChargePort => "open_charge_port",
            Self::CloseChargePort => "close_charge_port",
            Self::StartClimate => "start_climate",
            Self::StopClimate => "stop_climate",
            Self::StartSteeringWheelHeater => "start_steering_wheel_heater",
            Self::StopSteeringWheelHeater => "stop_steering_wheel_heater",
        }
    }
}

impl std::fmt::Display for VehicleCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by command endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub result: bool,
    #[serde(default)]
    pub reason: Option<String>,
}
