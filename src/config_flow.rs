//! Account setup flow
//!
//! The user submits an access token; the flow checks it by fetching the
//! fleet state and either creates an entry or re-shows the form with an
//! error code.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::{ApiFactory, TessieApi};
use crate::entries::ConfigEntry;
use crate::error::{BridgeError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::snapshot::Snapshot;

/// Title given to every entry created by the flow
pub const ENTRY_TITLE: &str = "Tessie";
/// Form field holding the token
pub const ACCESS_TOKEN_FIELD: &str = "access_token";
/// Key of the form-wide error
pub const BASE_ERROR_KEY: &str = "base";

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserInput {
    pub access_token: String,
}

/// Form-level error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowError {
    CannotConnect,
    InvalidAuth,
    Unknown,
}

impl FlowError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CannotConnect => "cannot_connect",
            Self::InvalidAuth => "invalid_auth",
            Self::Unknown => "unknown",
        }
    }

    fn from_error(error: &BridgeError) -> Self {
        match error {
            BridgeError::Auth { .. } => Self::InvalidAuth,
            e if e.is_connectivity() => Self::CannotConnect,
            _ => Self::Unknown,
        }
    }
}

/// Outcome of one flow step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    ShowForm {
        step_id: &'static str,
        fields: Vec<&'static str>,
        errors: BTreeMap<&'static str, FlowError>,
    },
    CreateEntry {
        title: String,
        #[serde(skip)]
        entry: ConfigEntry,
    },
}

impl FlowResult {
    fn form(errors: BTreeMap<&'static str, FlowError>) -> Self {
        Self::ShowForm {
            step_id: "user",
            fields: vec![ACCESS_TOKEN_FIELD],
            errors,
        }
    }
}

/// Check that the token reaches at least one active vehicle.
///
/// Zero vehicles is reported as an auth failure, not a connection failure.
pub async fn validate_input(api: &dyn TessieApi) -> Result<usize> {
    let body = api.get_state_of_all_vehicles(true).await?;
    let count = Snapshot::new(body).vehicles().len();
    if count == 0 {
        return Err(BridgeError::auth("No active vehicles found"));
    }
    Ok(count)
}

pub struct ConfigFlow {
    factory: Arc<dyn ApiFactory>,
    logger: StructuredLogger,
}

impl ConfigFlow {
    pub fn new(factory: Arc<dyn ApiFactory>) -> Self {
        Self {
            factory,
            logger: get_logger("config_flow"),
        }
    }

    pub async fn step_user(&self, input: Option<UserInput>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::form(BTreeMap::new());
        };

        let token = input.access_token.trim();
        let outcome = match self.factory.create(token) {
            Ok(api) => validate_input(api.as_ref()).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(count) => {
                self.logger
                    .info(&format!("Token validated, {} active vehicles", count));
                FlowResult::CreateEntry {
                    title: ENTRY_TITLE.to_string(),
                    entry: ConfigEntry::new(ENTRY_TITLE, token),
                }
            }
            Err(e) => {
                let code = FlowError::from_error(&e);
                if code == FlowError::Unknown {
                    self.logger
                        .error(&format!("Unexpected error validating token: {}", e));
                } else {
                    self.logger
                        .warn(&format!("Token rejected ({}): {}", code.as_str(), e));
                }
                let mut errors = BTreeMap::new();
                errors.insert(BASE_ERROR_KEY, code);
                FlowResult::form(errors)
            }
        }
    }
}
