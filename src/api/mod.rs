//! Tessie vehicle API integration
//!
//! [`TessieApi`] is the seam between the bridge and the remote service:
//! the fleet-state fetch plus the named per-vehicle commands. [`TessieClient`]
//! implements it over HTTPS; tests substitute their own implementations.

pub mod client;
pub mod types;

pub use client::TessieClient;
pub use types::{CommandResponse, VehicleCommand};

use std::sync::Arc;
use std::time::Duration;

use crate::config::TessieConfig;
use crate::error::{BridgeError, Result};
use serde_json::Value;

/// Remote operations against the Tessie API
#[async_trait::async_trait]
pub trait TessieApi: Send + Sync {
    /// Fetch the state of all vehicles on the account
    async fn get_state_of_all_vehicles(&self, only_active: bool) -> Result<Value>;

    /// Invoke a named command on one vehicle
    async fn send_command(&self, vin: &str, command: VehicleCommand) -> Result<()>;

    /// Set the charging current limit of one vehicle (amperes)
    async fn set_charging_amps(&self, vin: &str, amps: f64) -> Result<()>;
}

/// Builds an API handle for one account's access token
pub trait ApiFactory: Send + Sync {
    fn create(&self, access_token: &str) -> Result<Arc<dyn TessieApi>>;
}

/// [`ApiFactory`] producing [`TessieClient`]s that share one connection pool
pub struct HttpApiFactory {
    base_url: String,
    http: reqwest::Client,
}

impl HttpApiFactory {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BridgeError::config(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.to_string(),
            http,
        })
    }

    pub fn from_config(config: &TessieConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

impl ApiFactory for HttpApiFactory {
    fn create(&self, access_token: &str) -> Result<Arc<dyn TessieApi>> {
        Ok(Arc::new(TessieClient::from_reqwest(
            &self.base_url,
            access_token.to_string(),
            self.http.clone(),
        )))
    }
}
