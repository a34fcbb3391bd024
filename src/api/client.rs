use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

use super::types::{CommandResponse, VehicleCommand};
use super::TessieApi;
use crate::error::{BridgeError, Result};
use crate::logging::{StructuredLogger, get_logger};

/// Seconds the API keeps retrying a command against a sleeping vehicle
const COMMAND_RETRY_DURATION_SECS: u32 = 40;

/// Tessie API client over HTTPS with bearer-token auth
pub struct TessieClient {
    http: Client,
    base_url: String,
    access_token: String,
    logger: StructuredLogger,
}

impl TessieClient {
    /// Create a client with its own HTTP connection pool
    pub fn new(base_url: &str, access_token: String, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| BridgeError::config(format!("building HTTP client: {}", e)))?;
        Ok(Self::from_reqwest(base_url, access_token, http))
    }

    /// Create a client sharing an existing `reqwest::Client`
    pub fn from_reqwest(base_url: &str, access_token: String, http: Client) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            logger: get_logger("tessie"),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.trim())
    }

    fn user_agent() -> String {
        format!("tessie-bridge/{}", env!("APP_VERSION"))
    }

    async fn post_command(&self, vin: &str, name: &str, extra: &[(&str, String)]) -> Result<()> {
        let url = format!("{}/{}/command/{}", self.base_url, vin, name);
        let mut query: Vec<(&str, String)> = vec![
            ("wait_for_completion", "true".to_string()),
            ("retry_duration", COMMAND_RETRY_DURATION_SECS.to_string()),
        ];
        query.extend(extra.iter().cloned());

        self.logger.debug(&format!("POST {} {:?}", url, query));
        let resp = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, Self::user_agent())
            .query(&query)
            .send()
            .await?;

        let body: CommandResponse = Self::check_status(resp).await?.json().await?;
        if !body.result {
            let reason = body.reason.unwrap_or_else(|| "command rejected".to_string());
            self.logger
                .warn(&format!("Command {} for {} failed: {}", name, vin, reason));
            return Err(BridgeError::api(format!("{} failed: {}", name, reason)));
        }
        self.logger.info(&format!("Command {} sent to {}", name, vin));
        Ok(())
    }

    async fn check_status(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let url = resp.url().to_string();
        let text = resp.text().await.unwrap_or_default();
        let msg = if text.is_empty() {
            format!("HTTP {} from {}", status, url)
        } else {
            format!("HTTP {} from {}: {}", status, url, text)
        };
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BridgeError::auth(msg),
            _ => BridgeError::api(msg),
        })
    }
}

#[async_trait::async_trait]
impl TessieApi for TessieClient {
    async fn get_state_of_all_vehicles(&self, only_active: bool) -> Result<Value> {
        let url = format!("{}/vehicles", self.base_url);
        self.logger.debug(&format!("GET {}", url));
        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.bearer())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, Self::user_agent())
            .query(&[("only_active", only_active)])
            .send()
            .await?;
        let body: Value = Self::check_status(resp).await?.json().await?;
        Ok(body)
    }

    async fn send_command(&self, vin: &str, command: VehicleCommand) -> Result<()> {
        self.post_command(vin, command.as_str(), &[]).await
    }

    async fn set_charging_amps(&self, vin: &str, amps: f64) -> Result<()> {
        if !amps.is_finite() || amps < 0.0 {
            return Err(BridgeError::validation(
                "amps".to_string(),
                format!("invalid amperage {}", amps),
            ));
        }
        // The API accepts whole amperes only
        let amps = amps.round() as u32;
        self.post_command(vin, "set_charging_amps", &[("amps", amps.to_string())])
            .await
    }
}
