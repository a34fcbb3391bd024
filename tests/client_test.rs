// Integration tests for `TessieClient` using wiremock.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tessie_bridge::BridgeError;
use tessie_bridge::api::{TessieApi, TessieClient, VehicleCommand};

async fn setup() -> (MockServer, TessieClient) {
    let server = MockServer::start().await;
    let client = TessieClient::new(&server.uri(), "tok".to_string(), Duration::from_secs(5))
        .unwrap();
    (server, client)
}

#[tokio::test]
async fn fetches_active_vehicles_with_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .and(query_param("only_active", "true"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"results": [{"vin": "V1"}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let body = client.get_state_of_all_vehicles(true).await.unwrap();
    assert_eq!(body["results"][0]["vin"], "V1");
}

#[tokio::test]
async fn commands_wait_for_completion() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/V1/command/start_charging"))
        .and(query_param("wait_for_completion", "true"))
        .and(query_param("retry_duration", "40"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .send_command("V1", VehicleCommand::StartCharging)
        .await
        .unwrap();
}

#[tokio::test]
async fn set_charging_amps_sends_whole_amperes() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/V1/command/set_charging_amps"))
        .and(query_param("amps", "16"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .mount(&server)
        .await;

    client.set_charging_amps("V1", 16.0).await.unwrap();
}

#[tokio::test]
async fn negative_amps_never_reach_the_api() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.set_charging_amps("V1", -1.0).await.unwrap_err();
    assert!(matches!(err, BridgeError::Validation { .. }));
}

#[tokio::test]
async fn rejected_command_is_an_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/V1/command/lock"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": false, "reason": "vehicle_unavailable"})),
        )
        .mount(&server)
        .await;

    let err = client
        .send_command("V1", VehicleCommand::Lock)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Api { .. }));
    assert!(err.to_string().contains("vehicle_unavailable"));
}

#[tokio::test]
async fn unauthorized_is_an_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.get_state_of_all_vehicles(true).await.unwrap_err();
    assert!(matches!(err, BridgeError::Auth { .. }));
}

#[tokio::test]
async fn server_error_is_an_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/vehicles"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.get_state_of_all_vehicles(true).await.unwrap_err();
    assert!(matches!(err, BridgeError::Api { .. }));
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let client = TessieClient::new(
        "http://127.0.0.1:9",
        "tok".to_string(),
        Duration::from_secs(2),
    )
    .unwrap();
    let err = client.get_state_of_all_vehicles(true).await.unwrap_err();
    assert!(err.is_connectivity());
}
