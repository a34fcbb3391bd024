//! Fleet-state polling cache
//!
//! The coordinator owns the last successful [`Snapshot`] for one config
//! entry. A refresh replaces it wholesale; a failed refresh keeps it and
//! reports [`BridgeError::UpdateFailed`]. Switches write optimistic values
//! into the current snapshot through [`Coordinator::update_vehicle`].
//!
//! Ordering note: a switch command awaits the network before its optimistic
//! write is applied. If a poll completes in between, the write lands on the
//! newer snapshot and masks the polled value until the following poll.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast, watch};
use tokio::time::{MissedTickBehavior, interval_at, timeout};

use crate::api::TessieApi;
use crate::error::{BridgeError, Result};
use crate::logging::StructuredLogger;
use crate::snapshot::Snapshot;

/// Why subscribers are being notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Refreshed,
    RefreshFailed,
    Optimistic,
}

/// Notification broadcast to consumers after every state change
#[derive(Debug, Clone, Serialize)]
pub struct UpdateEvent {
    pub entry_id: String,
    pub kind: UpdateKind,
    pub vin: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Health of the polling cache
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorStatus {
    pub last_update_success: bool,
    pub last_error: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
    pub total_refreshes: u64,
    pub failed_refreshes: u64,
}

pub struct Coordinator {
    entry_id: String,
    api: Arc<dyn TessieApi>,
    refresh_timeout: Duration,
    data: RwLock<Option<Snapshot>>,
    status: RwLock<CoordinatorStatus>,
    updates_tx: broadcast::Sender<UpdateEvent>,
    logger: StructuredLogger,
}

impl Coordinator {
    pub fn new(
        entry_id: impl Into<String>,
        api: Arc<dyn TessieApi>,
        refresh_timeout: Duration,
        logger: StructuredLogger,
    ) -> Self {
        let (updates_tx, _rx) = broadcast::channel(64);
        Self {
            entry_id: entry_id.into(),
            api,
            refresh_timeout,
            data: RwLock::new(None),
            status: RwLock::new(CoordinatorStatus::default()),
            updates_tx,
            logger,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn api(&self) -> Arc<dyn TessieApi> {
        Arc::clone(&self.api)
    }

    /// Fetch fleet state and replace the cached snapshot
    pub async fn refresh(&self) -> Result<()> {
        let fetched = match timeout(
            self.refresh_timeout,
            self.api.get_state_of_all_vehicles(true),
        )
        .await
        {
            Ok(Ok(body)) if body.is_object() => Ok(body),
            Ok(Ok(_)) => Err(BridgeError::api("fleet state is not a JSON object")),
            Ok(Err(e)) => Err(e),
            Err(elapsed) => Err(BridgeError::from(elapsed)),
        };

        match fetched {
            Ok(body) => {
                let snapshot = Snapshot::new(body);
                let count = snapshot.vehicles().len();
                *self.data.write().await = Some(snapshot);
                {
                    let mut st = self.status.write().await;
                    st.last_update_success = true;
                    st.last_error = None;
                    st.last_refresh = Some(Utc::now());
                    st.total_refreshes = st.total_refreshes.saturating_add(1);
                }
                self.logger
                    .debug(&format!("Fleet state refreshed ({} vehicles)", count));
                self.notify(UpdateKind::Refreshed, None);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                {
                    let mut st = self.status.write().await;
                    st.last_update_success = false;
                    st.last_error = Some(message.clone());
                    st.total_refreshes = st.total_refreshes.saturating_add(1);
                    st.failed_refreshes = st.failed_refreshes.saturating_add(1);
                }
                self.notify(UpdateKind::RefreshFailed, None);
                Err(BridgeError::update_failed(message))
            }
        }
    }

    /// Refresh performed while setting up an entry; failure aborts setup
    pub async fn first_refresh(&self) -> Result<()> {
        self.refresh().await.map_err(|e| {
            self.logger
                .warn(&format!("Initial fleet refresh failed: {}", e));
            e
        })
    }

    /// Most recent snapshot, `None` before the first successful refresh
    pub async fn get(&self) -> Option<Snapshot> {
        self.data.read().await.clone()
    }

    /// Run `f` against the current snapshot without cloning it
    pub async fn with_snapshot<R>(&self, f: impl FnOnce(Option<&Snapshot>) -> R) -> R {
        let guard = self.data.read().await;
        f(guard.as_ref())
    }

    /// Resolve a dotted path on one vehicle of the current snapshot
    pub async fn vehicle_value(&self, vin: &str, path: &str) -> Option<Value> {
        self.with_snapshot(|s| s.and_then(|s| s.vehicle_value(vin, path)).cloned())
            .await
    }

    /// Mutate one vehicle of the current snapshot in place.
    ///
    /// Returns `false` when there is no snapshot or no vehicle with `vin`.
    pub async fn update_vehicle(&self, vin: &str, f: impl FnOnce(&mut Value)) -> bool {
        let applied = {
            let mut guard = self.data.write().await;
            match guard.as_mut().and_then(|s| s.find_by_vin_mut(vin)) {
                Some(vehicle) => {
                    f(vehicle);
                    true
                }
                None => false,
            }
        };
        if applied {
            self.notify(UpdateKind::Optimistic, Some(vin));
        }
        applied
    }

    pub async fn status(&self) -> CoordinatorStatus {
        self.status.read().await.clone()
    }

    /// Subscribe to update notifications
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.updates_tx.subscribe()
    }

    fn notify(&self, kind: UpdateKind, vin: Option<&str>) {
        // No subscribers is fine
        let _ = self.updates_tx.send(UpdateEvent {
            entry_id: self.entry_id.clone(),
            kind,
            vin: vin.map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    /// Refresh every `period` until `shutdown` flips to `true`.
    ///
    /// The first tick fires one period from now; setup already performed
    /// the initial refresh.
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        self.logger.info(&format!(
            "Polling fleet state every {}s",
            period.as_secs()
        ));
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        self.logger.error(&format!("Scheduled refresh failed: {}", e));
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        self.logger.info("Polling stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::VehicleCommand;
    use crate::logging::get_logger;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        responses: Mutex<Vec<Result<Value>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(mut responses: Vec<Result<Value>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl TessieApi for Scripted {
        async fn get_state_of_all_vehicles(&self, _only_active: bool) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(BridgeError::network("script exhausted")))
        }
        async fn send_command(&self, _vin: &str, _command: VehicleCommand) -> Result<()> {
            Ok(())
        }
        async fn set_charging_amps(&self, _vin: &str, _amps: f64) -> Result<()> {
            Ok(())
        }
    }

    struct Hanging;

    #[async_trait::async_trait]
    impl TessieApi for Hanging {
        async fn get_state_of_all_vehicles(&self, _only_active: bool) -> Result<Value> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!({"results": []}))
        }
        async fn send_command(&self, _vin: &str, _command: VehicleCommand) -> Result<()> {
            Ok(())
        }
        async fn set_charging_amps(&self, _vin: &str, _amps: f64) -> Result<()> {
            Ok(())
        }
    }

    fn fleet(state: &str) -> Value {
        json!({"results": [{"vin": "V1", "last_state": {"charge_state": {"charging_state": state}}}]})
    }

    fn coordinator(api: Arc<dyn TessieApi>) -> Coordinator {
        Coordinator::new("entry", api, Duration::from_secs(10), get_logger("test"))
    }

    #[tokio::test]
    async fn no_data_before_first_refresh() {
        let c = coordinator(Arc::new(Scripted::new(vec![])));
        assert!(c.get().await.is_none());
        assert!(!c.status().await.last_update_success);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let c = coordinator(Arc::new(Scripted::new(vec![
            Ok(fleet("Stopped")),
            Err(BridgeError::network("connection reset")),
        ])));
        c.refresh().await.unwrap();
        let before = c.get().await.unwrap();

        let err = c.refresh().await.unwrap_err();
        assert!(matches!(err, BridgeError::UpdateFailed { .. }));
        assert_eq!(c.get().await.unwrap(), before);

        let st = c.status().await;
        assert!(!st.last_update_success);
        assert!(st.last_error.unwrap().contains("connection reset"));
        assert_eq!(st.failed_refreshes, 1);
    }

    #[tokio::test]
    async fn successful_refresh_clears_error() {
        let c = coordinator(Arc::new(Scripted::new(vec![
            Err(BridgeError::network("down")),
            Ok(fleet("Charging")),
        ])));
        assert!(c.refresh().await.is_err());
        c.refresh().await.unwrap();
        let st = c.status().await;
        assert!(st.last_update_success);
        assert!(st.last_error.is_none());
        assert_eq!(
            c.vehicle_value("V1", "last_state.charge_state.charging_state")
                .await,
            Some(json!("Charging"))
        );
    }

    #[tokio::test]
    async fn non_object_body_is_a_failure() {
        let c = coordinator(Arc::new(Scripted::new(vec![Ok(json!([1, 2]))])));
        assert!(matches!(
            c.refresh().await,
            Err(BridgeError::UpdateFailed { .. })
        ));
        assert!(c.get().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_bounded_by_timeout() {
        let c = coordinator(Arc::new(Hanging));
        let err = c.refresh().await.unwrap_err();
        assert!(matches!(err, BridgeError::UpdateFailed { .. }));
        assert!(c.status().await.last_error.unwrap().contains("Timeout"));
    }

    #[tokio::test]
    async fn optimistic_update_mutates_and_notifies() {
        let c = coordinator(Arc::new(Scripted::new(vec![Ok(fleet("Stopped"))])));
        c.refresh().await.unwrap();
        let mut rx = c.subscribe();

        let applied = c
            .update_vehicle("V1", |v| {
                crate::projection::assign(
                    v,
                    "last_state.charge_state.charging_state",
                    json!("Charging"),
                );
            })
            .await;
        assert!(applied);
        assert_eq!(
            c.vehicle_value("V1", "last_state.charge_state.charging_state")
                .await,
            Some(json!("Charging"))
        );
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, UpdateKind::Optimistic);
        assert_eq!(ev.vin.as_deref(), Some("V1"));

        assert!(!c.update_vehicle("V9", |_| {}).await);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_polls_until_shutdown() {
        let api = Arc::new(Scripted::new(vec![
            Ok(fleet("Stopped")),
            Ok(fleet("Charging")),
        ]));
        let c = Arc::new(coordinator(api.clone()));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&c).run(Duration::from_secs(300), rx));

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(
            c.vehicle_value("V1", "last_state.charge_state.charging_state")
                .await,
            Some(json!("Charging"))
        );
    }
}
