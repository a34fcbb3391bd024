//! Loaded config entries and their entities
//!
//! Setting up an entry builds its API client and coordinator, performs the
//! first refresh, instantiates sensors and switches for every vehicle and
//! starts the poll task. Unloading stops the task and drops everything the
//! entry owned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, broadcast, watch};
use tokio::task::JoinHandle;

use crate::api::{ApiFactory, TessieApi};
use crate::config::PollConfig;
use crate::coordinator::{Coordinator, CoordinatorStatus, UpdateEvent};
use crate::entries::ConfigEntry;
use crate::entity::{DeviceInfo, EntityState};
use crate::error::{BridgeError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use crate::sensor::{VIN_SENSOR_KEY, VehicleSensor, build_sensors};
use crate::snapshot::Snapshot;
use crate::switch::{VehicleSwitch, build_switches};

/// Devices and entities created for one entry
#[derive(Default)]
pub struct EntityTable {
    pub devices: Vec<DeviceInfo>,
    pub sensors: Vec<VehicleSensor>,
    pub switches: Vec<Arc<VehicleSwitch>>,
}

impl EntityTable {
    /// Build entities for every vehicle; ids already in `taken` get a suffix
    fn build(
        coordinator: &Arc<Coordinator>,
        snapshot: &Snapshot,
        taken: &mut HashSet<String>,
    ) -> Self {
        let devices = snapshot
            .vehicles()
            .iter()
            .filter_map(DeviceInfo::from_vehicle)
            .collect();

        let mut sensors = build_sensors(snapshot);
        for sensor in &mut sensors {
            sensor.entity_id = claim_entity_id(taken, &sensor.entity_id);
        }
        let mut switches = build_switches(coordinator, snapshot);
        for switch in &mut switches {
            switch.entity_id = claim_entity_id(taken, &switch.entity_id);
        }

        Self {
            devices,
            sensors,
            switches: switches.into_iter().map(Arc::new).collect(),
        }
    }

    fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.sensors
            .iter()
            .map(|s| s.entity_id.as_str())
            .chain(self.switches.iter().map(|s| s.entity_id.as_str()))
    }
}

fn claim_entity_id(taken: &mut HashSet<String>, wanted: &str) -> String {
    if taken.insert(wanted.to_string()) {
        return wanted.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{}_{}", wanted, n);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// One entry that has been set up
pub struct LoadedEntry {
    pub entry: ConfigEntry,
    pub coordinator: Arc<Coordinator>,
    pub entities: EntityTable,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl LoadedEntry {
    fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Where a `set_charging_amps` call for a device goes
pub struct DeviceTarget {
    pub vin: String,
    pub api: Arc<dyn TessieApi>,
}

pub struct IntegrationRegistry {
    factory: Arc<dyn ApiFactory>,
    poll: PollConfig,
    loaded: RwLock<HashMap<String, Arc<LoadedEntry>>>,
    events_tx: broadcast::Sender<UpdateEvent>,
    logger: StructuredLogger,
}

impl IntegrationRegistry {
    pub fn new(factory: Arc<dyn ApiFactory>, poll: PollConfig) -> Self {
        let (events_tx, _rx) = broadcast::channel(256);
        Self {
            factory,
            poll,
            loaded: RwLock::new(HashMap::new()),
            events_tx,
            logger: get_logger("registry"),
        }
    }

    pub fn factory(&self) -> Arc<dyn ApiFactory> {
        Arc::clone(&self.factory)
    }

    /// Set up one entry; a failed first refresh leaves nothing behind
    pub async fn setup_entry(&self, entry: ConfigEntry) -> Result<()> {
        if self.loaded.read().await.contains_key(&entry.entry_id) {
            return Err(BridgeError::validation(
                "entry_id".to_string(),
                format!("entry {} is already loaded", entry.entry_id),
            ));
        }

        let api = self.factory.create(&entry.access_token)?;
        let coordinator = Arc::new(Coordinator::new(
            entry.entry_id.clone(),
            api,
            Duration::from_secs(self.poll.refresh_timeout_secs),
            get_logger_with_context(
                LogContext::new("coordinator").with_entry_id(entry.entry_id.clone()),
            ),
        ));
        coordinator.first_refresh().await?;
        let snapshot = coordinator
            .get()
            .await
            .ok_or_else(|| BridgeError::update_failed("no data after first refresh"))?;

        let mut loaded = self.loaded.write().await;
        if loaded.contains_key(&entry.entry_id) {
            return Err(BridgeError::validation(
                "entry_id".to_string(),
                format!("entry {} is already loaded", entry.entry_id),
            ));
        }

        let mut taken: HashSet<String> = loaded
            .values()
            .flat_map(|l| l.entities.entity_ids().map(str::to_string))
            .collect();
        let entities = EntityTable::build(&coordinator, &snapshot, &mut taken);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poll_task = tokio::spawn(Arc::clone(&coordinator).run(
            Duration::from_secs(self.poll.interval_secs),
            shutdown_rx.clone(),
        ));
        let forward_task = tokio::spawn(forward_updates(
            coordinator.subscribe(),
            self.events_tx.clone(),
            shutdown_rx,
        ));

        self.logger.info(&format!(
            "Entry {} loaded: {} vehicles, {} sensors, {} switches",
            entry.entry_id,
            entities.devices.len(),
            entities.sensors.len(),
            entities.switches.len()
        ));

        loaded.insert(
            entry.entry_id.clone(),
            Arc::new(LoadedEntry {
                entry,
                coordinator,
                entities,
                shutdown_tx,
                tasks: vec![poll_task, forward_task],
            }),
        );
        Ok(())
    }

    /// Stop and forget one entry; `false` when it was not loaded
    pub async fn unload_entry(&self, entry_id: &str) -> bool {
        let removed = self.loaded.write().await.remove(entry_id);
        match removed {
            Some(loaded) => {
                loaded.stop();
                self.logger.info(&format!("Entry {} unloaded", entry_id));
                true
            }
            None => false,
        }
    }

    pub async fn unload_all(&self) {
        let drained: Vec<_> = self.loaded.write().await.drain().collect();
        for (entry_id, loaded) in drained {
            loaded.stop();
            self.logger.info(&format!("Entry {} unloaded", entry_id));
        }
    }

    pub async fn is_loaded(&self, entry_id: &str) -> bool {
        self.loaded.read().await.contains_key(entry_id)
    }

    async fn loaded_entries(&self) -> Vec<Arc<LoadedEntry>> {
        self.loaded.read().await.values().cloned().collect()
    }

    pub async fn coordinator(&self, entry_id: &str) -> Option<Arc<Coordinator>> {
        self.loaded
            .read()
            .await
            .get(entry_id)
            .map(|l| Arc::clone(&l.coordinator))
    }

    pub async fn entry_status(&self, entry_id: &str) -> Option<CoordinatorStatus> {
        let coordinator = self.coordinator(entry_id).await?;
        Some(coordinator.status().await)
    }

    /// Poll one entry now, outside its schedule
    pub async fn refresh_entry(&self, entry_id: &str) -> Result<()> {
        let coordinator = self
            .coordinator(entry_id)
            .await
            .ok_or_else(|| BridgeError::not_found(format!("entry {}", entry_id)))?;
        coordinator.refresh().await
    }

    pub async fn devices(&self) -> Vec<DeviceInfo> {
        self.loaded_entries()
            .await
            .iter()
            .flat_map(|l| l.entities.devices.iter().cloned())
            .collect()
    }

    async fn render<F>(&self, render: F) -> Vec<EntityState>
    where
        F: Fn(&EntityTable, Option<&Snapshot>, bool) -> Vec<EntityState>,
    {
        let mut out = Vec::new();
        for loaded in self.loaded_entries().await {
            let available = loaded.coordinator.status().await.last_update_success;
            let entities = &loaded.entities;
            let states = loaded
                .coordinator
                .with_snapshot(|snapshot| render(entities, snapshot, available))
                .await;
            out.extend(states);
        }
        out
    }

    pub async fn sensor_states(&self) -> Vec<EntityState> {
        self.render(|table, snapshot, available| {
            table
                .sensors
                .iter()
                .map(|s| s.state(snapshot, available))
                .collect()
        })
        .await
    }

    pub async fn switch_states(&self) -> Vec<EntityState> {
        self.render(|table, snapshot, available| {
            table
                .switches
                .iter()
                .map(|s| s.state(snapshot, available))
                .collect()
        })
        .await
    }

    /// Current state of any sensor or switch
    pub async fn entity_state(&self, entity_id: &str) -> Option<EntityState> {
        self.render(|table, snapshot, available| {
            table
                .sensors
                .iter()
                .filter(|s| s.entity_id == entity_id)
                .map(|s| s.state(snapshot, available))
                .chain(
                    table
                        .switches
                        .iter()
                        .filter(|s| s.entity_id == entity_id)
                        .map(|s| s.state(snapshot, available)),
                )
                .collect()
        })
        .await
        .into_iter()
        .next()
    }

    pub async fn switch(&self, entity_id: &str) -> Option<Arc<VehicleSwitch>> {
        self.loaded_entries().await.iter().find_map(|l| {
            l.entities
                .switches
                .iter()
                .find(|s| s.entity_id == entity_id)
                .cloned()
        })
    }

    /// VIN of a device, read from its `vin` sensor, and the API that owns it
    pub async fn device_target(&self, device_id: &str) -> Result<DeviceTarget> {
        for loaded in self.loaded_entries().await {
            let Some(sensor) = loaded.entities.sensors.iter().find(|s| {
                s.device.id == device_id && s.description.translation_key == VIN_SENSOR_KEY
            }) else {
                continue;
            };
            let state = loaded
                .coordinator
                .with_snapshot(|snapshot| sensor.state(snapshot, true))
                .await;
            return match state.state_string() {
                Some(vin) => Ok(DeviceTarget {
                    vin,
                    api: loaded.coordinator.api(),
                }),
                None => Err(BridgeError::not_found(format!(
                    "no VIN known for device {}",
                    device_id
                ))),
            };
        }
        Err(BridgeError::not_found(format!("device {}", device_id)))
    }

    /// Update events from every loaded entry
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.events_tx.subscribe()
    }
}

async fn forward_updates(
    mut rx: broadcast::Receiver<UpdateEvent>,
    tx: broadcast::Sender<UpdateEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::VehicleCommand;
    use serde_json::{Value, json};
    use std::sync::Mutex;

    struct Fleet {
        body: Value,
        commands: Mutex<Vec<(String, VehicleCommand)>>,
    }

    #[async_trait::async_trait]
    impl TessieApi for Fleet {
        async fn get_state_of_all_vehicles(&self, _only_active: bool) -> Result<Value> {
            Ok(self.body.clone())
        }
        async fn send_command(&self, vin: &str, command: VehicleCommand) -> Result<()> {
            self.commands
                .lock()
                .unwrap()
                .push((vin.to_string(), command));
            Ok(())
        }
        async fn set_charging_amps(&self, _vin: &str, _amps: f64) -> Result<()> {
            Ok(())
        }
    }

    struct FleetFactory(Arc<Fleet>);

    impl ApiFactory for FleetFactory {
        fn create(&self, _access_token: &str) -> Result<Arc<dyn TessieApi>> {
            Ok(self.0.clone())
        }
    }

    fn registry(body: Value) -> IntegrationRegistry {
        let api = Arc::new(Fleet {
            body,
            commands: Mutex::new(Vec::new()),
        });
        IntegrationRegistry::new(Arc::new(FleetFactory(api)), PollConfig::default())
    }

    fn vehicle(vin: &str, name: &str) -> Value {
        json!({"vin": vin, "last_state": {
            "display_name": name,
            "charge_state": {"charging_state": "Stopped", "battery_level": 55}
        }})
    }

    #[tokio::test]
    async fn setup_creates_entities_per_vehicle() {
        let reg = registry(json!({"results": [vehicle("V1", "Blue"), vehicle("V2", "Red")]}));
        let entry = ConfigEntry::new("Tessie", "tok");
        let id = entry.entry_id.clone();
        reg.setup_entry(entry).await.unwrap();

        assert!(reg.is_loaded(&id).await);
        assert_eq!(reg.devices().await.len(), 2);
        assert_eq!(reg.sensor_states().await.len(), 104);
        assert_eq!(reg.switch_states().await.len(), 14);

        let level = reg.entity_state("sensor.red_battery_level").await.unwrap();
        assert_eq!(level.state, json!(55));
        assert!(level.available);

        assert!(reg.unload_entry(&id).await);
        assert!(!reg.unload_entry(&id).await);
        assert!(reg.sensor_states().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_names_get_distinct_entity_ids() {
        let reg = registry(json!({"results": [vehicle("V1", "Car"), vehicle("V2", "Car")]}));
        reg.setup_entry(ConfigEntry::new("Tessie", "tok")).await.unwrap();
        assert!(reg.entity_state("sensor.car_vin").await.is_some());
        let second = reg.entity_state("sensor.car_vin_2").await.unwrap();
        assert_eq!(second.state, json!("V2"));
    }

    #[tokio::test]
    async fn device_target_reads_vin_sensor() {
        let reg = registry(json!({"results": [vehicle("5YJ3E1", "Blue")]}));
        reg.setup_entry(ConfigEntry::new("Tessie", "tok")).await.unwrap();
        let target = reg.device_target("tessie_5yj3e1").await.unwrap();
        assert_eq!(target.vin, "5YJ3E1");
        assert!(matches!(
            reg.device_target("tessie_nope").await,
            Err(BridgeError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn empty_fleet_still_loads() {
        let reg = registry(json!({"results": []}));
        reg.setup_entry(ConfigEntry::new("Tessie", "tok")).await.unwrap();
        assert!(reg.devices().await.is_empty());
    }

    #[tokio::test]
    async fn loading_twice_is_rejected() {
        let reg = registry(json!({"results": [vehicle("V1", "Blue")]}));
        let entry = ConfigEntry::new("Tessie", "tok");
        reg.setup_entry(entry.clone()).await.unwrap();
        assert!(reg.setup_entry(entry).await.is_err());
    }

    #[tokio::test]
    async fn switch_writes_are_broadcast() {
        let reg = registry(json!({"results": [vehicle("V1", "Blue")]}));
        reg.setup_entry(ConfigEntry::new("Tessie", "tok")).await.unwrap();
        let mut rx = reg.subscribe();

        let switch = reg.switch("switch.blue_charging_state_switch").await.unwrap();
        switch.turn_on().await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.vin.as_deref(), Some("V1"));
        let state = reg
            .entity_state("switch.blue_charging_state_switch")
            .await
            .unwrap();
        assert_eq!(state.state, json!(true));
    }

    #[test]
    fn claim_suffixes_taken_ids() {
        let mut taken = HashSet::new();
        assert_eq!(claim_entity_id(&mut taken, "sensor.a"), "sensor.a");
        assert_eq!(claim_entity_id(&mut taken, "sensor.a"), "sensor.a_2");
        assert_eq!(claim_entity_id(&mut taken, "sensor.a"), "sensor.a_3");
    }
}
