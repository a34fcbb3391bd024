//! # Tessie Bridge - vehicle telematics over HTTP
//!
//! Polls the Tessie API for the state of every vehicle on an account and
//! exposes it as sensors and switches, with commands flowing back to the
//! vehicles.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `api`: Tessie HTTP client behind the `TessieApi` trait
//! - `projection`: Dotted-path reads and writes on JSON values
//! - `snapshot`: Fleet-state snapshot and vehicle lookup
//! - `coordinator`: Polling cache with update notifications
//! - `entity`, `sensor`, `switch`: Devices and entity bindings
//! - `services`: The `set_charging_amps` action
//! - `config_flow`: Token validation and entry creation
//! - `entries`: Persisted config entries
//! - `registry`: Setup and unload of loaded entries
//! - `web`: HTTP server and REST API

pub mod api;
pub mod config;
pub mod config_flow;
pub mod coordinator;
pub mod entity;
pub mod entries;
pub mod error;
pub mod logging;
pub mod projection;
pub mod registry;
pub mod sensor;
pub mod services;
pub mod snapshot;
pub mod switch;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::Coordinator;
pub use error::{BridgeError, Result};
pub use registry::IntegrationRegistry;
