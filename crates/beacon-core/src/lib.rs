//! Beacon Core - Domain types, ports and configuration
//!
//! This crate is the hexagonal core of the Beacon telemetry agent:
//! - **Domain values** - `TelemetryRecord`, `Batch`, `Breadcrumb`, `CrashPayload`,
//!   `StoredCrash`, `ProfileVersion`, `UserProfile`
//! - **Port definitions** - Traits for adapters: `ITransport`, `IKeyedDurableStore`,
//!   `IKeyValueStore`, `IErrorHookInstaller`, `IContextProvider`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module holds plain values and the wire format of every payload.
//! Ports define the collaborators the agent talks to; their implementations
//! live in `beacon-store` and `beacon-transport`.

pub mod config;
pub mod domain;
pub mod ports;
