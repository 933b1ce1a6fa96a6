//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the collaborators the agent depends on. Their implementations
//! live in adapter crates (`beacon-store`, `beacon-transport`) or in the
//! agent itself for host-specific hooks.
//!
//! ## Ports Overview
//!
//! - [`ITransport`] - Delivers one structured payload to the ingestion endpoint
//! - [`IKeyedDurableStore`] - Keyed durable storage of opaque records
//! - [`IKeyValueStore`] - Small persisted string values
//! - [`IErrorHookInstaller`] - Host-level uncaught error hooks
//! - [`IContextProvider`] - Device/app metadata merged into every record

pub mod context;
pub mod durable_store;
pub mod error_hooks;
pub mod kv_store;
pub mod transport;

pub use context::IContextProvider;
pub use durable_store::{IKeyedDurableStore, RecordInfo};
pub use error_hooks::{ErrorCallback, IErrorHookInstaller};
pub use kv_store::IKeyValueStore;
pub use transport::ITransport;
