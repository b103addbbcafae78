//! Form Saver - keep web form values across page reloads
//!
//! Core modules:
//! - `config`: Layered option merging (defaults < init < call < trigger)
//! - `field`: Which fields are persisted, and how
//! - `store`: Durable records and one-shot transient messages
//! - `controller`: Save/delete/load orchestration
//! - `dispatch`: Trigger click routing
//! - `lifecycle`: Session init/destroy
//! - `dom`: Page contracts; `memory` (headless) and `web` (browser) implement them

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod dom;
pub mod field;
pub mod lifecycle;
pub mod memory;
pub mod store;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::{Config, Options};
pub use controller::{Controller, DeleteOutcome};
pub use field::FormRecord;
pub use lifecycle::FormSaver;
pub use store::{KeyValueStore, MemoryStore, PersistenceStore, StoreError};
