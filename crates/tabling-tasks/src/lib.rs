//! Tabling Tasks
//!
//! Asynchronous side of a budget table: persistence requests, keyed
//! cancellation, notifications and the configuration that drives them.
//!
//! # Core Concepts
//!
//! - [`TableController`]: Applies changes to the store, then persists them
//! - [`TableApi`]: Server boundary; failures are [`ApiError`]s
//! - [`TaskRegistry`]: One cancellable task per [`TaskKey`]
//! - [`NotificationBus`]: App-scoped notifications with drop-to-unsubscribe
//! - [`TablingConfig`]: Debounce, history depth, page size and logging
//!
//! # Example
//!
//! ```rust,ignore
//! use tabling_tasks::{init_tracing, NotificationBus, TableController, TablingConfig};
//!
//! let config = TablingConfig::from_toml_str(&std::fs::read_to_string("tabling.toml")?)?;
//! init_tracing(&config);
//!
//! let bus = NotificationBus::new();
//! let mut notifications = bus.subscribe();
//! let controller = TableController::new(api, reducer, bus, config);
//!
//! controller.request();
//! controller.handle_change(DataChangeEvent::single(row, "rate", 10.0, 12.0).into())?;
//! controller.settle().await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod api;
mod config;
mod controller;
mod error;
mod notify;
mod tasks;
mod telemetry;

// Re-exports
pub use api::{
    ApiError, ClassifiedErrors, FieldError, GlobalError, ListQuery, ServerError, ServerErrorBody,
    TableApi,
};
pub use config::{TablingConfig, DEFAULT_SEARCH_DEBOUNCE_MS};
pub use controller::TableController;
pub use error::{ConfigError, TaskError};
pub use notify::{Notification, NotificationBus, NotificationLevel, Subscription, SubscriptionId};
pub use tasks::{TaskKey, TaskRegistry, TaskTicket};
pub use telemetry::init_tracing;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
