//! sublist core library
//!
//! This crate provides the core functionality for sublist, a small manager
//! for a single mailing list hosted by Campaign Monitor.
//!
//! # Architecture
//!
//! - **Provider**: authenticated client for the list API, behind [`ListProvider`]
//! - **Store**: optimistic local state that the UI renders
//! - **Sync**: polls the provider after each write until its list catches up
//!
//! The provider's reads are eventually consistent, so the local list is the
//! one shown and the provider is polled until it agrees.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let provider = Arc::new(CreatesendClient::from_config(&config)?);
//! let mut store = Store::new(provider, SyncPolicy::from_config(&config));
//! store.load().await?;
//!
//! if let AddOutcome::Staged(mutation) = store.stage_add("Bob", "bob@x.com")? {
//!     store.commit(mutation);
//! }
//! ```
//!
//! # Modules
//!
//! - `store`: client state and mutations (main entry point)
//! - `models`: subscriber records and the reconciliation predicate
//! - `validation`: add-form rules
//! - `provider`: list provider trait, HTTP client and in-memory fake
//! - `sync`: reconciliation sessions
//! - `metrics`: usage events
//! - `config`: application configuration

pub mod config;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod store;
pub mod sync;
pub mod validation;

pub use config::{Config, Credentials};
pub use metrics::{classify_email, EmailType, MetricEvent, MetricsSink};
pub use models::{Subscriber, SubscriberSet};
pub use provider::{CreatesendClient, ListProvider, MemoryProvider, ProviderError};
pub use store::{AddError, AddOutcome, Conflict, Store};
pub use sync::{Mutation, SessionId, StatusTone, SyncEvent, SyncEventKind, SyncPhase, SyncPolicy};
pub use validation::{validate, ValidationError};
