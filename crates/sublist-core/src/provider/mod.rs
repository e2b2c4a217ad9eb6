//! List provider access
//!
//! The provider is the authoritative, eventually consistent store of
//! subscribers. Everything else talks to it through [`ListProvider`]:
//!
//! - [`CreatesendClient`]: the real HTTP client; owns the credentials
//! - [`MemoryProvider`]: in-process provider with configurable visibility lag
//!
//! ## Usage
//!
//! ```ignore
//! let provider = CreatesendClient::from_config(&config)?;
//! let subscribers = provider.list_active().await?;
//! ```

mod client;
mod error;
mod memory;
mod message;

use async_trait::async_trait;

use crate::models::{Subscriber, SubscriberSet};

pub use client::CreatesendClient;
pub use error::{ProviderError, ProviderResult};
pub use memory::MemoryProvider;
pub use message::{ActiveSubscribersPage, UpsertRequest, CONSENT_TO_TRACK};

/// Operations offered by the remote list
#[async_trait]
pub trait ListProvider: Send + Sync {
    /// Read every active subscriber on the list
    async fn list_active(&self) -> ProviderResult<SubscriberSet>;

    /// Create or update the subscriber with this email
    ///
    /// Returns the provider's response body unchanged.
    async fn upsert(&self, subscriber: &Subscriber) -> ProviderResult<serde_json::Value>;

    /// Remove the subscriber with this email
    async fn remove(&self, email: &str) -> ProviderResult<()>;
}
