//! Seams to the configuration source and the message store.

use crate::config::document::RoutingConfigDocument;
use crate::error::ConfigurationError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Provides the desired routing configuration and announces changes to it.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Current configuration, `None` when nothing has been configured yet.
    async fn get_config(&self) -> Result<Option<RoutingConfigDocument>, ConfigurationError>;

    /// Registers the listener notified on every later change. Replaces any
    /// previously registered listener.
    fn set_config_listener(&self, listener: Arc<dyn ConfigListener>);
}

#[async_trait]
pub trait ConfigListener: Send + Sync {
    async fn on_config_updated(&self, document: RoutingConfigDocument);
}

/// Persistent message storage whose retention follows the configuration.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn set_time_to_live(&self, time_to_live: Duration);
}
