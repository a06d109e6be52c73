/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Applies configuration documents to a running [`Router`].

use crate::config::document::RoutingConfigDocument;
use crate::config::parser::ConfigParser;
use crate::config::source::{ConfigListener, ConfigSource, MessageStore};
use crate::error::RoutingError;
use crate::observability::events;
use crate::routing::{RouteFactory, Router};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

const COMPONENT: &str = "config_updater";

/// Keeps the router and the message store in line with the configuration source.
///
/// A document is applied whole or not at all. A rejected document leaves the
/// previously applied configuration active.
#[derive(Clone)]
pub struct ConfigUpdater {
    inner: Arc<UpdaterInner>,
}

struct UpdaterInner {
    router: Arc<Router>,
    message_store: Arc<dyn MessageStore>,
    parser: ConfigParser,
    // Serializes updates and remembers the last applied document.
    applied: Mutex<Option<RoutingConfigDocument>>,
}

impl ConfigUpdater {
    pub fn new(
        router: Arc<Router>,
        message_store: Arc<dyn MessageStore>,
        route_factory: RouteFactory,
    ) -> Self {
        Self::with_parser(router, message_store, ConfigParser::new(route_factory))
    }

    pub fn with_parser(
        router: Arc<Router>,
        message_store: Arc<dyn MessageStore>,
        parser: ConfigParser,
    ) -> Self {
        Self {
            inner: Arc::new(UpdaterInner {
                router,
                message_store,
                parser,
                applied: Mutex::new(None),
            }),
        }
    }

    /// Applies the source's current configuration, if it has one, and
    /// subscribes to later changes.
    ///
    /// The listener is registered even when the initial document is rejected,
    /// so a corrected document can still be picked up.
    pub async fn init(&self, source: Arc<dyn ConfigSource>) -> Result<(), RoutingError> {
        let initial = source.get_config().await;
        source.set_config_listener(Arc::new(UpdateListener {
            inner: self.inner.clone(),
        }));

        match initial {
            Ok(Some(document)) => self.inner.apply(document).await,
            Ok(None) => {
                debug!(component = COMPONENT, "no initial configuration");
                Ok(())
            }
            Err(err) => {
                error!(
                    event = events::CONFIG_UPDATE_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "reading initial configuration failed"
                );
                Err(err.into())
            }
        }
    }

    pub async fn update(&self, document: RoutingConfigDocument) -> Result<(), RoutingError> {
        self.inner.apply(document).await
    }

    /// Last document that was applied successfully.
    pub async fn applied(&self) -> Option<RoutingConfigDocument> {
        self.inner.applied.lock().await.clone()
    }
}

impl UpdaterInner {
    async fn apply(&self, document: RoutingConfigDocument) -> Result<(), RoutingError> {
        let mut applied = self.applied.lock().await;
        info!(
            event = events::CONFIG_UPDATE_START,
            component = COMPONENT,
            schema_version = %document.schema_version,
            routes = document.routes.len(),
            "applying configuration"
        );

        let parsed = match self.parser.parse(&document) {
            Ok(parsed) => parsed,
            Err(err) => {
                error!(
                    event = events::CONFIG_UPDATE_FAILED,
                    component = COMPONENT,
                    err = %err,
                    "configuration rejected, keeping previous configuration"
                );
                return Err(err.into());
            }
        };

        if let Err(err) = self.router.replace_routes(parsed.router_config).await {
            error!(
                event = events::CONFIG_UPDATE_FAILED,
                component = COMPONENT,
                err = %err,
                "replacing routes failed"
            );
            return Err(err);
        }
        if let Some(time_to_live) = parsed.store_time_to_live {
            self.message_store.set_time_to_live(time_to_live).await;
        }

        info!(
            event = events::CONFIG_UPDATE_OK,
            component = COMPONENT,
            schema_version = %document.schema_version,
            routes = document.routes.len(),
            "configuration applied"
        );
        *applied = Some(document);
        Ok(())
    }
}

struct UpdateListener {
    inner: Arc<UpdaterInner>,
}

#[async_trait]
impl ConfigListener for UpdateListener {
    async fn on_config_updated(&self, document: RoutingConfigDocument) {
        // Failures are logged by `apply`; the previous configuration stays active.
        let _ = self.inner.apply(document).await;
    }
}
