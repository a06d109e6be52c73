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

//! Validation of configuration documents into router snapshots.

use crate::config::document::{RouteSpec, RoutingConfigDocument};
use crate::error::ConfigurationError;
use crate::routing::{Route, RouteFactory, RouterConfig};
use std::time::Duration;

/// Major schema version this parser understands.
pub const SUPPORTED_SCHEMA_MAJOR: u32 = 1;

/// First minor version that accepts route metadata (priority, time-to-live).
const ROUTE_METADATA_MIN_MINOR: u32 = 1;

/// Result of validating one document. Only ever produced whole.
#[derive(Clone, Debug)]
pub struct ParsedConfig {
    pub router_config: RouterConfig,
    /// Store-wide message time-to-live, when the document sets one.
    pub store_time_to_live: Option<Duration>,
}

/// `major[.minor]` of a schema version string.
pub fn parse_schema_version(version: &str) -> Result<(u32, u32), ConfigurationError> {
    let invalid = || ConfigurationError::InvalidSchemaVersion(version.to_string());
    let mut parts = version.trim().split('.');
    let major = parts
        .next()
        .and_then(|part| part.parse::<u32>().ok())
        .ok_or_else(invalid)?;
    let minor = match parts.next() {
        Some(part) => part.parse::<u32>().map_err(|_| invalid())?,
        None => 0,
    };
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok((major, minor))
}

pub struct ConfigParser {
    route_factory: RouteFactory,
    fallback: Option<Route>,
}

impl ConfigParser {
    pub fn new(route_factory: RouteFactory) -> Self {
        Self {
            route_factory,
            fallback: None,
        }
    }

    /// Adds `fallback` to every parsed snapshot.
    pub fn with_fallback(mut self, fallback: Route) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn parse_str(&self, text: &str) -> Result<ParsedConfig, ConfigurationError> {
        self.parse(&RoutingConfigDocument::from_json5(text)?)
    }

    /// Compiles every route of `document`; the first failure rejects the
    /// whole document.
    pub fn parse(
        &self,
        document: &RoutingConfigDocument,
    ) -> Result<ParsedConfig, ConfigurationError> {
        let (major, minor) = parse_schema_version(&document.schema_version)?;
        if major != SUPPORTED_SCHEMA_MAJOR {
            return Err(ConfigurationError::SchemaVersionMismatch {
                expected: SUPPORTED_SCHEMA_MAJOR,
                actual: document.schema_version.clone(),
            });
        }

        let mut routes = Vec::with_capacity(document.routes.len());
        for (id, spec) in &document.routes {
            let route = match spec {
                RouteSpec::Text(text) => self.route_factory.create(id, text)?,
                RouteSpec::Detailed(details) => {
                    if minor < ROUTE_METADATA_MIN_MINOR {
                        return Err(ConfigurationError::UnsupportedRouteSpec {
                            route_id: id.clone(),
                            schema_version: document.schema_version.clone(),
                        });
                    }
                    self.route_factory.create_with_metadata(
                        id,
                        &details.route,
                        details.priority,
                        details.time_to_live_secs,
                    )?
                }
            };
            routes.push(route);
        }

        Ok(ParsedConfig {
            router_config: RouterConfig::new(routes, self.fallback.clone())?,
            store_time_to_live: document
                .store_and_forward_configuration
                .as_ref()
                .map(|config| Duration::from_secs(u64::from(config.time_to_live_secs))),
        })
    }
}
