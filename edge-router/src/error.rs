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

//! Error taxonomy shared by the routing, dispatch and checkpoint layers.

use crate::checkpoint::CheckpointStoreError;
use crate::routing::RouteParseError;
use thiserror::Error;

/// Failures surfaced by the routing core to its callers.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("configuration rejected: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("dispatcher is closed")]
    DispatcherClosed,

    #[error("endpoint executor is closed")]
    ExecutorClosed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("endpoint table changed concurrently while updating endpoint '{endpoint_id}'")]
    StructuralRace { endpoint_id: String },

    #[error("checkpoint store failure: {0}")]
    Checkpoint(#[from] CheckpointStoreError),

    #[error("checkpointer '{0}' is closed")]
    CheckpointerClosed(String),
}

impl RoutingError {
    /// Errors caused by an executor going away underneath a dispatch; they
    /// reflect a structural race rather than a per-message failure.
    pub fn is_ignorable_on_dispatch(&self) -> bool {
        matches!(self, RoutingError::ExecutorClosed | RoutingError::Cancelled)
    }
}

/// Configuration failures. A configuration carrying any of these is rejected as a whole.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    RouteParse(#[from] RouteParseError),

    #[error("schema version {actual} is not supported, expected major version {expected}")]
    SchemaVersionMismatch { expected: u32, actual: String },

    #[error("invalid schema version '{0}'")]
    InvalidSchemaVersion(String),

    #[error("route '{route_id}' uses priority/time-to-live which schema version {schema_version} does not support")]
    UnsupportedRouteSpec {
        route_id: String,
        schema_version: String,
    },

    #[error("duplicate route id '{0}'")]
    DuplicateRouteId(String),

    #[error("unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error("invalid configuration document: {0}")]
    InvalidDocument(String),
}
