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

//! Routing configuration documents and their application to a running router.

mod document;
mod parser;
mod source;
mod updater;

pub use document::{
    RouteSpec, RouteSpecDetails, RoutingConfigDocument, StoreAndForwardConfiguration,
};
pub use parser::{parse_schema_version, ConfigParser, ParsedConfig, SUPPORTED_SCHEMA_MAJOR};
pub use source::{ConfigListener, ConfigSource, MessageStore};
pub use updater::ConfigUpdater;
