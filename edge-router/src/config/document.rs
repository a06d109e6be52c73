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

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Desired routing configuration as delivered by the configuration source.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoutingConfigDocument {
    pub schema_version: String,
    #[serde(default)]
    pub routes: BTreeMap<String, RouteSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_and_forward_configuration: Option<StoreAndForwardConfiguration>,
}

/// A route is either bare rule text or rule text with metadata.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum RouteSpec {
    Text(String),
    Detailed(RouteSpecDetails),
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteSpecDetails {
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live_secs: Option<u32>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreAndForwardConfiguration {
    pub time_to_live_secs: u32,
}

impl RouteSpec {
    pub fn route(&self) -> &str {
        match self {
            RouteSpec::Text(text) => text,
            RouteSpec::Detailed(details) => &details.route,
        }
    }
}

impl RoutingConfigDocument {
    /// Parses JSON or JSON5 text.
    pub fn from_json5(text: &str) -> Result<Self, ConfigurationError> {
        json5::from_str(text).map_err(|err| ConfigurationError::InvalidDocument(err.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ConfigurationError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ConfigurationError::InvalidDocument(err.to_string()))
    }
}
