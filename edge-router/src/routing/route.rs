/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

use crate::endpoint::Endpoint;
use crate::message::{Message, MessageSource};
use crate::routing::condition::Condition;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Priority assigned to routes that carry no explicit priority.
///
/// Sits in the middle of the `u32` range so user priorities can be placed on either side.
pub const DEFAULT_ROUTE_PRIORITY: u32 = 2_000_000_000;

/// Time-to-live of routes that carry none; `0` inherits the store-wide default.
pub const DEFAULT_TIME_TO_LIVE_SECS: u32 = 0;

/// Source filter of a route (`FROM <selector>`).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum RouteSource {
    /// `/*`
    Any,
    /// `/messages/*`: device telemetry and every module output.
    AllTelemetry,
    /// `/messages/modules/*`
    AllModules,
    /// `/messages/modules/<id>/*`
    Module(String),
    /// `/messages/modules/<id>/outputs/<output>`
    ModuleOutput { module_id: String, output: String },
    /// `/twinChangeNotifications`
    TwinChangeNotifications,
}

impl RouteSource {
    /// Parses a `FROM` selector. Returns `None` for unknown selectors.
    pub fn from_selector(selector: &str) -> Option<Self> {
        if selector == "/*" {
            return Some(RouteSource::Any);
        }

        let segments: Vec<&str> = selector.trim_start_matches('/').split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return None;
        }

        let source = match segments.as_slice() {
            [twin] if twin.eq_ignore_ascii_case("twinChangeNotifications") => {
                RouteSource::TwinChangeNotifications
            }
            ["messages"] | ["messages", "*"] => RouteSource::AllTelemetry,
            ["messages", "modules"] | ["messages", "modules", "*"] => RouteSource::AllModules,
            ["messages", "modules", "*", ..] => return None,
            ["messages", "modules", module_id]
            | ["messages", "modules", module_id, "*"]
            | ["messages", "modules", module_id, "outputs"]
            | ["messages", "modules", module_id, "outputs", "*"] => {
                RouteSource::Module(module_id.to_string())
            }
            ["messages", "modules", module_id, "outputs", output] => RouteSource::ModuleOutput {
                module_id: module_id.to_string(),
                output: output.to_string(),
            },
            _ => return None,
        };
        Some(source)
    }

    pub fn matches(&self, source: &MessageSource) -> bool {
        match (self, source) {
            (RouteSource::Any, _) => true,
            (RouteSource::AllTelemetry, source) => source.is_telemetry(),
            (RouteSource::AllModules, MessageSource::ModuleOutput { .. }) => true,
            (RouteSource::Module(expected), MessageSource::ModuleOutput { module_id, .. }) => {
                expected == module_id
            }
            (
                RouteSource::ModuleOutput {
                    module_id: expected_module,
                    output: expected_output,
                },
                MessageSource::ModuleOutput { module_id, output },
            ) => expected_module == module_id && expected_output == output,
            (RouteSource::TwinChangeNotifications, MessageSource::TwinChangeNotification) => true,
            _ => false,
        }
    }
}

impl Display for RouteSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteSource::Any => write!(f, "/*"),
            RouteSource::AllTelemetry => write!(f, "/messages/*"),
            RouteSource::AllModules => write!(f, "/messages/modules/*"),
            RouteSource::Module(module_id) => write!(f, "/messages/modules/{module_id}/*"),
            RouteSource::ModuleOutput { module_id, output } => {
                write!(f, "/messages/modules/{module_id}/outputs/{output}")
            }
            RouteSource::TwinChangeNotifications => write!(f, "/twinChangeNotifications"),
        }
    }
}

/// [`Route`] binds a source filter and condition to a target [`Endpoint`] with
/// a priority and a time-to-live. Routes are immutable once built.
#[derive(Clone, Debug)]
pub struct Route {
    id: String,
    text: String,
    source: RouteSource,
    condition: Condition,
    endpoint: Endpoint,
    priority: u32,
    time_to_live_secs: u32,
}

impl Route {
    pub fn new(
        id: &str,
        text: &str,
        source: RouteSource,
        condition: Condition,
        endpoint: Endpoint,
        priority: u32,
        time_to_live_secs: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            source,
            condition,
            endpoint,
            priority,
            time_to_live_secs,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rule text the route was compiled from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &RouteSource {
        &self.source
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn time_to_live_secs(&self) -> u32 {
        self.time_to_live_secs
    }

    /// Source filter first, then the condition.
    pub fn matches(&self, message: &Message) -> bool {
        self.source.matches(message.source()) && self.condition.matches(message)
    }

    pub fn to_result(&self) -> RouteResult {
        RouteResult::new(self.endpoint.clone(), self.priority, self.time_to_live_secs)
    }
}

/// One matched (endpoint, priority, ttl) triple.
#[derive(Clone, Debug)]
pub struct RouteResult {
    endpoint: Endpoint,
    priority: u32,
    time_to_live_secs: u32,
}

impl RouteResult {
    pub fn new(endpoint: Endpoint, priority: u32, time_to_live_secs: u32) -> Self {
        Self {
            endpoint,
            priority,
            time_to_live_secs,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn time_to_live_secs(&self) -> u32 {
        self.time_to_live_secs
    }
}

impl PartialEq for RouteResult {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint.id() == other.endpoint.id()
            && self.priority == other.priority
            && self.time_to_live_secs == other.time_to_live_secs
    }
}

impl Eq for RouteResult {}

impl Hash for RouteResult {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.endpoint.id().hash(state);
        self.priority.hash(state);
        self.time_to_live_secs.hash(state);
    }
}
