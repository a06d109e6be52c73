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

//! Canonical structured field keys and value-format helpers.

use crate::message::{system_properties, Message};

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const ENDPOINT_ID: &str = "endpoint_id";
pub const PRIORITY: &str = "priority";
pub const CHECKPOINTER_ID: &str = "checkpointer_id";
pub const ROUTE_ID: &str = "route_id";

pub const MSG_ID: &str = "msg_id";
pub const MSG_SOURCE: &str = "msg_source";
pub const OFFSET: &str = "offset";

pub const COUNT: &str = "count";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_EXPIRED: &str = "expired";
pub const REASON_DEAD: &str = "dead";
pub const REASON_RETRIES_EXHAUSTED: &str = "retries_exhausted";
pub const REASON_NON_TRANSIENT: &str = "non_transient";
pub const REASON_CANCELLED: &str = "cancelled";

pub fn format_message_id(message: &Message) -> String {
    message
        .system_property(system_properties::MESSAGE_ID)
        .map(str::to_string)
        .unwrap_or_else(|| NONE.to_string())
}

pub fn format_message_source(message: &Message) -> String {
    message.source().to_string()
}

/// Compact `first..last` offset range of a batch, for batch-level events.
pub fn format_offset_range(messages: &[Message]) -> String {
    match (messages.first(), messages.last()) {
        (Some(first), Some(last)) if messages.len() > 1 => {
            format!("{}..{}", first.offset(), last.offset())
        }
        (Some(only), _) => only.offset().to_string(),
        _ => NONE.to_string(),
    }
}
