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

use edge_router::{Message, MessageSource};

pub fn telemetry(offset: i64) -> Message {
    Message::builder(MessageSource::Telemetry)
        .with_body(format!("telemetry-{offset}").into_bytes())
        .with_offset(offset)
        .build()
}

pub fn json_telemetry(offset: i64, body: serde_json::Value) -> Message {
    Message::builder(MessageSource::Telemetry)
        .with_body(body.to_string().into_bytes())
        .with_system_property(edge_router::system_properties::CONTENT_TYPE, "application/json")
        .with_system_property(edge_router::system_properties::CONTENT_ENCODING, "utf-8")
        .with_offset(offset)
        .build()
}

pub fn module_output(module_id: &str, output: &str, offset: i64) -> Message {
    Message::builder(MessageSource::module_output(module_id, output))
        .with_body(format!("{module_id}/{output}-{offset}").into_bytes())
        .with_offset(offset)
        .build()
}

pub fn twin_change(offset: i64) -> Message {
    Message::builder(MessageSource::TwinChangeNotification)
        .with_offset(offset)
        .build()
}
