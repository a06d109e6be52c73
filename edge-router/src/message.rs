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

//! Immutable inbound message model.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::SystemTime;

/// Offset value carried by messages that were never assigned a store position.
pub const UNASSIGNED_OFFSET: i64 = -1;

/// Well-known system property keys.
pub mod system_properties {
    pub const MESSAGE_ID: &str = "messageId";
    pub const CORRELATION_ID: &str = "correlationId";
    pub const USER_ID: &str = "userId";
    pub const CONTENT_TYPE: &str = "contentType";
    pub const CONTENT_ENCODING: &str = "contentEncoding";
    pub const CONNECTION_DEVICE_ID: &str = "connectionDeviceId";
    pub const CONNECTION_MODULE_ID: &str = "connectionModuleId";
    pub const OUTPUT_NAME: &str = "outputName";
    pub const ENQUEUED_TIME: &str = "enqueuedTime";
}

/// Classification of where a message entered the gateway.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum MessageSource {
    /// Telemetry sent by a device (leaf or edge device itself).
    Telemetry,
    /// Telemetry emitted by a local module on one of its outputs.
    ModuleOutput { module_id: String, output: String },
    /// Reported/desired property change notifications.
    TwinChangeNotification,
    /// Messages originating from the cloud for a device.
    CloudToDevice,
}

impl MessageSource {
    pub fn module_output(module_id: &str, output: &str) -> Self {
        MessageSource::ModuleOutput {
            module_id: module_id.to_string(),
            output: output.to_string(),
        }
    }

    pub fn is_telemetry(&self) -> bool {
        matches!(
            self,
            MessageSource::Telemetry | MessageSource::ModuleOutput { .. }
        )
    }
}

impl Display for MessageSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageSource::Telemetry => write!(f, "/messages"),
            MessageSource::ModuleOutput { module_id, output } => {
                write!(f, "/messages/modules/{module_id}/outputs/{output}")
            }
            MessageSource::TwinChangeNotification => write!(f, "/twinChangeNotifications"),
            MessageSource::CloudToDevice => write!(f, "/c2d"),
        }
    }
}

#[derive(Debug, PartialEq)]
struct MessageInner {
    source: MessageSource,
    body: Vec<u8>,
    properties: HashMap<String, String>,
    system_properties: HashMap<String, String>,
    enqueued_time: SystemTime,
    offset: i64,
}

/// An inbound message. Cloning is cheap and never copies the payload.
///
/// ```
/// use edge_router::{Message, MessageSource};
///
/// let message = Message::builder(MessageSource::Telemetry)
///     .with_body(br#"{"temperature": 42}"#.to_vec())
///     .with_property("alert", "true")
///     .with_offset(7)
///     .build();
///
/// assert_eq!(message.property("alert"), Some("true"));
/// assert_eq!(message.offset(), 7);
/// ```
#[derive(Clone, Debug)]
pub struct Message {
    inner: Arc<MessageInner>,
}

impl Message {
    pub fn builder(source: MessageSource) -> MessageBuilder {
        MessageBuilder::new(source)
    }

    pub fn source(&self) -> &MessageSource {
        &self.inner.source
    }

    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.inner.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.inner.properties.get(key).map(String::as_str)
    }

    pub fn system_properties(&self) -> &HashMap<String, String> {
        &self.inner.system_properties
    }

    /// System property keys are matched ignoring ASCII case.
    pub fn system_property(&self, key: &str) -> Option<&str> {
        self.inner
            .system_properties
            .get(key)
            .or_else(|| {
                self.inner
                    .system_properties
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    pub fn enqueued_time(&self) -> SystemTime {
        self.inner.enqueued_time
    }

    /// Position assigned by the message store, or [`UNASSIGNED_OFFSET`].
    pub fn offset(&self) -> i64 {
        self.inner.offset
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

/// Builder for [`Message`]; the message is frozen once built.
#[derive(Debug)]
pub struct MessageBuilder {
    source: MessageSource,
    body: Vec<u8>,
    properties: HashMap<String, String>,
    system_properties: HashMap<String, String>,
    enqueued_time: Option<SystemTime>,
    offset: i64,
}

impl MessageBuilder {
    fn new(source: MessageSource) -> Self {
        Self {
            source,
            body: Vec::new(),
            properties: HashMap::new(),
            system_properties: HashMap::new(),
            enqueued_time: None,
            offset: UNASSIGNED_OFFSET,
        }
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_system_property(mut self, key: &str, value: &str) -> Self {
        self.system_properties
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_enqueued_time(mut self, enqueued_time: SystemTime) -> Self {
        self.enqueued_time = Some(enqueued_time);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn build(self) -> Message {
        let mut system_properties = self.system_properties;
        if let MessageSource::ModuleOutput { module_id, output } = &self.source {
            system_properties
                .entry(system_properties::CONNECTION_MODULE_ID.to_string())
                .or_insert_with(|| module_id.clone());
            system_properties
                .entry(system_properties::OUTPUT_NAME.to_string())
                .or_insert_with(|| output.clone());
        }

        Message {
            inner: Arc::new(MessageInner {
                source: self.source,
                body: self.body,
                properties: self.properties,
                system_properties,
                enqueued_time: self.enqueued_time.unwrap_or_else(SystemTime::now),
                offset: self.offset,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{system_properties, Message, MessageSource, UNASSIGNED_OFFSET};

    #[test]
    fn module_output_source_populates_connection_properties() {
        let message = Message::builder(MessageSource::module_output("filter", "out1")).build();

        assert_eq!(
            message.system_property(system_properties::CONNECTION_MODULE_ID),
            Some("filter")
        );
        assert_eq!(message.system_property("OUTPUTNAME"), Some("out1"));
        assert_eq!(message.offset(), UNASSIGNED_OFFSET);
    }

    #[test]
    fn clones_share_the_same_payload() {
        let message = Message::builder(MessageSource::Telemetry)
            .with_body(vec![1, 2, 3])
            .build();
        let clone = message.clone();

        assert_eq!(message, clone);
        assert_eq!(clone.body().as_ptr(), message.body().as_ptr());
    }

    #[test]
    fn source_display_uses_route_selector_paths() {
        assert_eq!(
            MessageSource::module_output("m", "o").to_string(),
            "/messages/modules/m/outputs/o"
        );
        assert!(MessageSource::Telemetry.is_telemetry());
        assert!(!MessageSource::TwinChangeNotification.is_telemetry());
    }
}
