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

use crate::data_plane::sink_result::SinkResult;
use crate::error::ConfigurationError;
use crate::message::Message;
use async_trait::async_trait;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// System endpoint name for the cloud upstream.
pub const UPSTREAM_ENDPOINT: &str = "$upstream";
/// Function endpoint name that targets a local module input.
pub const BROKERED_ENDPOINT_FUNCTION: &str = "BrokeredEndpoint";

/// Whether a failed send is worth retrying.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DeliveryErrorKind {
    /// Throttling, network loss and similar conditions that may clear up.
    Transient,
    /// The target rejected authorization or no longer exists.
    Permanent,
}

/// Failure raised by an [`EndpointProcessor`] for a whole batch.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{kind:?} delivery failure: {message}")]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub message: String,
}

impl DeliveryError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: DeliveryErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: DeliveryErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == DeliveryErrorKind::Transient
    }
}

/// Endpoint-specific send. Implementations talk to the cloud, a module input or a function.
#[async_trait]
pub trait EndpointProcessor: Send + Sync {
    /// Delivers a batch. Per-item outcomes are reported through the [`SinkResult`];
    /// an `Err` applies to the whole batch.
    async fn process(&self, messages: &[Message]) -> Result<SinkResult<Message>, DeliveryError>;

    /// Releases resources held by the processor.
    async fn close(&self) {}
}

/// Endpoint reference as written after `INTO` in a route rule.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum EndpointReference {
    /// `$name`, e.g. `$upstream`.
    System(String),
    /// `Name("parameter")`, e.g. `BrokeredEndpoint("/modules/m/inputs/i")`.
    Function { name: String, parameter: String },
}

impl EndpointReference {
    /// Canonical endpoint id derived from the reference.
    pub fn endpoint_id(&self) -> String {
        match self {
            EndpointReference::System(name) => name.clone(),
            EndpointReference::Function { name, parameter } => {
                if name.eq_ignore_ascii_case(BROKERED_ENDPOINT_FUNCTION) {
                    parameter.clone()
                } else {
                    format!("{name}({parameter})")
                }
            }
        }
    }
}

impl Display for EndpointReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointReference::System(name) => write!(f, "{name}"),
            EndpointReference::Function { name, parameter } => write!(f, "{name}(\"{parameter}\")"),
        }
    }
}

/// Target-specific part of an endpoint.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum EndpointKind {
    Upstream,
    Module { module_id: String, input: String },
    Function { name: String, parameter: String },
}

impl EndpointKind {
    /// Resolves a rule reference to the endpoint variant it designates.
    pub fn from_reference(reference: &EndpointReference) -> Result<Self, ConfigurationError> {
        match reference {
            EndpointReference::System(name) if name.eq_ignore_ascii_case(UPSTREAM_ENDPOINT) => {
                Ok(EndpointKind::Upstream)
            }
            EndpointReference::System(name) => {
                Err(ConfigurationError::UnknownEndpoint(name.clone()))
            }
            EndpointReference::Function { name, parameter }
                if name.eq_ignore_ascii_case(BROKERED_ENDPOINT_FUNCTION) =>
            {
                parse_module_input(parameter)
                    .ok_or_else(|| ConfigurationError::UnknownEndpoint(reference.to_string()))
            }
            EndpointReference::Function { name, parameter } => Ok(EndpointKind::Function {
                name: name.clone(),
                parameter: parameter.clone(),
            }),
        }
    }
}

/// Parses `/modules/<id>/inputs/<input>`.
fn parse_module_input(path: &str) -> Option<EndpointKind> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some("modules"), Some(module_id), Some("inputs"), Some(input), None)
            if !module_id.is_empty() && !input.is_empty() =>
        {
            Some(EndpointKind::Module {
                module_id: module_id.to_string(),
                input: input.to_string(),
            })
        }
        _ => None,
    }
}

/// [`Endpoint`] is a named delivery destination: identity plus the
/// [`EndpointProcessor`] that performs the send. Equality and hashing use the id only.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use edge_router::{
///     DeliveryError, Endpoint, EndpointKind, EndpointProcessor, Message, SinkResult,
/// };
///
/// struct Upstream;
///
/// #[async_trait]
/// impl EndpointProcessor for Upstream {
///     async fn process(
///         &self,
///         messages: &[Message],
///     ) -> Result<SinkResult<Message>, DeliveryError> {
///         Ok(SinkResult::success(messages.to_vec()))
///     }
/// }
///
/// let endpoint = Endpoint::new("$upstream", "iothub", EndpointKind::Upstream, Arc::new(Upstream));
/// assert_eq!(endpoint.id(), "$upstream");
/// ```
#[derive(Clone)]
pub struct Endpoint {
    id: String,
    name: String,
    kind: EndpointKind,
    processor: Arc<dyn EndpointProcessor>,
}

impl Endpoint {
    pub fn new(
        id: &str,
        name: &str,
        kind: EndpointKind,
        processor: Arc<dyn EndpointProcessor>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            processor,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &EndpointKind {
        &self.kind
    }

    pub fn processor(&self) -> Arc<dyn EndpointProcessor> {
        self.processor.clone()
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Builds endpoints (with their processors) for references found in route rules.
pub trait EndpointFactory: Send + Sync {
    fn create_endpoint(&self, reference: &EndpointReference)
        -> Result<Endpoint, ConfigurationError>;
}

#[cfg(test)]
mod tests {
    use super::{
        DeliveryError, Endpoint, EndpointKind, EndpointProcessor, EndpointReference,
    };
    use crate::data_plane::sink_result::SinkResult;
    use crate::message::Message;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Arc;

    struct NoopProcessor;

    #[async_trait]
    impl EndpointProcessor for NoopProcessor {
        async fn process(
            &self,
            messages: &[Message],
        ) -> Result<SinkResult<Message>, DeliveryError> {
            Ok(SinkResult::success(messages.to_vec()))
        }
    }

    #[test]
    fn brokered_endpoint_reference_resolves_to_module_input() {
        let reference = EndpointReference::Function {
            name: "BrokeredEndpoint".to_string(),
            parameter: "/modules/filter/inputs/input1".to_string(),
        };

        assert_eq!(
            EndpointKind::from_reference(&reference).expect("module endpoint"),
            EndpointKind::Module {
                module_id: "filter".to_string(),
                input: "input1".to_string()
            }
        );
        assert_eq!(reference.endpoint_id(), "/modules/filter/inputs/input1");
    }

    #[test]
    fn malformed_module_path_is_rejected() {
        let reference = EndpointReference::Function {
            name: "BrokeredEndpoint".to_string(),
            parameter: "/modules/filter/outputs/out".to_string(),
        };

        assert!(EndpointKind::from_reference(&reference).is_err());
    }

    #[test]
    fn system_references_other_than_upstream_are_unknown() {
        assert_eq!(
            EndpointKind::from_reference(&EndpointReference::System("$upstream".to_string()))
                .expect("upstream"),
            EndpointKind::Upstream
        );
        assert!(
            EndpointKind::from_reference(&EndpointReference::System("$elsewhere".to_string()))
                .is_err()
        );
    }

    #[test]
    fn endpoints_compare_by_id_only() {
        let a = Endpoint::new("ep", "first", EndpointKind::Upstream, Arc::new(NoopProcessor));
        let b = Endpoint::new(
            "ep",
            "second",
            EndpointKind::Function {
                name: "f".to_string(),
                parameter: "p".to_string(),
            },
            Arc::new(NoopProcessor),
        );

        assert_eq!(a, b);
        let set: HashSet<Endpoint> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
