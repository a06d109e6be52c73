//! Compiles route rule text plus metadata into immutable [`Route`] values.

use crate::endpoint::EndpointFactory;
use crate::error::ConfigurationError;
use crate::routing::condition::Condition;
use crate::routing::grammar::parse_route;
use crate::routing::route::{Route, DEFAULT_ROUTE_PRIORITY, DEFAULT_TIME_TO_LIVE_SECS};
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "route_factory";

/// Turns `FROM ... [WHERE ...] INTO ...` rules into routes, resolving endpoint
/// references through an [`EndpointFactory`].
#[derive(Clone)]
pub struct RouteFactory {
    endpoint_factory: Arc<dyn EndpointFactory>,
}

impl RouteFactory {
    pub fn new(endpoint_factory: Arc<dyn EndpointFactory>) -> Self {
        Self { endpoint_factory }
    }

    /// Compiles a rule with default priority and time-to-live.
    pub fn create(&self, id: &str, text: &str) -> Result<Route, ConfigurationError> {
        self.create_with_metadata(id, text, None, None)
    }

    /// Compiles a rule. Defaults apply only to absent metadata; an explicit `0` is kept.
    pub fn create_with_metadata(
        &self,
        id: &str,
        text: &str,
        priority: Option<u32>,
        time_to_live_secs: Option<u32>,
    ) -> Result<Route, ConfigurationError> {
        let parsed = parse_route(text)?;
        let endpoint = self.endpoint_factory.create_endpoint(&parsed.endpoint)?;
        let condition = parsed
            .condition
            .map(Condition::new)
            .unwrap_or_else(Condition::always);

        let route = Route::new(
            id,
            text,
            parsed.source,
            condition,
            endpoint,
            priority.unwrap_or(DEFAULT_ROUTE_PRIORITY),
            time_to_live_secs.unwrap_or(DEFAULT_TIME_TO_LIVE_SECS),
        );

        debug!(
            component = COMPONENT,
            route_id = id,
            endpoint_id = route.endpoint().id(),
            priority = route.priority(),
            time_to_live_secs = route.time_to_live_secs(),
            "compiled route"
        );
        Ok(route)
    }
}
