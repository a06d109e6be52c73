//! Immutable routing configuration snapshot.

use crate::endpoint::Endpoint;
use crate::error::ConfigurationError;
use crate::routing::route::Route;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Endpoints, routes and an optional fallback route.
///
/// A snapshot is never mutated; updates build a new snapshot that replaces the old one
/// wholesale.
#[derive(Clone, Debug, Default)]
pub struct RouterConfig {
    routes: BTreeMap<String, Route>,
    fallback: Option<Route>,
}

impl RouterConfig {
    /// Builds a snapshot, rejecting duplicate route ids.
    pub fn new(
        routes: impl IntoIterator<Item = Route>,
        fallback: Option<Route>,
    ) -> Result<Self, ConfigurationError> {
        let mut by_id = BTreeMap::new();
        for route in routes {
            let id = route.id().to_string();
            if by_id.insert(id.clone(), route).is_some() {
                return Err(ConfigurationError::DuplicateRouteId(id));
            }
        }
        if let Some(fallback) = &fallback {
            if by_id.contains_key(fallback.id()) {
                return Err(ConfigurationError::DuplicateRouteId(
                    fallback.id().to_string(),
                ));
            }
        }

        Ok(Self {
            routes: by_id,
            fallback,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn fallback(&self) -> Option<&Route> {
        self.fallback.as_ref()
    }

    fn all_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values().chain(self.fallback.iter())
    }

    /// Distinct endpoints referenced by any route or the fallback.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoint_priorities().into_keys().collect()
    }

    /// Each referenced endpoint with the distinct, ascending priorities that target it.
    pub fn endpoint_priorities(&self) -> HashMap<Endpoint, Vec<u32>> {
        let mut grouped: HashMap<Endpoint, BTreeSet<u32>> = HashMap::new();
        for route in self.all_routes() {
            grouped
                .entry(route.endpoint().clone())
                .or_default()
                .insert(route.priority());
        }
        grouped
            .into_iter()
            .map(|(endpoint, priorities)| (endpoint, priorities.into_iter().collect()))
            .collect()
    }

    /// Priorities used for one endpoint, empty when nothing references it.
    pub fn priorities_for(&self, endpoint_id: &str) -> Vec<u32> {
        let priorities: BTreeSet<u32> = self
            .all_routes()
            .filter(|route| route.endpoint().id() == endpoint_id)
            .map(Route::priority)
            .collect();
        priorities.into_iter().collect()
    }

    /// New snapshot with `route` added, replacing any route with the same id.
    pub fn with_route(&self, route: Route) -> Self {
        let mut routes = self.routes.clone();
        routes.insert(route.id().to_string(), route);
        Self {
            routes,
            fallback: self.fallback.clone(),
        }
    }

    /// New snapshot without the route `id`.
    pub fn without_route(&self, id: &str) -> Self {
        let mut routes = self.routes.clone();
        routes.remove(id);
        Self {
            routes,
            fallback: self.fallback.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RouterConfig;
    use crate::data_plane::sink_result::SinkResult;
    use crate::endpoint::{
        DeliveryError, Endpoint, EndpointFactory, EndpointKind, EndpointProcessor,
        EndpointReference,
    };
    use crate::error::ConfigurationError;
    use crate::message::Message;
    use crate::routing::route::{Route, DEFAULT_ROUTE_PRIORITY};
    use crate::routing::route_factory::RouteFactory;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Discard;

    #[async_trait]
    impl EndpointProcessor for Discard {
        async fn process(
            &self,
            messages: &[Message],
        ) -> Result<SinkResult<Message>, DeliveryError> {
            Ok(SinkResult::success(messages.to_vec()))
        }
    }

    struct Endpoints;

    impl EndpointFactory for Endpoints {
        fn create_endpoint(
            &self,
            reference: &EndpointReference,
        ) -> Result<Endpoint, ConfigurationError> {
            let kind = EndpointKind::from_reference(reference)?;
            let id = reference.endpoint_id();
            Ok(Endpoint::new(&id, &id, kind, Arc::new(Discard)))
        }
    }

    fn route(id: &str, text: &str, priority: Option<u32>) -> Route {
        RouteFactory::new(Arc::new(Endpoints))
            .create_with_metadata(id, text, priority, None)
            .expect("valid route")
    }

    #[test]
    fn duplicate_route_ids_are_rejected() {
        let result = RouterConfig::new(
            [
                route("r", "FROM /* INTO $upstream", None),
                route("r", "FROM /messages/* INTO $upstream", None),
            ],
            None,
        );
        assert!(matches!(result, Err(ConfigurationError::DuplicateRouteId(id)) if id == "r"));

        let result = RouterConfig::new(
            [route("r", "FROM /* INTO $upstream", None)],
            Some(route("r", "FROM /* INTO $upstream", None)),
        );
        assert!(matches!(result, Err(ConfigurationError::DuplicateRouteId(_))));
    }

    #[test]
    fn priorities_are_grouped_per_endpoint_including_fallback() {
        let config = RouterConfig::new(
            [
                route("a", "FROM /messages/* INTO $upstream", Some(5)),
                route("b", "FROM /messages/* WHERE x = 1 INTO $upstream", Some(1)),
                route("c", "FROM /messages/* INTO $upstream", Some(5)),
                route(
                    "d",
                    "FROM /* INTO BrokeredEndpoint(\"/modules/m/inputs/i\")",
                    None,
                ),
            ],
            Some(route("fallback", "FROM /* INTO $upstream", None)),
        )
        .expect("valid config");

        assert_eq!(
            config.priorities_for("$upstream"),
            vec![1, 5, DEFAULT_ROUTE_PRIORITY]
        );
        assert_eq!(
            config.priorities_for("/modules/m/inputs/i"),
            vec![DEFAULT_ROUTE_PRIORITY]
        );
        assert!(config.priorities_for("missing").is_empty());

        let grouped = config.endpoint_priorities();
        assert_eq!(grouped.len(), 2);
        let mut ids: Vec<String> = config
            .endpoints()
            .iter()
            .map(|endpoint| endpoint.id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["$upstream", "/modules/m/inputs/i"]);
    }

    #[test]
    fn with_and_without_route_leave_the_original_untouched() {
        let original = RouterConfig::new([route("a", "FROM /* INTO $upstream", None)], None)
            .expect("valid config");

        let added = original.with_route(route("b", "FROM /messages/* INTO $upstream", Some(0)));
        let removed = added.without_route("a");

        assert_eq!(original.routes().count(), 1);
        assert_eq!(added.routes().count(), 2);
        assert_eq!(removed.routes().count(), 1);
        assert!(removed.route("a").is_none());
        assert_eq!(removed.priorities_for("$upstream"), vec![0]);
    }
}
