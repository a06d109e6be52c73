//! Routing layer.
//!
//! Compiles route rules into [`Route`] values, groups them into immutable
//! [`RouterConfig`] snapshots and evaluates messages against the current
//! snapshot in the [`Router`].
//!
//! ```
//! use edge_router::parse_route;
//!
//! let parsed = parse_route(
//!     r#"FROM /messages/modules/sensor/* WHERE temperature > 50 INTO $upstream"#,
//! )
//! .unwrap();
//! assert_eq!(parsed.source.to_string(), "/messages/modules/sensor/*");
//! assert!(parsed.condition.is_some());
//! ```

pub(crate) mod condition;
pub(crate) mod grammar;
pub(crate) mod route;
pub(crate) mod route_factory;
pub(crate) mod router;
pub(crate) mod router_config;

pub use condition::{Builtin, ComparisonOp, Condition, Expr, Truth, Value};
pub use grammar::{parse_route, ParsedRoute, RouteParseError};
pub use route::{Route, RouteResult, RouteSource, DEFAULT_ROUTE_PRIORITY, DEFAULT_TIME_TO_LIVE_SECS};
pub use route_factory::RouteFactory;
pub use router::Router;
pub use router_config::RouterConfig;
