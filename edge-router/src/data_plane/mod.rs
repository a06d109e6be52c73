//! Data-plane layer.
//!
//! Owns per-endpoint delivery: executors with one priority lane per route
//! priority, the retry policy, endpoint health tracking and the result types
//! endpoint processors report back.

pub(crate) mod async_executor;
pub(crate) mod endpoint_executor;
pub(crate) mod health;
pub(crate) mod retry;
pub(crate) mod sink_result;
