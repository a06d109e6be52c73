//! Canonical structured event names used across `edge-router`.

// Checkpoint events.
pub const CHECKPOINTER_CREATED: &str = "checkpointer_created";
pub const CHECKPOINT_ADVANCED: &str = "checkpoint_advanced";
pub const CHECKPOINTER_CLOSED: &str = "checkpointer_closed";
pub const CHECKPOINT_COMMIT_FAILED: &str = "checkpoint_commit_failed";

// Endpoint executor events.
pub const EXECUTOR_CREATED: &str = "executor_created";
pub const EXECUTOR_CLOSED: &str = "executor_closed";
pub const EXECUTOR_SEND_ATTEMPT: &str = "executor_send_attempt";
pub const EXECUTOR_SEND_OK: &str = "executor_send_ok";
pub const EXECUTOR_SEND_FAILED: &str = "executor_send_failed";
pub const EXECUTOR_RETRY_SCHEDULED: &str = "executor_retry_scheduled";
pub const EXECUTOR_MESSAGES_DROPPED: &str = "executor_messages_dropped";
pub const EXECUTOR_MESSAGES_EXPIRED: &str = "executor_messages_expired";
pub const EXECUTOR_DEAD: &str = "executor_dead";
pub const EXECUTOR_REVIVED: &str = "executor_revived";
pub const EXECUTOR_ENDPOINT_UPDATED: &str = "executor_endpoint_updated";

// Dispatcher events.
pub const DISPATCH_UNMATCHED: &str = "dispatch_unmatched";
pub const DISPATCH_FAILED: &str = "dispatch_failed";
pub const ENDPOINT_ADD: &str = "endpoint_add";
pub const ENDPOINT_UPDATE: &str = "endpoint_update";
pub const ENDPOINT_REMOVE: &str = "endpoint_remove";
pub const ENDPOINTS_REPLACED: &str = "endpoints_replaced";
pub const DISPATCHER_CLOSED: &str = "dispatcher_closed";

// Router events.
pub const ROUTE_SET: &str = "route_set";
pub const ROUTE_REMOVE: &str = "route_remove";
pub const ROUTES_REPLACED: &str = "routes_replaced";
pub const ROUTER_CLOSED: &str = "router_closed";

// Configuration events.
pub const CONFIG_UPDATE_START: &str = "config_update_start";
pub const CONFIG_UPDATE_OK: &str = "config_update_ok";
pub const CONFIG_UPDATE_FAILED: &str = "config_update_failed";

// Runtime events.
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_LOOP_EXIT: &str = "runtime_loop_exit";
