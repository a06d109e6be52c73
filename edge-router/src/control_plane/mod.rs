//! Control-plane layer.
//!
//! Owns the dispatcher and its endpoint table. Structural changes (adding,
//! retargeting and removing endpoint executors) are serialized here, while
//! message dispatch reads the table without locking.

pub(crate) mod dispatcher;
pub(crate) mod endpoint_table;
