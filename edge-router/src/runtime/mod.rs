//! Runtime integration layer.
//!
//! Keeps task spawning in one place so executor code does not depend on how
//! delivery loops are scheduled.

pub(crate) mod worker_runtime;
