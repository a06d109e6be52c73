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

//! Delivery watermarks.
//!
//! Each executor lane owns a child checkpointer whose id is derived with
//! [`checkpointer_id`]. Children are created through the
//! [`MasterCheckpointer`], which aggregates them into one stream watermark.

mod checkpointer;
mod master;
mod store;

pub use checkpointer::{Checkpointer, CheckpointerFactory, StoreCheckpointer};
pub use master::MasterCheckpointer;
pub use store::{CheckpointData, CheckpointStore, CheckpointStoreError, InMemoryCheckpointStore};

use crate::routing::DEFAULT_ROUTE_PRIORITY;

/// Offset of a checkpointer that never committed anything.
pub const INVALID_OFFSET: i64 = -1;

/// Checkpointer id of one priority lane of an endpoint.
///
/// The default priority keeps the bare endpoint id so checkpoints written
/// before priorities existed stay valid.
pub fn checkpointer_id(endpoint_id: &str, priority: u32) -> String {
    if priority == DEFAULT_ROUTE_PRIORITY {
        endpoint_id.to_string()
    } else {
        format!("{endpoint_id}_Pri{priority}")
    }
}
