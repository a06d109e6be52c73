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

mod integration_test_logging;
pub use integration_test_logging::init_logging;

mod integration_test_messages;
pub use integration_test_messages::{json_telemetry, module_output, telemetry, twin_change};

mod integration_test_processors;
pub use integration_test_processors::{RecordingProcessor, TestEndpointFactory};

mod integration_test_stores;
pub use integration_test_stores::{
    InMemoryConfigSource, InMemoryMessageStore, RecordingCheckpointStore,
};

mod integration_test_utils;
pub use integration_test_utils::{check_offsets_in_order, wait_for};
