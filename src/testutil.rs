//! Test-only helpers shared across unit test modules.

#![cfg(test)]

use crate::serialize::Postcard;
use crate::stream_graph::ExecutionConfig;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct EmptyUserConfig;

/// A minimal `ExecutionConfig` for tests that don't care about its contents.
pub fn dummy_exec_config() -> ExecutionConfig {
    ExecutionConfig {
        fail_task_on_checkpoint_error: false,
        user_config: Arc::new(Postcard(EmptyUserConfig)),
    }
}
