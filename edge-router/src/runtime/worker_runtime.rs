//! Runtime helper for spawning executor delivery loops.

use crate::observability::events;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, Instrument};

const COMPONENT: &str = "worker_runtime";

/// Handle of a spawned delivery loop.
pub(crate) struct DeliveryLoopHandle {
    worker_id: String,
    task: JoinHandle<()>,
}

impl DeliveryLoopHandle {
    pub(crate) fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Waits for the loop to return. A panicked loop is reported, not propagated.
    pub(crate) async fn join(self) {
        if let Err(err) = self.task.await {
            debug!(
                event = events::RUNTIME_LOOP_EXIT,
                component = COMPONENT,
                worker_id = %self.worker_id,
                err = %err,
                "delivery loop ended abnormally"
            );
        }
    }
}

/// Spawns `run_loop` on the ambient tokio runtime inside a span naming the worker.
pub(crate) fn spawn_delivery_loop<Fut>(endpoint_id: &str, run_loop: Fut) -> DeliveryLoopHandle
where
    Fut: Future<Output = ()> + Send + 'static,
{
    let worker_id = format!("{endpoint_id}-{}", uuid::Uuid::new_v4().simple());
    let span = info_span!("delivery_loop", worker_id = %worker_id, endpoint_id = %endpoint_id);
    let task = tokio::spawn(run_loop.instrument(span));
    debug!(
        event = events::RUNTIME_SPAWN_OK,
        component = COMPONENT,
        worker_id = %worker_id,
        "delivery loop spawned"
    );
    DeliveryLoopHandle { worker_id, task }
}

#[cfg(test)]
mod tests {
    use super::spawn_delivery_loop;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn spawned_loop_runs_to_completion() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let handle = spawn_delivery_loop("ep", async move {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(handle.worker_id().starts_with("ep-"));
        handle.join().await;

        assert!(ran.load(Ordering::SeqCst));
    }
}
