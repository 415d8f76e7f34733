//! Background task spawning with panic isolation.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawn `future` so that a panic inside it is logged instead of unwinding
/// into the runtime. Other tasks keep running.
pub fn spawn_guarded<F>(task: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(task = task, "Background task panicked: {}", reason);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_panic_is_contained() {
        let handle = spawn_guarded("boom", async { panic!("exploded") });
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn test_normal_completion() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        spawn_guarded("ok", async move { flag.store(true, Ordering::SeqCst) })
            .await
            .unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
