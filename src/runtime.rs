//! Runtime abstraction layer for async operations
//!
//! Image fetches are the only work that leaves the render thread. They are
//! spawned through an [`AsyncSpawner`] so the crate does not hard-wire an
//! executor; with the `tokio-runtime` feature the ambient Tokio runtime is
//! used when one is running.

use crate::prelude::{Future, Pin};

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future, or return `None` when no executor is available
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Option<Box<dyn AsyncHandle>>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Spawn a future on the installed runtime
pub fn spawn<F>(future: F) -> Option<Box<dyn AsyncHandle>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Some(spawner) = runtime() else {
        #[cfg(feature = "debug")]
        log::warn!("no async runtime installed, dropping task");
        return None;
    };
    spawner.spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use crate::prelude::{Future, Pin};
        use crate::runtime::{AsyncHandle, AsyncSpawner};
        use ::tokio::runtime::Handle;
        use ::tokio::task::JoinHandle;

        /// Spawns onto whichever Tokio runtime is current at call time
        pub struct TokioSpawner;

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(
                &self,
                future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
            ) -> Option<Box<dyn AsyncHandle>> {
                let handle = Handle::try_current().ok()?;
                Some(Box::new(TokioHandle(handle.spawn(future))))
            }
        }

        struct TokioHandle(JoinHandle<()>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.is_finished()
            }

            fn cancel(&self) {
                self.0.abort();
            }
        }
    }
}

/// Global runtime instance
static RUNTIME: std::sync::OnceLock<Box<dyn AsyncSpawner>> = std::sync::OnceLock::new();

/// Install a specific spawner. Only the first call has an effect.
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) -> bool {
    RUNTIME.set(spawner).is_ok()
}

/// Get the global runtime spawner
pub fn runtime() -> Option<&'static dyn AsyncSpawner> {
    #[cfg(feature = "tokio-runtime")]
    {
        Some(
            RUNTIME
                .get_or_init(|| Box::new(spawners::tokio_impl::TokioSpawner))
                .as_ref(),
        )
    }

    #[cfg(not(feature = "tokio-runtime"))]
    {
        RUNTIME.get().map(|spawner| spawner.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_tokio_spawner() {
        let handle = spawn(async {
            ::tokio::time::sleep(::tokio::time::Duration::from_millis(10)).await;
        })
        .expect("tokio runtime is running");

        assert!(!handle.is_finished());

        ::tokio::time::sleep(::tokio::time::Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[cfg(feature = "tokio-runtime")]
    #[test]
    fn test_spawn_outside_runtime_returns_none() {
        assert!(spawn(async {}).is_none());
    }
}
