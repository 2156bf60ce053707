use std::future::Future;

use log::{debug, warn};
use tokio::task::JoinHandle;

/// A background activity that is cancelled when its handle goes away
#[derive(Debug)]
pub struct Task {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl Task {
    /// Spawn `future` on the current Tokio runtime
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Spawning {} task", name);

        Self {
            name,
            handle: tokio::spawn(future),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the task to stop at its next suspension point
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Cancel the task and wait until it is gone
    pub async fn join(mut self) {
        self.handle.abort();

        match (&mut self.handle).await {
            Ok(()) => debug!("{} task finished", self.name),
            Err(e) if e.is_cancelled() => debug!("{} task cancelled", self.name),
            Err(e) => warn!("{} task failed: {}", self.name, e),
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
