//! Bounded pool of message-handling tasks

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Runs at most `size` handlers at once and waits for them on shutdown
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for a free slot, then run `task` on the runtime
    pub async fn spawn<F>(&self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self.semaphore.clone().acquire_owned().await?;
        tokio::spawn(async move {
            task.await;
            drop(permit);
        });
        Ok(())
    }

    /// Block until every spawned handler has finished, then refuse new work
    pub async fn shutdown(&self) -> Result<()> {
        let permits = u32::try_from(self.size)?;
        let _all = self.semaphore.acquire_many(permits).await?;
        self.semaphore.close();
        Ok(())
    }
}
