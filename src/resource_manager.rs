//! Resource management

use crate::error::ExplorerError;

use tokio::sync::{Semaphore, SemaphorePermit};

/// [crate::resource_manager::ResourceManager] bounds the aggregations running at once. Each
/// resource is a Tokio Semaphore.
#[derive(Debug)]
pub struct ResourceManager {
    /// Optional semaphore for histogram memory (bytes).
    memory: Option<Semaphore>,

    /// Optional total memory pool in bytes.
    total_memory: Option<usize>,

    /// Optional semaphore for aggregation tasks.
    tasks: Option<Semaphore>,
}

impl ResourceManager {
    /// Returns a new ResourceManager object.
    pub fn new(memory_limit: Option<usize>, task_limit: Option<usize>) -> Self {
        Self {
            memory: memory_limit.map(Semaphore::new),
            total_memory: memory_limit,
            tasks: task_limit.map(Semaphore::new),
        }
    }

    /// Acquire memory resource.
    pub async fn memory(&self, bytes: usize) -> Result<Option<SemaphorePermit>, ExplorerError> {
        if let Some(total_memory) = self.total_memory {
            if bytes > total_memory {
                return Err(ExplorerError::InsufficientMemory {
                    requested: bytes,
                    total: total_memory,
                });
            };
        };
        optional_acquire(&self.memory, bytes).await
    }

    /// Acquire a task resource.
    pub async fn task(&self) -> Result<Option<SemaphorePermit>, ExplorerError> {
        optional_acquire(&self.tasks, 1).await
    }
}

/// Acquire permits on an optional Semaphore, if present.
async fn optional_acquire(
    sem: &Option<Semaphore>,
    n: usize,
) -> Result<Option<SemaphorePermit>, ExplorerError> {
    let n = n.try_into()?;
    if let Some(sem) = sem {
        sem.acquire_many(n)
            .await
            .map(Some)
            .map_err(|err| err.into())
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::TryAcquireError;

    #[tokio::test]
    async fn no_resource_management() {
        let rm = ResourceManager::new(None, None);
        assert!(rm.memory.is_none());
        assert!(rm.tasks.is_none());
        let m = rm.memory(1).await.unwrap();
        let t = rm.task().await.unwrap();
        assert!(m.is_none());
        assert!(t.is_none());
    }

    #[tokio::test]
    async fn full_resource_management() {
        let rm = ResourceManager::new(Some(10), Some(1));
        let _m = rm.memory(10).await.unwrap();
        let _t = rm.task().await.unwrap();
        assert!(_m.is_some());
        assert!(_t.is_some());
        // Check that there are no more resources (without blocking).
        assert_eq!(
            rm.memory.as_ref().unwrap().try_acquire().err(),
            Some(TryAcquireError::NoPermits)
        );
        assert_eq!(
            rm.tasks.as_ref().unwrap().try_acquire().err(),
            Some(TryAcquireError::NoPermits)
        );
    }

    #[tokio::test]
    async fn permits_released_on_drop() {
        let rm = ResourceManager::new(Some(10), Some(1));
        {
            let _t = rm.task().await.unwrap();
        }
        let t = rm.task().await.unwrap();
        assert!(t.is_some());
    }

    #[tokio::test]
    async fn insufficient_memory() {
        let rm = ResourceManager::new(Some(10), None);
        match rm.memory(11).await.unwrap_err() {
            ExplorerError::InsufficientMemory { requested, total } => {
                assert_eq!(11, requested);
                assert_eq!(10, total);
            }
            err => panic!("unexpected error {err:?}"),
        }
    }
}
