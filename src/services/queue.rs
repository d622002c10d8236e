use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Bounded task queue that waits for every task to settle.
///
/// Tasks start in submission order as permits free up. Outcomes come back
/// paired with the submission index since completion order is not
/// guaranteed; a failing task never cancels the others.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TaskQueue {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[instrument(level = "debug", skip(self, tasks), fields(concurrency = self.concurrency))]
    pub async fn settle_all<I, F, T>(&self, tasks: I) -> Vec<(usize, T)>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .enumerate()
            .map(|(index, task)| {
                let permits = Arc::clone(&self.permits);
                async move {
                    // A closed semaphore only happens on drop; run unthrottled then.
                    let _permit = permits.acquire_owned().await.ok();
                    (index, task.await)
                }
            })
            .collect();

        let mut settled = Vec::new();
        while let Some(outcome) = pending.next().await {
            settled.push(outcome);
        }
        settled
    }
}
