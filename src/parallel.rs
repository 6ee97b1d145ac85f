use futures::stream::{self, StreamExt};
use std::future::Future;

/// Executes tasks concurrently with a specified concurrency limit
///
/// Results come back in the order the tasks were given, whatever order they
/// finish in. A failing task does not affect the others.
#[derive(Debug, Clone, Copy)]
pub struct ParallelProcessor {
    max_concurrent: usize,
}

impl ParallelProcessor {
    /// Creates a new parallel processor with the specified concurrency limit
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Concurrency limit
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Runs every task and returns their outputs in input order
    pub async fn process<F, T>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: Future<Output = T>,
    {
        let mut indexed: Vec<(usize, T)> = stream::iter(tasks.into_iter().enumerate())
            .map(|(index, task)| async move { (index, task.await) })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, output)| output).collect()
    }
}
