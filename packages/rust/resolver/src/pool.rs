//! Bounded extraction pool.
//!
//! The walker submits one job per vertical onto an unbounded queue; a fixed
//! number of worker tasks drain it, each running the blocking extraction on
//! the blocking thread pool. Results carry the vertical's position in the
//! tree, so workers never touch the tree itself. [`ExtractionPool::join`]
//! is the barrier: it closes the queue and returns once every worker has
//! drained it.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use courseforge_convert::TextConverter;
use courseforge_shared::{Block, CourseError, FailedBlock, Result};

use crate::extract::{VerticalJob, extract_or_sentinel};

/// Position of a vertical: (chapter, sequential, vertical) indices.
pub type Slot = (usize, usize, usize);

struct Job {
    slot: Slot,
    vertical: VerticalJob,
}

/// A running pool of extraction workers.
pub struct ExtractionPool {
    jobs: mpsc::UnboundedSender<Job>,
    results: mpsc::UnboundedReceiver<(Slot, Vec<Block>)>,
    workers: Vec<JoinHandle<()>>,
    submitted: usize,
}

impl ExtractionPool {
    /// Start `size` workers (at least one). Must be called inside a tokio runtime.
    pub fn start(size: usize, converter: Arc<dyn TextConverter>, sort_blocks: bool) -> Self {
        let (jobs, job_rx) = mpsc::unbounded_channel::<Job>();
        let (result_tx, results) = mpsc::unbounded_channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = (0..size.max(1))
            .map(|worker| {
                let job_rx = Arc::clone(&job_rx);
                let result_tx = result_tx.clone();
                let converter = Arc::clone(&converter);

                tokio::spawn(async move {
                    let mut done = 0usize;
                    loop {
                        let next = job_rx.lock().await.recv().await;
                        let Some(Job { slot, vertical }) = next else {
                            break;
                        };

                        let label = vertical.label.clone();
                        let converter = Arc::clone(&converter);
                        let blocks = tokio::task::spawn_blocking(move || {
                            extract_or_sentinel(&vertical, converter.as_ref(), sort_blocks)
                        })
                        .await
                        .unwrap_or_else(|e| {
                            warn!(vertical = %label, error = %e, "extraction task aborted");
                            vec![Block::Failed(FailedBlock {
                                message: format!("{label}: extraction task aborted: {e}"),
                            })]
                        });

                        done += 1;
                        if result_tx.send((slot, blocks)).is_err() {
                            break;
                        }
                    }
                    debug!(worker, done, "extraction worker finished");
                })
            })
            .collect();

        Self {
            jobs,
            results,
            workers,
            submitted: 0,
        }
    }

    /// Queue a vertical for extraction.
    pub fn submit(&mut self, slot: Slot, vertical: VerticalJob) -> Result<()> {
        let path = vertical.dir.clone();
        self.jobs
            .send(Job { slot, vertical })
            .map_err(|_| CourseError::Extraction {
                path,
                message: "extraction pool has shut down".into(),
            })?;
        self.submitted += 1;
        Ok(())
    }

    /// Number of jobs submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Close the queue and wait for every worker. `on_result` is called once
    /// per vertical, in completion order.
    pub async fn join(self, mut on_result: impl FnMut(Slot, Vec<Block>)) -> Result<usize> {
        let Self {
            jobs,
            mut results,
            workers,
            submitted,
        } = self;
        drop(jobs);

        let mut received = 0usize;
        while let Some((slot, blocks)) = results.recv().await {
            on_result(slot, blocks);
            received += 1;
        }

        for worker in workers {
            worker
                .await
                .map_err(|e| CourseError::ContentExtractionFailed {
                    message: format!("extraction worker failed: {e}"),
                })?;
        }

        if received != submitted {
            return Err(CourseError::ContentExtractionFailed {
                message: format!("{submitted} verticals queued but {received} extracted"),
            });
        }
        Ok(received)
    }
}
