//! Background worker for retired-segment fsync and close.

use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};

use super::WORK_QUEUE_CAPACITY;

/// A deferred retirement task: fsync then close one retired segment.
pub(crate) type RetirementJob = Box<dyn FnOnce() + Send + 'static>;

/// Runs retirement jobs sequentially, off the writer's critical path.
///
/// The queue is bounded: once [`WORK_QUEUE_CAPACITY`] segments are
/// waiting, submission blocks the writer until the worker catches up.
#[derive(Debug)]
pub(crate) struct Worker {
    queue: Option<SyncSender<RetirementJob>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the consumer thread.
    pub(crate) fn spawn() -> Self {
        let (queue, jobs) = mpsc::sync_channel::<RetirementJob>(WORK_QUEUE_CAPACITY);

        let handle = thread::Builder::new()
            .name("pagelog-retire".to_string())
            .spawn(move || {
                for job in jobs {
                    job();
                }
            })
            .expect("failed to spawn retirement thread");

        Self {
            queue: Some(queue),
            handle: Some(handle),
        }
    }

    /// Enqueue a job, blocking while the queue is full. If the worker
    /// is gone the job runs on the calling thread instead.
    pub(crate) fn submit(&self, job: RetirementJob) {
        match &self.queue {
            Some(queue) => {
                if let Err(mpsc::SendError(job)) = queue.send(job) {
                    job();
                }
            }
            None => job(),
        }
    }

    /// Close the queue and wait for the worker to drain it.
    pub(crate) fn stop(&mut self) {
        self.queue.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}
