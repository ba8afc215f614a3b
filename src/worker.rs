//! Background execution of scans and plan execution.
//!
//! Each job runs on its own thread and reports through a bounded channel:
//! zero or more throttled [`WorkerMessage::Progress`] messages followed by
//! exactly one finishing message. The caller drains the receiver on its own
//! schedule.

use crate::error::OrganizeError;
use crate::executor::{CancelToken, Executor, OrganizeResult};
use crate::plan::{Plan, ScanOptions};
use crate::progress::{ProgressUpdate, ThrottledSender};
use crate::scanner::Scanner;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Queue depth between a worker and its consumer.
const CHANNEL_CAPACITY: usize = 64;

/// Messages pushed by a background job.
#[derive(Debug)]
pub enum WorkerMessage {
    Progress(ProgressUpdate),
    ScanFinished(Result<Plan, OrganizeError>),
    ExecutionFinished(Box<OrganizeResult>),
}

/// A running background job.
pub struct WorkerHandle {
    pub receiver: Receiver<WorkerMessage>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Drains the channel, handing every progress update to `on_progress`,
    /// and returns the finishing message.
    ///
    /// # Errors
    ///
    /// Returns [`OrganizeError::WorkerLost`] if the worker exits without
    /// sending a finishing message.
    pub fn wait(
        self,
        mut on_progress: impl FnMut(&ProgressUpdate),
    ) -> Result<WorkerMessage, OrganizeError> {
        let mut finished = None;
        for message in self.receiver.iter() {
            match message {
                WorkerMessage::Progress(update) => on_progress(&update),
                other => {
                    finished = Some(other);
                    break;
                }
            }
        }
        if self.handle.join().is_err() {
            return Err(OrganizeError::WorkerLost);
        }
        finished.ok_or(OrganizeError::WorkerLost)
    }
}

/// Scans `root` on a background thread.
pub fn spawn_scan(scanner: Scanner, root: PathBuf, options: ScanOptions) -> WorkerHandle {
    let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
    let handle = thread::spawn(move || {
        let mut progress = ThrottledSender::new(tx.clone(), WorkerMessage::Progress);
        let result = scanner.scan_with_progress(&root, options, &mut progress);
        debug!(root = %root.display(), ok = result.is_ok(), "Scan worker finished");
        let _ = tx.send(WorkerMessage::ScanFinished(result));
    });
    WorkerHandle {
        receiver: rx,
        handle,
    }
}

/// Executes `plan` on a background thread.
///
/// Cancelling `cancel` stops the run at the next move boundary.
pub fn spawn_execute(plan: Plan, cancel: CancelToken) -> WorkerHandle {
    let (tx, rx) = mpsc::sync_channel(CHANNEL_CAPACITY);
    let handle = thread::spawn(move || {
        let mut progress = ThrottledSender::new(tx.clone(), WorkerMessage::Progress);
        let result = Executor::execute(plan, &mut progress, &cancel);
        debug!(moved = result.moved(), "Execution worker finished");
        let _ = tx.send(WorkerMessage::ExecutionFinished(Box::new(result)));
    });
    WorkerHandle {
        receiver: rx,
        handle,
    }
}
