use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use super::{FetchFailure, LoadedStatuses, RemoteBlobClient, SaveFailure, SaveReceipt};
use crate::store::StatusEntry;

/// Identifies who asked for a job. `mount` changes every time a view is
/// mounted, so completions meant for a view that is gone can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub mount: u64,
    pub seq: u64,
}

#[derive(Debug)]
pub enum Job {
    Load {
        ticket: Ticket,
    },
    Save {
        ticket: Ticket,
        entries: Vec<StatusEntry>,
        etag: Option<String>,
    },
}

#[derive(Debug)]
pub enum Completion {
    Loaded {
        ticket: Ticket,
        result: Result<LoadedStatuses, FetchFailure>,
    },
    Saved {
        ticket: Ticket,
        result: Result<SaveReceipt, SaveFailure>,
    },
}

impl Completion {
    pub fn ticket(&self) -> Ticket {
        match self {
            Completion::Loaded { ticket, .. } | Completion::Saved { ticket, .. } => *ticket,
        }
    }
}

/// Runs network jobs one at a time, in submission order, off the UI thread.
///
/// Jobs are never cancelled. Dropping the worker closes the job channel; the
/// thread exits after the job it is running (if any) returns.
pub struct BlobWorker {
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    _thread: JoinHandle<()>,
}

impl BlobWorker {
    pub fn spawn(client: RemoteBlobClient) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<Completion>();
        let thread = thread::Builder::new()
            .name("statusboard-blob".into())
            .spawn(move || run(client, job_rx, done_tx))
            .context("spawning blob worker thread")?;
        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            _thread: thread,
        })
    }

    pub fn submit(&self, job: Job) -> Result<()> {
        let sender = self
            .jobs
            .as_ref()
            .context("blob worker already shut down")?;
        sender
            .send(job)
            .map_err(|_| anyhow::anyhow!("blob worker thread has exited"))
    }

    pub fn try_recv(&self) -> Option<Completion> {
        match self.completions.try_recv() {
            Ok(completion) => Some(completion),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                tracing::warn!("blob worker completion channel disconnected");
                None
            }
        }
    }

    /// Blocks until the next completion arrives.
    pub fn recv(&self) -> Option<Completion> {
        self.completions.recv().ok()
    }
}

impl Drop for BlobWorker {
    fn drop(&mut self) {
        self.jobs.take();
    }
}

fn run(client: RemoteBlobClient, jobs: Receiver<Job>, done: Sender<Completion>) {
    for job in jobs.iter() {
        let completion = match job {
            Job::Load { ticket } => {
                let result = client.load();
                if let Err(err) = &result {
                    tracing::warn!(?ticket, %err, "loading statuses failed");
                }
                Completion::Loaded { ticket, result }
            }
            Job::Save {
                ticket,
                entries,
                etag,
            } => {
                let result = client.save(&entries, etag.as_deref());
                match &result {
                    Ok(receipt) => tracing::info!(?ticket, saved = receipt.saved, "statuses uploaded"),
                    Err(err) => tracing::warn!(?ticket, %err, "uploading statuses failed"),
                }
                Completion::Saved { ticket, result }
            }
        };
        if done.send(completion).is_err() {
            break;
        }
    }
    tracing::debug!("blob worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryBlobStore;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[test]
    fn completes_jobs_in_submission_order() -> anyhow::Result<()> {
        let store = Arc::new(MemoryBlobStore::with_body("[]"));
        let worker = BlobWorker::spawn(RemoteBlobClient::new(store.clone(), false))?;
        let first = Ticket { mount: 1, seq: 1 };
        let second = Ticket { mount: 1, seq: 2 };
        let third = Ticket { mount: 1, seq: 3 };

        worker.submit(Job::Load { ticket: first })?;
        worker.submit(Job::Save {
            ticket: second,
            entries: Vec::new(),
            etag: None,
        })?;
        worker.submit(Job::Load { ticket: third })?;

        assert_matches!(
            worker.recv(),
            Some(Completion::Loaded { ticket, result: Ok(_) }) if ticket == first
        );
        assert_matches!(
            worker.recv(),
            Some(Completion::Saved { ticket, result: Ok(_) }) if ticket == second
        );
        let last = worker.recv().expect("third completion");
        assert_eq!(last.ticket(), third);
        Ok(())
    }

    #[test]
    fn failures_come_back_as_completions() -> anyhow::Result<()> {
        let worker = BlobWorker::spawn(RemoteBlobClient::new(
            Arc::new(MemoryBlobStore::new()),
            false,
        ))?;
        let ticket = Ticket { mount: 7, seq: 1 };
        worker.submit(Job::Load { ticket })?;
        assert_matches!(
            worker.recv(),
            Some(Completion::Loaded {
                result: Err(FetchFailure::Status(404)),
                ..
            })
        );
        Ok(())
    }
}
