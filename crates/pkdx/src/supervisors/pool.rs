//! 🏊 The WorkerPool: registers workers, launches them, and is the ONLY thing allowed
//! to close the result channel.
//!
//! 🧠 Knowledge graph:
//! - Two phases, two types. `WorkerPool` is registration (`add_worker`, `workers`).
//!   `run()` consumes it and hands back a `RunningPool`, so "register after run" doesn't compile.
//! - Every worker task gets its own clone of the result `Sender`. A task that returns, panics,
//!   or gets aborted drops its clone on the way out. The result channel therefore can't close
//!   while any worker still holds a sender, no matter how that worker leaves.
//! - Each task wraps its worker in `catch_unwind`, so a panicking worker still produces a
//!   report (`Faulted`) with its own id on it.
//! - `RunningPool::close()` is the barrier: it joins every task through the `JoinSet`,
//!   then closes the result channel, drops the pool's own sender and fires `done`.
//!   `close` takes `self`, so it happens exactly once.
//! - Workers never see a close handle. They get a `Sender`, and a `Sender` can only send.

use std::panic::AssertUnwindSafe;

use async_channel::{Receiver, Sender};
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::workers::{FilterWorker, Worker, WorkerReport};
use crate::common::{Pokemon, RawRecord};

/// 📋 The registration phase. Nothing is running yet.
#[derive(Debug)]
pub struct WorkerPool<W: Worker = FilterWorker> {
    workers: Vec<W>,
    rx: Receiver<RawRecord>,
    tx: Sender<Pokemon>,
    done: CancellationToken,
}

impl<W: Worker> WorkerPool<W> {
    /// 🏗️ `rx` is the distribution channel, `tx` the result channel, `done` fires after
    /// every worker has terminated and the result channel is closed.
    pub fn new(rx: Receiver<RawRecord>, tx: Sender<Pokemon>, done: CancellationToken) -> Self {
        Self {
            workers: Vec::new(),
            rx,
            tx,
            done,
        }
    }

    pub fn add_worker(&mut self, worker: W) {
        debug!("➕ WorkerPool: added worker {} (quota {})", worker.id(), worker.quota());
        self.workers.push(worker);
    }

    /// 👀 Read-only look at who's registered.
    pub fn workers(&self) -> &[W] {
        &self.workers
    }

    /// 🚀 Spawn one task per worker and return immediately.
    pub fn run(self) -> RunningPool {
        let Self {
            workers,
            rx,
            tx,
            done,
        } = self;

        let mut tasks = JoinSet::new();
        for worker in workers {
            let (id, quota) = (worker.id(), worker.quota());
            let rx = rx.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                debug!("⚙️ WorkerPool: worker {id} has started");
                // -- the worker owns rx/tx. unwinding drops them just like returning does.
                match AssertUnwindSafe(worker.execute(rx, tx)).catch_unwind().await {
                    Ok(report) => {
                        debug!("✅ WorkerPool: worker {id} has completed ({:?})", report.state);
                        report
                    }
                    Err(_) => {
                        warn!("💀 WorkerPool: worker {id} panicked, counting it as completed");
                        WorkerReport::faulted(id, quota)
                    }
                }
            });
            info!("🧵 WorkerPool: worker {id} has been spawned");
        }
        // -- 🔒 the pool keeps no receiver. once the workers are gone, the source can tell.

        RunningPool { tasks, tx, done }
    }
}

/// 🏃 The running phase: a set of in-flight worker tasks and the keys to the result channel.
#[derive(Debug)]
pub struct RunningPool {
    tasks: JoinSet<WorkerReport>,
    tx: Sender<Pokemon>,
    done: CancellationToken,
}

impl RunningPool {
    /// 🔢 How many worker tasks haven't been joined yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// 🏁 Wait for every worker to terminate, then close the result channel and fire `done`.
    ///
    /// Returns one report per launched worker, sorted by worker id. A worker that panicked
    /// shows up as `WorkerState::Faulted`.
    pub async fn close(mut self) -> Vec<WorkerReport> {
        let mut reports = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                // -- unwinds are caught inside the task, so this is a runtime shutdown or abort
                Err(join_err) => warn!("💀 WorkerPool: a worker task was lost: {join_err}"),
            }
        }

        // -- 🔒 every worker is terminal. this is the one and only close.
        self.tx.close();
        drop(self.tx);
        self.done.cancel();
        info!("🏁 WorkerPool: all {} workers completed, result channel closed", reports.len());

        reports.sort_by_key(|report| report.id);
        reports
    }
}
