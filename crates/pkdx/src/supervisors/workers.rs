//! 🧵 Workers: the backbone of pkdx, the unsung heroes, the ones who actually read
//! every row while the Supervisor takes all the credit in the sprint retro.
//!
//! 🚀 Three kinds live here:
//! - `SourceWorker`: reads the store, feeds the distribution channel. One per run.
//! - `FilterWorker`: pulls raw records, keeps the ones with the right parity, stops at its quota.
//! - `SinkWorker`: drains the result channel into a Vec. Runs on the caller's task.
//!
//! ⚠️ "If you're reading this, the code review went poorly."

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use serde::Serialize;

use crate::common::{Pokemon, RawRecord};

mod filter_worker;
mod sink_worker;
mod source_worker;

pub use filter_worker::FilterWorker;
pub(crate) use sink_worker::SinkWorker;
pub(crate) use source_worker::SourceWorker;

/// 🏗️ A record-filtering worker, as the pool sees it: an identity and a way to run.
///
/// `execute` consumes the worker. There is no going back to `Running` once it returns.
#[async_trait]
pub trait Worker: Send + 'static {
    fn id(&self) -> usize;

    /// 🎯 How many records this worker may accept before it clocks out.
    fn quota(&self) -> usize;

    /// 🔄 Pull from `rx`, push matches to `tx`, stop when `rx` is drained or the quota is met.
    async fn execute(self, rx: Receiver<RawRecord>, tx: Sender<Pokemon>) -> WorkerReport;
}

/// 🚦 Where a worker is in life.
///
/// `Idle → Running → {Exhausted | QuotaMet}`. `Faulted` is what the pool writes on the
/// tombstone of a task that panicked instead of returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Exhausted,
    QuotaMet,
    Faulted,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkerState::Exhausted | WorkerState::QuotaMet | WorkerState::Faulted
        )
    }
}

/// 📋 What a worker has to say for itself once it's done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub id: usize,
    pub quota: usize,
    /// 📥 raw records pulled off the distribution channel
    pub processed: usize,
    /// ✅ records forwarded to the result channel
    pub accepted: usize,
    pub state: WorkerState,
}

impl WorkerReport {
    pub(crate) fn faulted(id: usize, quota: usize) -> Self {
        Self {
            id,
            quota,
            processed: 0,
            accepted: 0,
            state: WorkerState::Faulted,
        }
    }
}
