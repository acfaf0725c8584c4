//! 🎬 *[a raw record slides down the channel. four workers reach for it. one wins.]*
//! *[it has an id of 7. the worker wanted evens. the record is dropped without ceremony.]*
//!
//! ⚖️ The FilterWorker: decode, check parity, forward, count. Repeat until the channel is
//! dry or the quota is full, whichever comes first. Decode errors are swallowed right here
//! at the worker boundary, so one cursed line can't take the batch down with it.
//!
//! 🦆

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use tracing::{debug, trace};

use super::{Worker, WorkerReport, WorkerState};
use crate::common::{Pokemon, RawRecord};
use crate::supervisors::WorkerDescriptor;

/// ⚖️ One worker, one parity, one quota.
#[derive(Debug, Clone)]
pub struct FilterWorker {
    descriptor: WorkerDescriptor,
    state: WorkerState,
    processed: usize,
    accepted: usize,
}

impl FilterWorker {
    pub fn new(descriptor: WorkerDescriptor) -> Self {
        Self {
            descriptor,
            state: WorkerState::Idle,
            processed: 0,
            accepted: 0,
        }
    }

    pub fn descriptor(&self) -> &WorkerDescriptor {
        &self.descriptor
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn report(&self) -> WorkerReport {
        WorkerReport {
            id: self.descriptor.id,
            quota: self.descriptor.quota,
            processed: self.processed,
            accepted: self.accepted,
            state: self.state,
        }
    }
}

#[async_trait]
impl Worker for FilterWorker {
    fn id(&self) -> usize {
        self.descriptor.id
    }

    fn quota(&self) -> usize {
        self.descriptor.quota
    }

    async fn execute(mut self, rx: Receiver<RawRecord>, tx: Sender<Pokemon>) -> WorkerReport {
        let id = self.descriptor.id;
        let quota = self.descriptor.quota;
        self.state = WorkerState::Running;
        debug!("⚙️ worker {id} started processing (quota {quota}, {})", self.descriptor.category);

        if quota == 0 {
            self.state = WorkerState::QuotaMet;
            debug!("🏁 worker {id} finished: nothing to do with a quota of zero");
            return self.report();
        }

        loop {
            let raw = match rx.recv().await {
                Ok(raw) => raw,
                Err(_) => {
                    // -- channel is empty and closed. the source has gone home.
                    self.state = WorkerState::Exhausted;
                    debug!("🏁 worker {id} finished: input channel closed");
                    break;
                }
            };
            self.processed += 1;

            let pokemon = match Pokemon::try_from(&raw) {
                Ok(pokemon) => pokemon,
                Err(err) => {
                    debug!("🐛 worker {id} skipped a record: {err}");
                    continue;
                }
            };

            if !self.descriptor.category.matches(pokemon.id) {
                trace!("worker {id} passed on id {}", pokemon.id);
                continue;
            }

            trace!("✅ worker {id} accepted id {}", pokemon.id);
            if tx.send(pokemon).await.is_err() {
                // -- nobody is draining results anymore. nothing left to do but leave.
                self.state = WorkerState::Exhausted;
                debug!("🏁 worker {id} finished: result channel closed under it");
                break;
            }
            self.accepted += 1;

            if self.accepted >= quota {
                self.state = WorkerState::QuotaMet;
                debug!("🏁 worker {id} finished: reached its quota of {quota}");
                break;
            }
        }

        self.report()
    }
}
