//! 🚰 SourceWorker: reads the store and pours raw records into the distribution channel.
//!
//! 🧠 Knowledge graph:
//! - One per run. Owns the `SourceBackend` (and so the file handle) and the only `Sender`
//!   of the distribution channel. When this task ends, both drop: the handle is released
//!   and the channel closes exactly once.
//! - Early exit: workers can all hit their quota long before EOF. The source notices two ways:
//!   the pool's `done` token fires after the last worker exits, and `send` fails once every
//!   receiver is gone. Either one ends the scan right there. No stranded sends, no leaked handle.
//! - A read error mid-scan ends the feed and is logged. Workers then drain and exhaust.

use async_channel::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backends::{Source, SourceBackend};
use crate::common::RawRecord;

#[derive(Debug)]
pub(crate) struct SourceWorker {
    source: SourceBackend,
    tx: Sender<RawRecord>,
    done: CancellationToken,
}

impl SourceWorker {
    pub(crate) fn new(source: SourceBackend, tx: Sender<RawRecord>, done: CancellationToken) -> Self {
        Self { source, tx, done }
    }

    /// 🚀 Spawn the scan. Resolves to the number of records forwarded to the workers.
    pub(crate) fn start(self) -> JoinHandle<u64> {
        tokio::spawn(async move {
            let Self {
                mut source,
                tx,
                done,
            } = self;
            let mut forwarded = 0u64;
            debug!("🚰 SourceWorker started reading");

            loop {
                let next = tokio::select! {
                    biased;
                    _ = done.cancelled() => {
                        debug!("🛑 SourceWorker: every worker is done, stopping the scan early");
                        break;
                    }
                    next = source.next_record() => next,
                };

                let record = match next {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        debug!("🏁 SourceWorker: reached end of input");
                        break;
                    }
                    Err(err) => {
                        warn!("💀 SourceWorker: store read failed mid-scan, ending the feed: {err:#}");
                        break;
                    }
                };

                tokio::select! {
                    biased;
                    _ = done.cancelled() => {
                        debug!("🛑 SourceWorker: every worker is done, dropping the record in hand");
                        break;
                    }
                    sent = tx.send(record) => {
                        if sent.is_err() {
                            debug!("🛑 SourceWorker: no workers left to receive, stopping the scan");
                            break;
                        }
                        forwarded += 1;
                    }
                }
            }

            // -- 🔒 release the store before announcing the end of input
            drop(source);
            drop(tx);
            debug!("🚰 SourceWorker closed the distribution channel after {forwarded} records");
            forwarded
        })
    }
}
