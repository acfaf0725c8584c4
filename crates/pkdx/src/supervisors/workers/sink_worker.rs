//! 🎬 *[a channel fills with pokemon. somewhere, a sink waits.]*
//!
//! 🗑️ The SinkWorker module: patient, tireless, and deeply unbothered by the chaos
//! happening upstream. It receives pokemon. It pushes pokemon. It asks no questions.
//! It never closes the channel. That is the pool's job, and the sink respects boundaries.

use async_channel::Receiver;
use tracing::debug;

use crate::common::Pokemon;

/// 🗑️ Drains the result channel into a Vec, in whatever order the workers raced them in.
#[derive(Debug)]
pub(crate) struct SinkWorker {
    rx: Receiver<Pokemon>,
}

impl SinkWorker {
    pub(crate) fn new(rx: Receiver<Pokemon>) -> Self {
        Self { rx }
    }

    /// 📥 Keep receiving until the channel is empty AND closed, then hand everything back.
    pub(crate) async fn drain(self) -> Vec<Pokemon> {
        debug!("📥 SinkWorker started draining results...");
        let mut results = Vec::with_capacity(self.rx.capacity().unwrap_or_default());
        loop {
            match self.rx.recv().await {
                Ok(pokemon) => results.push(pokemon),
                Err(_) => {
                    debug!("🏁 SinkWorker: channel closed after {} results", results.len());
                    return results;
                }
            }
        }
    }
}
