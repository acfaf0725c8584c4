//! # Previously, on pkdx...
//!
//! 🎬 The CSV was on a disk somewhere. The test did not want to know where.
//! The test wanted rows. Fast rows. Rows that vanish the moment you blink.
//!
//! `in_mem` provides an in-memory [`Source`] for tests and local experiments. It takes
//! the lines of a pretend CSV (header included) and runs them through the exact same
//! `RowGate` the file source uses, so malformed-row behavior is identical.
//!
//! ✅ No disk I/O. No heartbeat. Just vibes and heap memory.

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;

use crate::backends::{RowGate, RowVerdict, Source};
use crate::common::RawRecord;

/// 📦 The world's most cooperative data source.
#[derive(Debug, Default)]
pub struct InMemorySource {
    lines: VecDeque<String>,
    line_no: usize,
    gate: RowGate,
}

impl InMemorySource {
    /// 🚀 `lines` is the whole pretend file, header first.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            line_no: 0,
            gate: RowGate::default(),
        }
    }

    /// 🏭 A pretend store with a header and ids `1..=count`. Numbers mirror ids, names are boring.
    pub fn with_ids(count: u64) -> Self {
        let header = std::iter::once("id,number,name,image_url,abilities".to_string());
        let rows = (1..=count).map(|id| format!("{id},{id},mon-{id},img-{id}.png,\"run-away,keen-eye\""));
        Self::new(header.chain(rows))
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn next_record(&mut self) -> Result<Option<RawRecord>> {
        while let Some(line) = self.lines.pop_front() {
            self.line_no += 1;
            if let RowVerdict::Row(record) = self.gate.admit(self.line_no, &line) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}
