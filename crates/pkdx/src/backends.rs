//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Source backends pour raw records out of the backing store. The file one reads the
//! real CSV. The in-memory one pretends, for tests, and is very convincing about it.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls (FileSource, InMemorySource) → SourceBackend enum
//! - Both sources share `RowGate`: skip exactly one header, skip blank lines, skip rows that
//!   don't parse or don't have the header's field count. Log and move on. One bad line
//!   never stops the feed.
//! - Sources do NOT decode pokemon. That's the workers' job. Sources are faucets, not chefs.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{trace, warn};

use crate::codec;
use crate::common::{NUM_OF_ATTRIBUTES, RawRecord};

pub(crate) mod file;
pub(crate) mod in_mem;

pub use file::{FileAppender, FileSource};
pub use in_mem::InMemorySource;

/// 🚰 A source that produces one raw record per call.
///
/// # Contract 📜
/// - `Ok(Some(record))` while rows flow. Header and malformed rows never come out of here.
/// - `Ok(None)` = EOF. The well is dry. 🏁
/// - `Err(..)` = the store itself broke mid-scan (disk gone, handle yanked). Rare. Loud.
#[async_trait]
pub trait Source: std::fmt::Debug + Send {
    async fn next_record(&mut self) -> Result<Option<RawRecord>>;
}

/// 🎭 The many faces of a Source. Callers never need to know if it's disk or RAM.
#[derive(Debug)]
pub enum SourceBackend {
    InMemory(InMemorySource),
    File(FileSource),
}

#[async_trait]
impl Source for SourceBackend {
    async fn next_record(&mut self) -> Result<Option<RawRecord>> {
        match self {
            SourceBackend::InMemory(i) => i.next_record().await,
            SourceBackend::File(f) => f.next_record().await,
        }
    }
}

/// 🚦 What the gate decided about one line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RowVerdict {
    Header,
    Blank,
    Row(RawRecord),
    Skipped,
}

/// 🚦 The bouncer shared by every source. First non-blank line is the header, and its field count
/// becomes the law for every row after it.
#[derive(Debug, Default)]
pub(crate) struct RowGate {
    expected_fields: Option<usize>,
}

impl RowGate {
    /// 🔍 Judge one line. `line_no` is 1-based and only used for logs.
    pub(crate) fn admit(&mut self, line_no: usize, line: &str) -> RowVerdict {
        let line = line.trim_end_matches('\n').trim_end_matches('\r');

        // -- blank lines don't count as anything, not even as the header
        if line.is_empty() {
            return RowVerdict::Blank;
        }

        let Some(expected_fields) = self.expected_fields else {
            // -- 🏷️ the header. we don't care what it says, only how many columns it has
            let width = match codec::parse_line(line) {
                Ok(fields) => fields.len(),
                Err(err) => {
                    warn!("⚠️ header on line {line_no} is malformed ({err}), assuming {NUM_OF_ATTRIBUTES} columns");
                    NUM_OF_ATTRIBUTES
                }
            };
            self.expected_fields = Some(width);
            trace!("🏷️ skipped header on line {line_no} ({width} columns)");
            return RowVerdict::Header;
        };

        match codec::parse_line(line) {
            Ok(fields) if fields.len() == expected_fields => {
                RowVerdict::Row(RawRecord::new(line_no, fields))
            }
            Ok(fields) => {
                warn!(
                    "⚠️ incorrect number of fields on line {line_no}: found {}, expected {expected_fields}. skipping",
                    fields.len()
                );
                RowVerdict::Skipped
            }
            Err(err) => {
                warn!("⚠️ error reading line {line_no}: {err}. skipping");
                RowVerdict::Skipped
            }
        }
    }
}
