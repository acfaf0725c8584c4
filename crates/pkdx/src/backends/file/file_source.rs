use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt},
};
use tracing::{debug, trace, warn};

use crate::backends::{RowGate, RowVerdict, Source};
use crate::common::RawRecord;
use crate::errors::{DexError, DexResult};
use crate::progress::ScanProgress;

/// 📂 FileSource: reads the CSV store line by line and hands out `RawRecord`s.
///
/// Think of it like a very diligent intern who reads a CSV top to bottom, skips the header,
/// quietly sets aside the rows that make no sense, and only stops when the file ends.
///
/// 🧵 Async, non-blocking. The BufReader wraps a tokio `File`.
/// 🔒 Owns the file handle. Dropping the source closes it, whichever way the scan ended.
pub struct FileSource {
    buf_reader: io::BufReader<File>,
    path: PathBuf,
    line_no: usize,
    gate: RowGate,
    // -- 📊 progress tracker. hidden by default, still counts.
    progress: ScanProgress,
}

// 🐛 NOTE: progress is intentionally excluded from this Debug impl. Nobody debugging a
// FileSource wants to read a wall of counters.
impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("path", &self.path)
            .field("line_no", &self.line_no)
            .finish()
    }
}

impl FileSource {
    /// 🚀 Opens the store for reading. This is the one failure that is fatal to a run,
    /// so it comes back as a typed `DexError::Io` the caller can match on.
    pub async fn open(path: impl AsRef<Path>, show_progress: bool) -> DexResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file_handle = File::open(&path).await.map_err(|err| {
            warn!("💀 could not open store '{}': {err}", path.display());
            DexError::io(&path, err)
        })?;
        debug!("📂 opened store '{}' for reading", path.display());

        // 📏 grab file size for the progress bar. if metadata fails, 0 = unknown.
        let file_size = file_handle.metadata().await.map(|m| m.len()).unwrap_or(0);
        let progress = ScanProgress::new(path.display().to_string(), file_size, show_progress);

        Ok(Self {
            buf_reader: io::BufReader::new(file_handle),
            path,
            line_no: 0,
            gate: RowGate::default(),
            progress,
        })
    }

    pub(crate) fn rows_skipped(&self) -> u64 {
        self.progress.rows_skipped()
    }
}

#[async_trait]
impl Source for FileSource {
    /// 📄 Next valid row, or `None` at EOF.
    ///
    /// Lines are read as bytes and checked for UTF-8 ourselves, so a line of garbage bytes
    /// is one skipped row instead of an aborted scan.
    async fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let mut line = Vec::with_capacity(256);
        loop {
            line.clear();
            let bytes_read = self
                .buf_reader
                .read_until(b'\n', &mut line)
                .await
                .with_context(|| {
                    format!(
                        "💀 read failed on '{}' after line {}. The disk blinked.",
                        self.path.display(),
                        self.line_no
                    )
                })?;
            if bytes_read == 0 {
                self.progress.finish();
                return Ok(None);
            }

            self.line_no += 1;
            self.progress.record_bytes(bytes_read as u64);

            let Ok(text) = std::str::from_utf8(&line) else {
                warn!("⚠️ line {} of '{}' is not valid UTF-8. skipping", self.line_no, self.path.display());
                self.progress.record_skipped();
                continue;
            };

            match self.gate.admit(self.line_no, text) {
                RowVerdict::Row(record) => {
                    trace!("📖 line {} admitted", self.line_no);
                    self.progress.record_forwarded();
                    return Ok(Some(record));
                }
                RowVerdict::Skipped => self.progress.record_skipped(),
                RowVerdict::Header | RowVerdict::Blank => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store_with(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("💀 temp store");
        file.write_all(contents).expect("💀 temp store write");
        file
    }

    async fn drain(source: &mut FileSource) -> Vec<RawRecord> {
        let mut records = Vec::new();
        while let Some(record) = source.next_record().await.expect("scan should not fail") {
            records.push(record);
        }
        records
    }

    #[tokio::test]
    async fn the_one_where_the_header_is_skipped_and_rows_flow() {
        let store = store_with(
            b"id,number,name,image_url,abilities\n1,1,bulbasaur,img,overgrow\n2,4,charmander,img,\"blaze,solar-power\"\n",
        );
        let mut source = FileSource::open(store.path(), false).await.expect("opens");
        let records = drain(&mut source).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].line, 2);
        assert_eq!(records[0].fields[2], "bulbasaur");
        assert_eq!(records[1].fields[4], "blaze,solar-power");
        assert!(source.next_record().await.expect("eof is sticky").is_none());
    }

    #[tokio::test]
    async fn the_one_where_broken_lines_are_skipped_not_fatal() {
        let mut contents = b"id,number,name,image_url,abilities\n".to_vec();
        contents.extend_from_slice(b"1,1,bulbasaur,img,overgrow\n");
        contents.extend_from_slice(b"2,2,too,few\n");
        contents.extend_from_slice(b"3,3,\"unterminated,img,x\n");
        contents.extend_from_slice(b"4,4,\xff\xfe,img,x\n");
        contents.extend_from_slice(b"\n");
        contents.extend_from_slice(b"5,5,pikachu,img,static");
        let store = store_with(&contents);

        let mut source = FileSource::open(store.path(), false).await.expect("opens");
        let records = drain(&mut source).await;

        let ids: Vec<&str> = records.iter().map(|r| r.fields[0].as_str()).collect();
        assert_eq!(ids, vec!["1", "5"]);
        assert_eq!(source.rows_skipped(), 3);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_file_is_just_eof() {
        let store = store_with(b"");
        let mut source = FileSource::open(store.path(), false).await.expect("opens");
        assert!(drain(&mut source).await.is_empty());
    }

    #[tokio::test]
    async fn the_one_where_a_missing_store_is_a_typed_io_error() {
        let dir = tempfile::tempdir().expect("💀 temp dir");
        let missing = dir.path().join("nope.csv");
        let err = FileSource::open(&missing, false)
            .await
            .expect_err("missing file must not open");
        assert!(matches!(err, DexError::Io { ref path, .. } if path == &missing));
    }
}
