use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::{
    fs::OpenOptions,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::debug;

use crate::codec;
use crate::common::HEADER;
use crate::errors::{DexError, DexResult};

/// 🖊️ FileAppender: the whole persistence story: append one row, flush, leave.
///
/// Opens the store per call and drops the handle before returning. A brand new (empty)
/// store gets the header first. A store whose last line forgot its newline gets one,
/// so our row doesn't end up glued to the end of somebody else's.
#[derive(Debug, Clone)]
pub struct FileAppender {
    path: PathBuf,
}

impl FileAppender {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 📝 Append one row. The store must already exist; we append, we don't create.
    pub async fn append_row<S: AsRef<str>>(&self, fields: &[S]) -> DexResult<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| DexError::io(&self.path, err))?;

        let len = file
            .metadata()
            .await
            .map_err(|err| DexError::io(&self.path, err))?
            .len();

        let mut payload = String::new();
        if len == 0 {
            payload.push_str(&codec::encode_row(&HEADER));
            payload.push('\n');
        } else {
            // -- 🔍 peek at the last byte. append mode writes at the end no matter where we seek.
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))
                .await
                .map_err(|err| DexError::io(&self.path, err))?;
            file.read_exact(&mut last)
                .await
                .map_err(|err| DexError::io(&self.path, err))?;
            if last[0] != b'\n' {
                payload.push('\n');
            }
        }
        payload.push_str(&codec::encode_row(fields));
        payload.push('\n');

        file.write_all(payload.as_bytes())
            .await
            .map_err(|err| DexError::io(&self.path, err))?;
        file.flush()
            .await
            .map_err(|err| DexError::io(&self.path, err))?;

        debug!("🖊️ appended {} bytes to '{}'", payload.len(), self.path.display());
        Ok(())
    }
}
