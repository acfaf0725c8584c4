//! 💀 errors.rs: the catalogue of everything that can go sideways in the dex.
//!
//! 🧠 Knowledge graph:
//! - `DexError` is the typed taxonomy callers actually branch on (404 vs 500 energy).
//! - Everything else in the crate rides `anyhow` with `.context(..)`, same as always.
//!   When a `DexError` travels inside an `anyhow::Error`, callers `downcast_ref` it back out.
//! - `Decode` never escapes the pipeline. Workers swallow it and move on with their lives.

use std::path::PathBuf;

use thiserror::Error;

/// 🏷️ Result alias for store-level operations.
pub type DexResult<T> = Result<T, DexError>;

/// 💀 Things the dex wants you to know about, in increasing order of drama.
#[derive(Debug, Error)]
pub enum DexError {
    /// 📭 The store was never loaded. Like a fridge that was never plugged in.
    #[error("data not initialized")]
    DataNotInitialized,

    /// 🕳️ The store loaded fine, it just has zero rows. Vibes: minimalist.
    #[error("data is empty")]
    EmptyData,

    #[error("pokemon not found: {0}")]
    NotFound(u64),

    #[error("pokemon already exists: {0}")]
    AlreadyExists(u64),

    /// 🔢 The id sequence reached `u64::MAX`. Impressive, honestly.
    #[error("no pokemon ids left to hand out")]
    IdsExhausted,

    /// 🐛 One row that refused to become a pokemon. Skipped, never fatal.
    #[error("malformed record: {0}")]
    Decode(String),

    /// 🚫 The caller handed us numbers that don't add up.
    #[error("invalid filter request: {0}")]
    InvalidRequest(String),

    /// 📂 The backing store said no. Fatal to the run, no partial results.
    #[error("backing store '{path}' is unavailable")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
