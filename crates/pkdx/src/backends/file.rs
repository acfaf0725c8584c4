//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The disk was quiet. Too quiet. A CSV of pokemon sat there, minding its business,
//! until someone asked for "the first 3 even ones, 3 per worker" and the whole thing
//! had to be read again from the top. Header and all.
//!
//! This module handles file-based I/O for the dex: `FileSource` reads the store line by
//! line for the filter pipeline and for `Dex::load`, `FileAppender` tacks one row onto the
//! end for the create/catch path. Both hold the file handle only as long as they live.
//! Drop them and the handle goes with them, on every exit path, no `finally` required.
//!
//! 🦆 (mandatory, no notes)

mod file_appender;
mod file_source;

pub use file_appender::FileAppender;
pub use file_source::FileSource;
