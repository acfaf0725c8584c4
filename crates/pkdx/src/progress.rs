//! 📊 progress.rs: "Are we there yet?" Every CSV scan, every time, forever.
//!
//! 🚀 Counts bytes read, rows forwarded to the workers, and rows skipped for being
//! malformed. Optionally draws an indicatif bar. Optionally, because nobody wants a
//! progress bar in their test output or in a per-request pipeline that lasts 4ms.
//!
//! ⚠️ Watching this progress bar will not make it go faster. Science says no.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// 📊 Running tally for one scan of the backing store.
pub(crate) struct ScanProgress {
    /// 🏷️ what are we scanning? shows up in the bar and in the final log line
    source_name: String,
    total_bytes: u64,
    rows_forwarded: u64,
    rows_skipped: u64,
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl std::fmt::Debug for ScanProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ScanProgress")
            .field("source_name", &self.source_name)
            .field("total_bytes", &self.total_bytes)
            .field("rows_forwarded", &self.rows_forwarded)
            .field("rows_skipped", &self.rows_skipped)
            .finish()
    }
}

impl ScanProgress {
    /// 🚀 `total_size` of 0 means "no idea". `visible = false` gives a hidden bar that
    /// still counts, so the numbers are there for the closing log line either way.
    pub(crate) fn new(source_name: String, total_size: u64, visible: bool) -> Self {
        let progress_bar = if visible {
            let bar = ProgressBar::new(total_size);
            // -- 🐛 a bad template only costs us the pretty bar, not the scan
            if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}]") {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        Self {
            source_name,
            total_bytes: 0,
            rows_forwarded: 0,
            rows_skipped: 0,
            progress_bar,
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_bytes(&mut self, bytes: u64) {
        self.total_bytes += bytes;
        self.progress_bar.set_position(self.total_bytes);
    }

    pub(crate) fn record_forwarded(&mut self) {
        self.rows_forwarded += 1;
        self.render();
    }

    pub(crate) fn record_skipped(&mut self) {
        self.rows_skipped += 1;
        self.render();
    }

    pub(crate) fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    /// ✅ Done. Ring the bell. Log the totals whether or not anyone watched the bar.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish_and_clear();
        debug!(
            "🏁 scan of '{}' finished in {:?}: {} bytes, {} rows forwarded, {} rows skipped",
            self.source_name,
            self.start_time.elapsed(),
            format_number(self.total_bytes),
            format_number(self.rows_forwarded),
            format_number(self.rows_skipped),
        );
    }

    fn render(&self) {
        if self.progress_bar.is_hidden() {
            return;
        }
        self.progress_bar.set_message(format!(
            "source: {} | {} rows forwarded | {} skipped",
            self.source_name,
            format_number(self.rows_forwarded),
            format_number(self.rows_skipped)
        ));
    }
}
