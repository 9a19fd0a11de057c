//! Progress bar for stream encryption and decryption.

use indicatif::{ProgressBar, ProgressBarIter, ProgressStyle};
use std::io::Read;

const TEMPLATE: &str = "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Tracks how much of an input file the codec has consumed.
pub struct StreamProgress {
    bar: ProgressBar,
}

impl StreamProgress {
    /// Bar sized to `input_len` bytes, labelled `"{action}: {name}"`.
    #[must_use]
    pub fn new(input_len: u64, action: &str, name: &str) -> Self {
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let bar = ProgressBar::new(input_len).with_style(style);
        bar.set_message(format!("{action}: {name}"));
        Self { bar }
    }

    /// Reader that advances the bar by every byte read through it.
    pub fn wrap_read<R: Read>(&self, reader: R) -> ProgressBarIter<R> {
        self.bar.wrap_read(reader)
    }

    /// Stop the bar and replace its label with `summary`.
    pub fn done(&self, summary: String) {
        self.bar.finish_with_message(summary);
    }

    /// Leave the bar where it stopped.
    pub fn failed(&self) {
        self.bar.abandon();
    }
}
