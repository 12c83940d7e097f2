//! Progress bar over synthesized segments

use indicatif::{ProgressBar, ProgressStyle};
use narrator_core::{Segment, SynthesisObserver};

const TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})";

/// Advances one step per synthesized segment
pub struct SynthesisProgress {
    bar: ProgressBar,
}

impl SynthesisProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message("Synthesizing");
        Self { bar }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl SynthesisObserver for SynthesisProgress {
    fn planned(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn segment_ready(&self, _segment: &Segment) {
        self.bar.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use narrator_core::text::ChunkId;
    use std::path::PathBuf;

    #[test]
    fn test_counts_segments() {
        let progress = SynthesisProgress::hidden();
        progress.planned(3);
        for ordinal in 0..2 {
            progress.segment_ready(&Segment {
                chunk: ChunkId::new(0, ordinal),
                path: PathBuf::from("x.mp3"),
                duration: None,
            });
        }
        assert_eq!(progress.bar.length(), Some(3));
        assert_eq!(progress.bar.position(), 2);
    }
}
