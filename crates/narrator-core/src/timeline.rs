//! Table of contents from measured segment durations

use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{Error, Result};
use crate::text::Section;

/// Offset into the narration, in seconds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Timestamp(pub f64);

impl Timestamp {
    pub fn seconds(self) -> f64 {
        self.0
    }

    /// Whole seconds, sub-second precision dropped.
    pub fn whole_seconds(self) -> u64 {
        if self.0.is_finite() && self.0 > 0.0 {
            self.0.trunc() as u64
        } else {
            0
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.whole_seconds();
        write!(
            f,
            "{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Where a section starts in the output audio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocEntry {
    pub title: Option<String>,
    pub start: Timestamp,
}

impl fmt::Display for TocEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) => write!(f, "{} {}", self.start, title),
            None => write!(f, "{}", self.start),
        }
    }
}

/// One entry per section plus the total playing time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    pub entries: Vec<TocEntry>,
    pub total: Timestamp,
}

impl Timeline {
    /// Entries for sections that carry a heading
    pub fn titled(&self) -> impl Iterator<Item = &TocEntry> {
        self.entries.iter().filter(|entry| entry.title.is_some())
    }
}

/// Walk the sections with a running clock.
///
/// `chunk_counts[i]` is the number of segments section `i` produced and
/// `durations` lists every segment's length in `(section, ordinal)` order.
pub fn build_toc(
    sections: &[Section],
    chunk_counts: &[usize],
    durations: &[f64],
) -> Result<Timeline> {
    if sections.len() != chunk_counts.len() {
        return Err(Error::Timeline(format!(
            "{} sections but {} chunk counts",
            sections.len(),
            chunk_counts.len()
        )));
    }
    let expected: usize = chunk_counts.iter().sum();
    if expected != durations.len() {
        return Err(Error::Timeline(format!(
            "{} chunks but {} measured durations",
            expected,
            durations.len()
        )));
    }

    let mut clock = 0.0;
    let mut remaining = durations;
    let mut entries = Vec::with_capacity(sections.len());

    for (section, &count) in sections.iter().zip(chunk_counts) {
        entries.push(TocEntry {
            title: section.title.clone(),
            start: Timestamp(clock),
        });
        let (own, rest) = remaining.split_at(count);
        clock += own.iter().sum::<f64>();
        remaining = rest;
    }

    Ok(Timeline {
        entries,
        total: Timestamp(clock),
    })
}
