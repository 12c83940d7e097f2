//! Size-bounded chunking of section text
//!
//! Each carve-off searches for a split point with a geometric backoff: the
//! candidate end offset shrinks by a quarter per attempt and the split snaps
//! to just after the last separator at or before it. The first candidate
//! whose markup fits under the budget wins. Because the candidate strictly
//! shrinks, a carve-off takes at most `log4/3(budget) + 2` attempts.

use serde::Serialize;
use std::fmt;

use crate::config::NarratorConfig;
use crate::error::{Error, Result};
use crate::text::markup::MarkupTransformer;

/// Position of a chunk within the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ChunkId {
    pub section: usize,
    pub ordinal: usize,
}

impl ChunkId {
    pub fn new(section: usize, ordinal: usize) -> Self {
        Self { section, ordinal }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "section {}, chunk {}", self.section, self.ordinal)
    }
}

/// One synthesis request worth of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: ChunkId,
    /// Raw span of the section this chunk covers
    pub text: String,
    /// SSML sent to the speech service
    pub markup: String,
}

/// Result of a single carve-off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carve {
    pub markup: String,
    /// Bytes of raw text consumed
    pub consumed: usize,
    /// Candidate offsets tried before one fit
    pub attempts: usize,
}

/// Carves section text into budget-respecting markup chunks
#[derive(Debug, Clone)]
pub struct BlockChunker {
    markup: MarkupTransformer,
    separator: char,
    budget: usize,
}

impl BlockChunker {
    pub fn new(config: &NarratorConfig) -> Result<Self> {
        if config.block.length == 0 {
            return Err(Error::Config("block.length must be positive".into()));
        }
        Ok(Self {
            markup: MarkupTransformer::new(config),
            separator: config.block.separator,
            budget: config.block.length,
        })
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Carve one prefix off `text`.
    ///
    /// Returns `Ok(None)` when no non-empty prefix fits the budget, which
    /// happens when the candidate offset collapses to zero.
    pub fn carve(&self, text: &str) -> Result<Option<Carve>> {
        let mut end = self.budget;
        let mut attempts = 0;

        loop {
            end -= end.div_ceil(4);
            attempts += 1;

            let split = self.split_point(text, end);
            if split == 0 {
                return Ok(None);
            }

            let markup = self.markup.transform(&text[..split])?;
            if markup.len() < self.budget {
                return Ok(Some(Carve {
                    markup,
                    consumed: split,
                    attempts,
                }));
            }
            if end == 0 {
                return Ok(None);
            }
        }
    }

    /// Lazily carve `text` until it is consumed.
    pub fn chunks<'a>(&'a self, section: usize, text: &'a str) -> Chunks<'a> {
        Chunks {
            chunker: self,
            section,
            text,
            offset: 0,
            stalled: false,
        }
    }

    /// Carve a whole section into numbered chunks.
    pub fn chunk_section(&self, section: usize, content: &str) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        let mut offset = 0;

        for (ordinal, carve) in self.chunks(section, content).enumerate() {
            let carve = carve?;
            chunks.push(Chunk {
                id: ChunkId::new(section, ordinal),
                text: content[offset..offset + carve.consumed].to_string(),
                markup: carve.markup,
            });
            offset += carve.consumed;
        }

        Ok(chunks)
    }

    /// Offset just past the last separator starting at or before `end`,
    /// else `end` itself clamped to the text and to a char boundary.
    fn split_point(&self, text: &str, end: usize) -> usize {
        let sep_len = self.separator.len_utf8();
        let window = floor_char_boundary(text, (end + sep_len).min(text.len()));

        match text[..window].rfind(self.separator) {
            Some(index) => index + sep_len,
            None => {
                let end = end.min(text.len());
                match floor_char_boundary(text, end) {
                    0 => ceil_char_boundary(text, end),
                    split => split,
                }
            }
        }
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Iterator over the carve-offs of one section
pub struct Chunks<'a> {
    chunker: &'a BlockChunker,
    section: usize,
    text: &'a str,
    offset: usize,
    stalled: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Result<Carve>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stalled || self.offset >= self.text.len() {
            return None;
        }

        match self.chunker.carve(&self.text[self.offset..]) {
            Ok(Some(carve)) => {
                self.offset += carve.consumed;
                Some(Ok(carve))
            }
            Ok(None) => {
                self.stalled = true;
                Some(Err(Error::ChunkingStall {
                    section: self.section,
                    offset: self.offset,
                }))
            }
            Err(e) => {
                self.stalled = true;
                Some(Err(e))
            }
        }
    }
}
