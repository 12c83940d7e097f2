//! Narrator Core - Document-to-Speech Pipeline
//!
//! This crate turns an arbitrary-length text document into a single narrated
//! audio file using a remote text-to-speech service, and computes a table of
//! contents from the measured length of every synthesized piece.
//!
//! # Architecture
//!
//! A run flows strictly forward:
//! - Section splitting at `== title ==` headings
//! - SSML markup generation and size-bounded chunking
//! - Concurrent synthesis with bounded retry
//! - Ordered reassembly through ffmpeg's concat demuxer
//! - Timeline computation from probed segment durations
//!
//! # Example
//!
//! ```ignore
//! use narrator_core::{Narrator, NarratorConfig};
//!
//! let narrator = Narrator::with_defaults(NarratorConfig::default())?;
//! let narration = narrator.narrate(&text, Path::new("book.mp3")).await?;
//! for entry in &narration.toc {
//!     println!("{}", entry);
//! }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod synthesis;
pub mod text;
pub mod timeline;

pub use config::NarratorConfig;
pub use error::{Error, Result};
pub use pipeline::{Narration, Narrator};
pub use synthesis::{Segment, SpeechSynthesizer, SynthesisObserver};
pub use timeline::{build_toc, Timeline, Timestamp, TocEntry};
