//! Text preparation: sections, markup and chunking

mod chunker;
mod markup;
mod sections;

pub use chunker::{BlockChunker, Carve, Chunk, ChunkId, Chunks};
pub use markup::{MarkupStage, MarkupTransformer, HEADING_CUE};
pub use sections::{split_sections, Section};
