//! Audio-side plumbing: encodings, segment storage, muxing and probing

mod format;
mod mux;
mod probe;
mod workdir;

pub use format::AudioEncoding;
pub use mux::{
    ensure_segments_exist, AudioMuxer, ConcatManifest, FfmpegMuxer, MuxRequest, COPY_CODEC,
};
pub use probe::{probe_all, AutoProbe, DurationProbe, FfprobeProbe, WavHeaderProbe};
pub use workdir::WorkDir;

pub(crate) use workdir::remove_quietly;
