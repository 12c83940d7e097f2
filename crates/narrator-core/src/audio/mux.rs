//! Ordered reassembly of audio segments through ffmpeg's concat demuxer

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::audio::workdir::remove_quietly;
use crate::error::{Error, Result};

/// Codec value that asks the muxer to concatenate without re-encoding
pub const COPY_CODEC: &str = "copy";

/// The concat demuxer list file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatManifest {
    entries: Vec<PathBuf>,
}

impl ConcatManifest {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            entries: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve relative entries against the working directory. ffmpeg reads
    /// relative entries as relative to the list file, not to the process.
    pub fn into_absolute(self) -> Result<Self> {
        let entries = self
            .entries
            .into_iter()
            .map(std::path::absolute)
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `file '<path>'` line per segment, in order.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|path| format!("file '{}'\n", escape_path(path)))
            .collect()
    }
}

/// Quote a path for the concat demuxer: inside single quotes, a literal
/// quote is written as `'\''`.
fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Inputs to one concatenation
#[derive(Debug, Clone, Copy)]
pub struct MuxRequest<'a> {
    /// Segments in playback order
    pub segments: &'a [PathBuf],
    pub output: &'a Path,
    pub codec: &'a str,
    /// Where the list file may be written
    pub manifest: &'a Path,
}

/// Joins segments into the final output file
#[async_trait]
pub trait AudioMuxer: Send + Sync {
    async fn concatenate(&self, request: MuxRequest<'_>) -> Result<PathBuf>;
}

/// Fail unless every segment exists on disk.
pub async fn ensure_segments_exist(segments: &[PathBuf]) -> Result<()> {
    if segments.is_empty() {
        return Err(Error::Mux("no segments to concatenate".into()));
    }
    for segment in segments {
        if !tokio::fs::try_exists(segment).await.unwrap_or(false) {
            return Err(Error::Mux(format!("missing segment {:?}", segment)));
        }
    }
    Ok(())
}

/// Muxer backed by the `ffmpeg` executable
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    program: PathBuf,
}

impl FfmpegMuxer {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Sibling of `output` that keeps its extension, so ffmpeg still picks
    /// the right container.
    fn staging_path(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let name = match output.extension() {
            Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
            None => format!(".{stem}.partial"),
        };
        output.with_file_name(name)
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioMuxer for FfmpegMuxer {
    async fn concatenate(&self, request: MuxRequest<'_>) -> Result<PathBuf> {
        ensure_segments_exist(request.segments).await?;

        let manifest = ConcatManifest::new(request.segments.iter().cloned()).into_absolute()?;
        tokio::fs::write(request.manifest, manifest.render()).await?;

        let staging = Self::staging_path(request.output);
        info!(
            "Concatenating {} segments into {:?} (codec {})",
            manifest.len(),
            request.output,
            request.codec
        );

        let output = Command::new(&self.program)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-safe", "0", "-f", "concat", "-i"])
            .arg(request.manifest)
            .arg("-acodec")
            .arg(request.codec)
            .arg(&staging)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Mux(format!("failed to start {:?}: {}", self.program, e)))?;

        if !output.status.success() {
            remove_quietly(&staging);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Mux(format!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if let Err(e) = tokio::fs::rename(&staging, request.output).await {
            remove_quietly(&staging);
            return Err(e.into());
        }

        debug!("Wrote {:?}", request.output);
        Ok(request.output.to_path_buf())
    }
}
