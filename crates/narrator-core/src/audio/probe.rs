//! Segment duration measurement

use async_trait::async_trait;
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Measures the playing time of an audio file in seconds
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, path: &Path) -> Result<f64>;
}

/// Probe every path, returning durations in the same order as `paths`.
pub async fn probe_all(probe: &dyn DurationProbe, paths: &[PathBuf]) -> Result<Vec<f64>> {
    try_join_all(paths.iter().map(|path| probe.duration(path))).await
}

/// Reads the `format=duration` field reported by `ffprobe`
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: PathBuf,
}

impl FfprobeProbe {
    pub fn new() -> Self {
        Self::with_program("ffprobe")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> Result<f64> {
        let failed = |reason: String| Error::DurationProbe {
            path: path.to_path_buf(),
            reason,
        };

        let output = Command::new(&self.program)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| failed(format!("failed to start {:?}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_seconds(&stdout).ok_or_else(|| failed(format!("unexpected output {:?}", stdout.trim())))
    }
}

fn parse_seconds(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// Computes WAV durations from the header without decoding samples
#[derive(Debug, Clone, Copy, Default)]
pub struct WavHeaderProbe;

impl WavHeaderProbe {
    fn read(path: &Path) -> Result<f64> {
        let reader = hound::WavReader::open(path).map_err(|e| Error::DurationProbe {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(Error::DurationProbe {
                path: path.to_path_buf(),
                reason: "zero sample rate".into(),
            });
        }
        Ok(reader.duration() as f64 / spec.sample_rate as f64)
    }
}

#[async_trait]
impl DurationProbe for WavHeaderProbe {
    async fn duration(&self, path: &Path) -> Result<f64> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::read(&owned))
            .await
            .map_err(|e| Error::DurationProbe {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    }
}

/// WAV header for `.wav` files, ffprobe for everything else or when the
/// header cannot be read
#[derive(Debug, Clone, Default)]
pub struct AutoProbe {
    wav: WavHeaderProbe,
    ffprobe: FfprobeProbe,
}

impl AutoProbe {
    pub fn new(ffprobe: FfprobeProbe) -> Self {
        Self {
            wav: WavHeaderProbe,
            ffprobe,
        }
    }
}

#[async_trait]
impl DurationProbe for AutoProbe {
    async fn duration(&self, path: &Path) -> Result<f64> {
        let is_wav = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if is_wav {
            match self.wav.duration(path).await {
                Ok(secs) => return Ok(secs),
                Err(e) => debug!("WAV header probe failed, trying ffprobe: {}", e),
            }
        }
        self.ffprobe.duration(path).await
    }
}
