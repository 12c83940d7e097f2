//! Audio encodings understood by the speech service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Supported synthesis output encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    /// Uncompressed 16-bit PCM in a WAV container
    Linear16,
    /// MPEG layer III
    Mp3,
    /// Opus in an Ogg container
    OggOpus,
    /// 8-bit mu-law in a WAV container
    Mulaw,
    /// 8-bit A-law in a WAV container
    Alaw,
}

impl AudioEncoding {
    /// Encoding for an output file extension, if one is known.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(AudioEncoding::Linear16),
            "mp3" => Some(AudioEncoding::Mp3),
            "ogg" | "opus" => Some(AudioEncoding::OggOpus),
            _ => None,
        }
    }

    /// Pick the encoding: an explicit setting wins, then the output
    /// extension, then MP3.
    pub fn resolve(configured: Option<&str>, output: &Path) -> Result<Self> {
        if let Some(name) = configured {
            return name.parse();
        }
        Ok(output
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(AudioEncoding::Mp3))
    }

    /// Name used in the service's `audioEncoding` field
    pub fn service_name(self) -> &'static str {
        match self {
            AudioEncoding::Linear16 => "LINEAR16",
            AudioEncoding::Mp3 => "MP3",
            AudioEncoding::OggOpus => "OGG_OPUS",
            AudioEncoding::Mulaw => "MULAW",
            AudioEncoding::Alaw => "ALAW",
        }
    }

    /// Conventional file extension for segments in this encoding
    pub fn extension(self) -> &'static str {
        match self {
            AudioEncoding::Linear16 | AudioEncoding::Mulaw | AudioEncoding::Alaw => "wav",
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::OggOpus => "ogg",
        }
    }
}

impl FromStr for AudioEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LINEAR16" | "WAV" => Ok(AudioEncoding::Linear16),
            "MP3" => Ok(AudioEncoding::Mp3),
            "OGG_OPUS" | "OGG" => Ok(AudioEncoding::OggOpus),
            "MULAW" => Ok(AudioEncoding::Mulaw),
            "ALAW" => Ok(AudioEncoding::Alaw),
            other => Err(Error::Encoding(format!("unsupported audio encoding: {other}"))),
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}
