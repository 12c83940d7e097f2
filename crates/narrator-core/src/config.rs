//! Configuration types for the narration pipeline
//!
//! The key layout mirrors the `TTS_*` environment variables: every nested
//! table is one word and every leaf is one word, so `TTS_HEADING_DIFFERENCE`
//! lands on `heading.difference`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::COPY_CODEC;
use crate::error::{Error, Result};

/// Main pipeline configuration, immutable for the duration of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorConfig {
    /// Maximum synthesis attempts per chunk
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Initial delay between attempts, in milliseconds (doubles per attempt)
    #[serde(default = "default_backoff")]
    pub backoff: u64,

    /// Maximum synthesis requests in flight; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Audio codec handed to the muxer (`copy` concatenates losslessly)
    #[serde(default = "default_acodec")]
    pub acodec: String,

    /// Keep per-chunk markup and audio next to the output
    #[serde(default)]
    pub keep: bool,

    /// Base URL of the speech service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub credential: CredentialConfig,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub language: LanguageConfig,

    #[serde(default)]
    pub voice: VoiceConfig,

    #[serde(default)]
    pub quote: QuoteConfig,

    #[serde(default)]
    pub heading: HeadingConfig,

    #[serde(default = "default_ellipsis")]
    pub ellipsis: PauseConfig,

    #[serde(default = "default_dash")]
    pub dash: PauseConfig,

    #[serde(default = "default_newline")]
    pub newline: PauseConfig,

    #[serde(default)]
    pub block: BlockConfig,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            backoff: default_backoff(),
            concurrency: None,
            acodec: default_acodec(),
            keep: false,
            endpoint: default_endpoint(),
            credential: CredentialConfig::default(),
            audio: AudioConfig::default(),
            language: LanguageConfig::default(),
            voice: VoiceConfig::default(),
            quote: QuoteConfig::default(),
            heading: HeadingConfig::default(),
            ellipsis: default_ellipsis(),
            dash: default_dash(),
            newline: default_newline(),
            block: BlockConfig::default(),
        }
    }
}

impl NarratorConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.block.length == 0 {
            return Err(Error::Config("block.length must be positive".into()));
        }
        if self.retries == 0 {
            return Err(Error::Config("retries must be at least 1".into()));
        }
        if self.concurrency == Some(0) {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        if self.acodec.trim().is_empty() {
            return Err(Error::Config("acodec must not be empty".into()));
        }
        Ok(())
    }

    pub fn backoff_delay(&self) -> Duration {
        Duration::from_millis(self.backoff)
    }
}

fn default_retries() -> u32 {
    8
}

fn default_backoff() -> u64 {
    250
}

fn default_acodec() -> String {
    COPY_CODEC.to_string()
}

fn default_endpoint() -> String {
    "https://texttospeech.googleapis.com".to_string()
}

fn default_ellipsis() -> PauseConfig {
    PauseConfig { pause_ms: 1500.0 }
}

fn default_dash() -> PauseConfig {
    PauseConfig { pause_ms: 500.0 }
}

fn default_newline() -> PauseConfig {
    PauseConfig { pause_ms: 1000.0 }
}

/// Credential reference for the speech service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// API key, sent as the `key` query parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// OAuth access token, sent as a bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Output audio parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Service encoding name (`MP3`, `LINEAR16`, `OGG_OPUS`); inferred from
    /// the output extension when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,

    /// Sample rate in hertz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "default_language_code")]
    pub code: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            code: default_language_code(),
        }
    }
}

fn default_language_code() -> String {
    "en-US".to_string()
}

/// Voice selection and prosody
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_gender")]
    pub gender: String,

    /// Pitch shift in semitones
    #[serde(default)]
    pub pitch: f64,

    /// Speaking rate multiplier
    #[serde(default = "default_rate")]
    pub rate: f64,

    /// Volume gain in dB
    #[serde(default)]
    pub volume: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            name: None,
            gender: default_gender(),
            pitch: 0.0,
            rate: default_rate(),
            volume: 0.0,
        }
    }
}

fn default_gender() -> String {
    "neutral".to_string()
}

fn default_rate() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    #[serde(rename = "break", default = "default_quote_break")]
    pub pause_ms: f64,

    #[serde(default = "default_quote_emphasis")]
    pub emphasis: String,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            pause_ms: default_quote_break(),
            emphasis: default_quote_emphasis(),
        }
    }
}

fn default_quote_break() -> f64 {
    250.0
}

fn default_quote_emphasis() -> String {
    "moderate".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadingConfig {
    /// Base pause before a heading, shortened per `=` of heading depth
    #[serde(rename = "break", default = "default_heading_break")]
    pub pause_ms: f64,

    #[serde(default = "default_heading_difference")]
    pub difference: f64,

    #[serde(default = "default_heading_emphasis")]
    pub emphasis: String,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            pause_ms: default_heading_break(),
            difference: default_heading_difference(),
            emphasis: default_heading_emphasis(),
        }
    }
}

impl HeadingConfig {
    /// Pause for a heading delimited by `depth` equals signs.
    pub fn pause_for_depth(&self, depth: usize) -> f64 {
        self.pause_ms - depth as f64 * self.difference
    }
}

fn default_heading_break() -> f64 {
    4000.0
}

fn default_heading_difference() -> f64 {
    250.0
}

fn default_heading_emphasis() -> String {
    "strong".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseConfig {
    #[serde(rename = "break")]
    pub pause_ms: f64,
}

/// Chunk size budget and preferred split character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConfig {
    #[serde(default = "default_block_separator")]
    pub separator: char,

    /// Upper bound (exclusive) on the markup length of one chunk, in bytes
    #[serde(default = "default_block_length")]
    pub length: usize,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            separator: default_block_separator(),
            length: default_block_length(),
        }
    }
}

fn default_block_separator() -> char {
    '.'
}

fn default_block_length() -> usize {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NarratorConfig::default();
        assert_eq!(config.retries, 8);
        assert_eq!(config.acodec, "copy");
        assert_eq!(config.quote.pause_ms, 250.0);
        assert_eq!(config.heading.pause_ms, 4000.0);
        assert_eq!(config.ellipsis.pause_ms, 1500.0);
        assert_eq!(config.dash.pause_ms, 500.0);
        assert_eq!(config.newline.pause_ms, 1000.0);
        assert_eq!(config.block.separator, '.');
        assert_eq!(config.block.length, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: NarratorConfig =
            serde_json::from_str(r#"{"retries": 3, "quote": {"break": 100}}"#).unwrap();
        assert_eq!(config.retries, 3);
        assert_eq!(config.quote.pause_ms, 100.0);
        assert_eq!(config.quote.emphasis, "moderate");
        assert_eq!(config.voice.gender, "neutral");
        assert_eq!(config.newline.pause_ms, 1000.0);
    }

    #[test]
    fn test_heading_pause_for_depth() {
        let heading = HeadingConfig::default();
        assert_eq!(heading.pause_for_depth(2), 3500.0);
        assert_eq!(heading.pause_for_depth(20), -1000.0);
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = NarratorConfig::default();
        config.block.length = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = NarratorConfig::default();
        config.retries = 0;
        assert!(config.validate().is_err());
    }
}
