//! Synthesis request model

use serde::Serialize;
use std::path::Path;

use crate::audio::AudioEncoding;
use crate::config::NarratorConfig;
use crate::error::Result;

const DEFAULT_REGION: &str = "US";

/// Voice the service should speak with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSelection {
    pub name: Option<String>,
    /// BCP-47 code, `xx-YY`
    pub language_code: String,
    /// `NEUTRAL`, `MALE` or `FEMALE`
    pub gender: String,
}

impl VoiceSelection {
    /// The language comes from the voice name when one is set
    /// (`en-GB-Wavenet-A` speaks `en-GB`), else from `language.code`.
    pub fn resolve(config: &NarratorConfig) -> Self {
        let name = config
            .voice
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let source = name.as_deref().unwrap_or(&config.language.code);

        Self {
            language_code: normalize_language_code(source),
            gender: config.voice.gender.trim().to_ascii_uppercase(),
            name,
        }
    }
}

/// `en`, `EN-gb`, `en-GB-Standard-A` → `en-US`, `en-GB`, `en-GB`
fn normalize_language_code(source: &str) -> String {
    let mut parts = source.split(['-', '_']);
    let language = parts
        .next()
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "en".to_string());
    let region = parts
        .next()
        .filter(|r| r.len() == 2 && r.chars().all(|c| c.is_ascii_alphabetic()))
        .map(|r| r.to_ascii_uppercase())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    format!("{language}-{region}")
}

/// Encoding and prosody of the returned audio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioParams {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: Option<u32>,
    pub speaking_rate: f64,
    pub pitch: f64,
    pub volume_gain_db: f64,
}

impl AudioParams {
    pub fn resolve(config: &NarratorConfig, output: &Path) -> Result<Self> {
        Ok(Self {
            encoding: AudioEncoding::resolve(config.audio.encoding.as_deref(), output)?,
            sample_rate_hertz: config.audio.frequency,
            speaking_rate: config.voice.rate,
            pitch: config.voice.pitch,
            volume_gain_db: config.voice.volume,
        })
    }
}

/// One chunk's request to the speech service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub markup: String,
    pub voice: VoiceSelection,
    pub audio: AudioParams,
}

/// Voice and audio settings shared by every request of a run
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisSettings {
    pub voice: VoiceSelection,
    pub audio: AudioParams,
}

impl SynthesisSettings {
    pub fn resolve(config: &NarratorConfig, output: &Path) -> Result<Self> {
        Ok(Self {
            voice: VoiceSelection::resolve(config),
            audio: AudioParams::resolve(config, output)?,
        })
    }

    pub fn request(&self, markup: &str) -> SynthesisRequest {
        SynthesisRequest {
            markup: markup.to_string(),
            voice: self.voice.clone(),
            audio: self.audio.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_voice_name() {
        let mut config = NarratorConfig::default();
        config.voice.name = Some("en-GB-Wavenet-A".into());
        config.voice.gender = "female".into();

        let voice = VoiceSelection::resolve(&config);
        assert_eq!(voice.language_code, "en-GB");
        assert_eq!(voice.gender, "FEMALE");
        assert_eq!(voice.name.as_deref(), Some("en-GB-Wavenet-A"));
    }

    #[test]
    fn test_language_code_normalized() {
        assert_eq!(normalize_language_code("EN-gb"), "en-GB");
        assert_eq!(normalize_language_code("fr"), "fr-US");
        assert_eq!(normalize_language_code("de_DE"), "de-DE");
        assert_eq!(normalize_language_code("cmn-CN-Wavenet-A"), "cmn-CN");
        assert_eq!(normalize_language_code(""), "en-US");
    }

    #[test]
    fn test_default_settings() {
        let settings =
            SynthesisSettings::resolve(&NarratorConfig::default(), Path::new("book.ogg")).unwrap();
        assert_eq!(settings.voice.language_code, "en-US");
        assert_eq!(settings.voice.gender, "NEUTRAL");
        assert_eq!(settings.voice.name, None);
        assert_eq!(settings.audio.encoding, AudioEncoding::OggOpus);
        assert_eq!(settings.audio.speaking_rate, 1.0);

        let request = settings.request("<speak>hi</speak>");
        assert_eq!(request.markup, "<speak>hi</speak>");
        assert_eq!(request.voice, settings.voice);
    }
}
