//! Google Cloud Text-to-Speech REST client

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::request::SynthesisRequest;
use super::SpeechSynthesizer;
use crate::config::{CredentialConfig, NarratorConfig};
use crate::error::{Error, Result};

const SYNTHESIZE_PATH: &str = "/v1/text:synthesize";

/// Reference to the credential sent with each request
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    AccessToken(String),
}

impl Credential {
    /// An API key wins over an access token when both are configured.
    pub fn select(config: &CredentialConfig) -> Option<Self> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        present(&config.key)
            .map(Credential::ApiKey)
            .or_else(|| present(&config.token).map(Credential::AccessToken))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ApiKey(_) => f.write_str("ApiKey(..)"),
            Credential::AccessToken(_) => f.write_str("AccessToken(..)"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    input: WireInput<'a>,
    voice: WireVoice<'a>,
    audio_config: WireAudioConfig,
}

#[derive(Debug, Serialize)]
struct WireInput<'a> {
    ssml: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireVoice<'a> {
    language_code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    ssml_gender: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireAudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f64,
    pitch: f64,
    volume_gain_db: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate_hertz: Option<u32>,
}

impl<'a> From<&'a SynthesisRequest> for WireRequest<'a> {
    fn from(request: &'a SynthesisRequest) -> Self {
        Self {
            input: WireInput {
                ssml: &request.markup,
            },
            voice: WireVoice {
                language_code: &request.voice.language_code,
                name: request.voice.name.as_deref(),
                ssml_gender: &request.voice.gender,
            },
            audio_config: WireAudioConfig {
                audio_encoding: request.audio.encoding.service_name(),
                speaking_rate: request.audio.speaking_rate,
                pitch: request.audio.pitch,
                volume_gain_db: request.audio.volume_gain_db,
                sample_rate_hertz: request.audio.sample_rate_hertz,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    audio_content: String,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

/// Pull the human-readable message out of a Google error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<WireErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Speech synthesizer backed by `text:synthesize`
#[derive(Debug, Clone)]
pub struct GoogleSpeechClient {
    http: reqwest::Client,
    url: String,
    credential: Option<Credential>,
}

impl GoogleSpeechClient {
    pub fn new(config: &NarratorConfig) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        let credential = Credential::select(&config.credential);
        if credential.is_none() {
            warn!("No speech credential configured; requests will be sent unauthenticated");
        }
        Ok(Self {
            http,
            url: format!(
                "{}{}",
                config.endpoint.trim_end_matches('/'),
                SYNTHESIZE_PATH
            ),
            credential,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeechClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes> {
        let mut builder = self.http.post(&self.url).json(&WireRequest::from(request));
        builder = match &self.credential {
            Some(Credential::ApiKey(key)) => builder.query(&[("key", key)]),
            Some(Credential::AccessToken(token)) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body: WireResponse = response.json().await?;
        let audio = base64::engine::general_purpose::STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| Error::Encoding(format!("Failed to decode audio: {}", e)))?;
        if audio.is_empty() {
            return Err(Error::Encoding("response carried no audio".into()));
        }

        debug!("Received {} bytes of audio", audio.len());
        Ok(Bytes::from(audio))
    }
}
