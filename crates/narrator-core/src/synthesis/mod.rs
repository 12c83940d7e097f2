//! Speech synthesis: request model, service client, retry and fan-out

mod fanout;
mod google;
mod request;
mod retry;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

pub use fanout::{Segment, SynthesisFanout, SynthesisObserver};
pub use google::{Credential, GoogleSpeechClient};
pub use request::{AudioParams, SynthesisRequest, SynthesisSettings, VoiceSelection};
pub use retry::{RetryFailure, RetryPolicy};

/// A text-to-speech backend turning one markup document into audio bytes
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Bytes>;
}
