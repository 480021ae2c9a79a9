use super::{content_type_for, AudioAsset, SpeechBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Client for a Voicebox TTS server (`GET /api/tts`).
pub struct VoiceboxBackend {
    client: Client,
    base_url: String,
    voice: String,
    format: String,
}

impl VoiceboxBackend {
    pub fn new(base_url: &str, voice: &str, format: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            voice: voice.to_string(),
            format: format.to_string(),
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(format!("{}/api/tts", self.base_url))
            .query(&[
                ("text", text),
                ("voice", self.voice.as_str()),
                ("format", self.format.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Synthesis(format!("voicebox returned {}", status)));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for VoiceboxBackend {
    fn id(&self) -> &'static str {
        "voicebox"
    }

    async fn synthesize(&self, text: &str) -> Result<AudioAsset> {
        if text.trim().is_empty() {
            return Err(Error::Synthesis("refusing to synthesize empty text".into()));
        }
        debug!(voice = %self.voice, chars = text.len(), "requesting synthesis");

        let bytes = self
            .request(text)
            .await
            .map_err(|e| e.in_stage(Error::Synthesis))?;
        if bytes.is_empty() {
            return Err(Error::Synthesis("voicebox returned an empty body".into()));
        }

        Ok(AudioAsset {
            bytes,
            content_type: content_type_for(&self.format).to_string(),
            extension: self.format.clone(),
        })
    }
}
