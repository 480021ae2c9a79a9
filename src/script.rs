use crate::catalog::FlaggedEntity;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const UNKNOWN_ARTIST: &str = "an unknown artist";

/// Text to be spoken for one flagged track. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementScript(String);

impl AnnouncementScript {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(Error::Script("announcement text is empty".to_string()));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Writes the announcement for a flagged track.
#[async_trait]
pub trait ScriptProvider: Send + Sync {
    async fn script(&self, song: &FlaggedEntity) -> Result<AnnouncementScript>;
}

/// The fixed roast read out for every dead song.
#[derive(Debug, Clone, Default)]
pub struct TemplateScript;

impl TemplateScript {
    pub fn render(song: &FlaggedEntity) -> String {
        let artist = song
            .artist
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(UNKNOWN_ARTIST);
        format!(
            "Attention Club Youniverse. The track {} by {} just bombed the dance floor \
             and hit zero stars. It is officially a Dead Song Walking. Next time you hear it, \
             it's the Farewell Play. Rest in peace.",
            song.title.trim(),
            artist
        )
    }
}

#[async_trait]
impl ScriptProvider for TemplateScript {
    async fn script(&self, song: &FlaggedEntity) -> Result<AnnouncementScript> {
        AnnouncementScript::new(Self::render(song))
    }
}

/// Asks a local Ollama model to roast the track, falling back to the
/// template whenever the model is unreachable or says nothing.
pub struct OllamaScript {
    client: Client,
    url: String,
    model: String,
}

impl OllamaScript {
    pub fn new(url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn prompt(song: &FlaggedEntity) -> String {
        format!(
            "You are DJ Python, the resident AI DJ of Club Youniverse. \
             Write a short spoken announcement (two or three sentences, no emoji, no stage directions) \
             roasting the track \"{}\" by {}. It just bombed the dance floor and is now a Dead Song Walking: \
             the next time it plays will be its Farewell Play.",
            song.title.trim(),
            song.artist.as_deref().unwrap_or(UNKNOWN_ARTIST)
        )
    }

    async fn generate(&self, song: &FlaggedEntity) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&json!({
                "model": self.model,
                "prompt": Self::prompt(song),
                "stream": false
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = resp.json().await?;
        Ok(body["response"].as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl ScriptProvider for OllamaScript {
    async fn script(&self, song: &FlaggedEntity) -> Result<AnnouncementScript> {
        match self.generate(song).await {
            Ok(text) if !text.trim().is_empty() => AnnouncementScript::new(text),
            Ok(_) => {
                warn!(song_id = %song.id, "script generator returned nothing; using template");
                AnnouncementScript::new(TemplateScript::render(song))
            }
            Err(e) => {
                warn!(song_id = %song.id, error = %e, "script generator unavailable; using template");
                AnnouncementScript::new(TemplateScript::render(song))
            }
        }
    }
}
