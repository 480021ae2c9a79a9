pub mod espeak;
pub mod voicebox;

use crate::error::Result;
use async_trait::async_trait;

/// Encoded audio as returned by a synthesis backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// File extension used for the storage path, without the dot.
    pub extension: String,
}

impl AudioAsset {
    pub fn mp3(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "audio/mpeg".to_string(),
            extension: "mp3".to_string(),
        }
    }
}

/// Trait that all speech synthesis backends must implement.
/// This allows the announcer to swap a remote TTS server for a local engine.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Renders `text` with the backend's fixed voice and format.
    /// Any failure (transport, status, empty output) is a `Synthesis` error.
    async fn synthesize(&self, text: &str) -> Result<AudioAsset>;

    /// Returns the unique ID of the backend (e.g., "voicebox")
    fn id(&self) -> &'static str;
}

/// Maps a configured format name to its MIME type.
pub fn content_type_for(format: &str) -> &'static str {
    match format {
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => "audio/mpeg",
    }
}
