use crate::config_loader::Settings;
use crate::error::{Error, Result};
use crate::supabase::{check_status, SupabaseClient};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Status that makes the playback system pick this row next.
pub const NEXT_PLAY: &str = "next_play";
/// Source tag for automated announcements.
pub const AI_ANNOUNCEMENT: &str = "ai_announcement";

/// Row inserted into the shared queue for one announcement.
///
/// The announcer never touches the row again after inserting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub uploader_id: String,
    pub title: String,
    pub artist_name: String,
    pub source: String,
    pub audio_url: String,
    pub duration_sec: u32,
    pub status: String,
    pub cover_art_url: String,
    pub is_canvas: bool,
}

/// Fixed identity stamped on every announcement row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncerIdentity {
    pub uploader_id: String,
    pub artist_name: String,
    pub cover_art_url: String,
    pub duration_sec: u32,
}

impl AnnouncerIdentity {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            uploader_id: settings.bot_user_id.clone(),
            artist_name: settings.announcer_name.clone(),
            cover_art_url: settings.cover_art_url.clone(),
            duration_sec: settings.announcement_duration_sec,
        }
    }

    pub fn entry(&self, audio_url: &str, title: &str) -> QueueEntry {
        QueueEntry {
            uploader_id: self.uploader_id.clone(),
            title: title.to_string(),
            artist_name: self.artist_name.clone(),
            source: AI_ANNOUNCEMENT.to_string(),
            audio_url: audio_url.to_string(),
            duration_sec: self.duration_sec,
            status: NEXT_PLAY.to_string(),
            cover_art_url: self.cover_art_url.clone(),
            is_canvas: false,
        }
    }
}

/// Title of the queue row announcing `song_title`.
pub fn announcement_title(song_title: &str) -> String {
    format!("🚨 DSW Alert: {}", song_title.trim())
}

/// Puts an announcement at the front of the listening queue.
///
/// `next_play` is one shared slot with no locking: if two rows hold it at
/// once, the playback system's own tie-break decides. Implementations only
/// promise one insert per call.
#[async_trait]
pub trait QueueInjector: Send + Sync {
    async fn inject(&self, audio_url: &str, title: &str) -> Result<QueueEntry>;
}

pub struct PostgrestQueue {
    client: SupabaseClient,
    table: String,
    identity: AnnouncerIdentity,
}

impl PostgrestQueue {
    pub fn new(
        client: SupabaseClient,
        table: impl Into<String>,
        identity: AnnouncerIdentity,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            identity,
        }
    }
}

#[async_trait]
impl QueueInjector for PostgrestQueue {
    async fn inject(&self, audio_url: &str, title: &str) -> Result<QueueEntry> {
        let entry = self.identity.entry(audio_url, title);
        let resp = self
            .client
            .insert(&self.table)
            .json(&entry)
            .send()
            .await
            .map_err(|e| Error::from(e).in_stage(Error::Injection))?;
        check_status(resp)
            .await
            .map_err(|e| e.in_stage(Error::Injection))?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use reqwest::Client;
    use serde_json::json;

    fn identity() -> AnnouncerIdentity {
        AnnouncerIdentity::from_settings(&Settings::default())
    }

    #[test]
    fn entry_forces_next_play() {
        let entry = identity().entry("https://cdn/a.mp3", &announcement_title("Epic Fail"));
        assert_eq!(entry.title, "🚨 DSW Alert: Epic Fail");
        assert_eq!(entry.status, NEXT_PLAY);
        assert_eq!(entry.source, AI_ANNOUNCEMENT);
        assert_eq!(entry.artist_name, "DJ Python");
        assert_eq!(entry.uploader_id, "dj-python-bot");
        assert_eq!(entry.duration_sec, 15);
        assert!(!entry.is_canvas);
    }

    #[tokio::test]
    async fn inject_posts_one_row() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/songs")
            .match_body(Matcher::Json(json!({
                "uploader_id": "dj-python-bot",
                "title": "🚨 DSW Alert: Epic Fail",
                "artist_name": "DJ Python",
                "source": "ai_announcement",
                "audio_url": "https://cdn/a.mp3",
                "duration_sec": 15,
                "status": "next_play",
                "cover_art_url": "https://i.pravatar.cc/150?u=djpython",
                "is_canvas": false
            })))
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let client = SupabaseClient::with_client(Client::new(), &server.url(), "key");
        let queue = PostgrestQueue::new(client, "songs", identity());
        queue
            .inject("https://cdn/a.mp3", &announcement_title("Epic Fail"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_insert_is_an_injection_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/v1/songs")
            .with_status(409)
            .create_async()
            .await;

        let client = SupabaseClient::with_client(Client::new(), &server.url(), "key");
        let queue = PostgrestQueue::new(client, "songs", identity());
        let err = queue.inject("https://cdn/a.mp3", "t").await.unwrap_err();
        assert_eq!(err.stage(), "inject");
    }
}
