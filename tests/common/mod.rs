#![allow(dead_code)]

use async_trait::async_trait;
use dsw_announcer::backends::{AudioAsset, SpeechBackend};
use dsw_announcer::catalog::{EventSource, FlaggedEntity};
use dsw_announcer::config_loader::Settings;
use dsw_announcer::injector::{AnnouncerIdentity, QueueEntry, QueueInjector};
use dsw_announcer::publisher::{AssetPublisher, PublishedAsset};
use dsw_announcer::script::{AnnouncementScript, ScriptProvider};
use dsw_announcer::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

mockall::mock! {
    pub Backend {}
    #[async_trait::async_trait]
    impl SpeechBackend for Backend {
        async fn synthesize(&self, text: &str) -> Result<AudioAsset>;
        fn id(&self) -> &'static str;
    }
}

mockall::mock! {
    pub Publisher {}
    #[async_trait::async_trait]
    impl AssetPublisher for Publisher {
        async fn publish(&self, audio: &AudioAsset) -> Result<PublishedAsset>;
    }
}

mockall::mock! {
    pub Scripts {}
    #[async_trait::async_trait]
    impl ScriptProvider for Scripts {
        async fn script(&self, song: &FlaggedEntity) -> Result<AnnouncementScript>;
    }
}

/// In-memory stand-in for the catalog table: flagged songs plus the queue
/// rows inserted next to them.
pub struct FakeStore {
    pub songs: Mutex<Vec<FlaggedEntity>>,
    pub queue: Mutex<Vec<QueueEntry>>,
    pub fetches: AtomicUsize,
    pub fail_fetch: bool,
    pub fail_ack: bool,
    identity: AnnouncerIdentity,
}

impl FakeStore {
    pub fn new(songs: Vec<FlaggedEntity>) -> Self {
        Self {
            songs: Mutex::new(songs),
            queue: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            fail_fetch: false,
            fail_ack: false,
            identity: AnnouncerIdentity::from_settings(&Settings::default()),
        }
    }

    pub fn announced(&self, id: &str) -> bool {
        self.songs
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.announced)
            .unwrap_or(false)
    }

    pub fn queued(&self) -> Vec<QueueEntry> {
        self.queue.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for FakeStore {
    async fn fetch(&self) -> Result<Vec<FlaggedEntity>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(Error::Catalog("connection refused".into()));
        }
        Ok(self
            .songs
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.is_pending())
            .cloned()
            .collect())
    }

    async fn acknowledge(&self, id: &str) -> Result<()> {
        if self.fail_ack {
            return Err(Error::Acknowledge {
                id: id.to_string(),
                reason: "store timed out".into(),
            });
        }
        let mut songs = self.songs.lock().unwrap();
        match songs.iter_mut().find(|s| s.id == id) {
            Some(song) => {
                song.announced = true;
                Ok(())
            }
            None => Err(Error::Acknowledge {
                id: id.to_string(),
                reason: "no row matched".into(),
            }),
        }
    }
}

#[async_trait]
impl QueueInjector for FakeStore {
    async fn inject(&self, audio_url: &str, title: &str) -> Result<QueueEntry> {
        let entry = self.identity.entry(audio_url, title);
        self.queue.lock().unwrap().push(entry.clone());
        Ok(entry)
    }
}

/// Backend that renders any text to a fixed mp3 payload.
pub fn working_backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_id().return_const("mock");
    backend
        .expect_synthesize()
        .returning(|text| Ok(AudioAsset::mp3(text.as_bytes().to_vec())));
    backend
}

/// Publisher that hands out a distinct URL per upload.
pub fn working_publisher() -> MockPublisher {
    let counter = AtomicUsize::new(0);
    let mut publisher = MockPublisher::new();
    publisher.expect_publish().returning(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let path = format!("ai_dj/dsw_alert_{:08x}.mp3", n);
        Ok(PublishedAsset {
            url: format!("https://cdn.example/{}", path),
            path,
        })
    });
    publisher
}
