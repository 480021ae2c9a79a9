//! The poll loop: fetch flagged songs, then for each one
//! script → synthesize → publish → inject → acknowledge.
//!
//! Acknowledgement is the commit point. A crash anywhere before it leaves the
//! song unacknowledged and the next tick picks it up again, so delivery is
//! at-least-once. Audio that was uploaded but never acknowledged stays in the
//! bucket; that leak is bounded by the number of crashes.

use crate::backends::espeak::EspeakBackend;
use crate::backends::voicebox::VoiceboxBackend;
use crate::backends::SpeechBackend;
use crate::catalog::{EventSource, FlaggedEntity, PostgrestCatalog};
use crate::config_loader::Settings;
use crate::error::{Error, Result};
use crate::injector::{
    announcement_title, AnnouncerIdentity, PostgrestQueue, QueueEntry, QueueInjector,
};
use crate::publisher::{AssetPublisher, SupabaseStorage};
use crate::script::{OllamaScript, ScriptProvider, TemplateScript};
use crate::supabase::SupabaseClient;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// What happened to one song that made it all the way to the queue.
#[derive(Debug)]
pub enum Outcome {
    Announced(QueueEntry),
    /// On air, but the catalog still thinks it is pending. The song will be
    /// announced again on a later tick unless the flag gets set.
    InjectedUnacknowledged { entry: QueueEntry, error: Error },
}

/// Per-tick counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub announced: usize,
    /// Failed before injection; nothing was acknowledged.
    pub failed: usize,
    pub unacknowledged: usize,
}

pub struct Announcer {
    source: Arc<dyn EventSource>,
    scripts: Arc<dyn ScriptProvider>,
    backend: Arc<dyn SpeechBackend>,
    publisher: Arc<dyn AssetPublisher>,
    queue: Arc<dyn QueueInjector>,
    interval: Duration,
    max_concurrency: usize,
}

impl Announcer {
    pub fn new(
        source: Arc<dyn EventSource>,
        scripts: Arc<dyn ScriptProvider>,
        backend: Arc<dyn SpeechBackend>,
        publisher: Arc<dyn AssetPublisher>,
        queue: Arc<dyn QueueInjector>,
    ) -> Self {
        Self {
            source,
            scripts,
            backend,
            publisher,
            queue,
            interval: Duration::from_secs(10),
            max_concurrency: 1,
        }
    }

    /// Wait between the end of one tick and the start of the next.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Songs processed in parallel within one tick. Clamped to at least 1.
    pub fn with_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Wires the real store, storage and synthesis clients from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let timeout = settings.request_timeout();
        let client = SupabaseClient::new(settings)?;

        let backend: Arc<dyn SpeechBackend> = match settings.tts_backend.as_str() {
            "espeak" => Arc::new(EspeakBackend::new(&settings.espeak_binary, timeout)),
            _ => Arc::new(VoiceboxBackend::new(
                &settings.voicebox_url,
                &settings.voice,
                &settings.audio_format,
                timeout,
            )?),
        };
        let scripts: Arc<dyn ScriptProvider> = match settings.script_provider.as_str() {
            "ollama" => Arc::new(OllamaScript::new(
                &settings.ollama_url,
                &settings.ollama_model,
                timeout,
            )?),
            _ => Arc::new(TemplateScript),
        };

        Ok(Self::new(
            Arc::new(PostgrestCatalog::new(client.clone(), &settings.songs_table)),
            scripts,
            backend,
            Arc::new(SupabaseStorage::new(
                client.clone(),
                &settings.storage_bucket,
                &settings.storage_prefix,
            )),
            Arc::new(PostgrestQueue::new(
                client,
                &settings.songs_table,
                AnnouncerIdentity::from_settings(settings),
            )),
        )
        .with_interval(settings.poll_interval())
        .with_concurrency(settings.max_concurrency))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn backend_id(&self) -> &'static str {
        self.backend.id()
    }

    /// Runs the full pipeline for one song.
    ///
    /// Any `Err` means nothing was acknowledged and the song stays pending.
    pub async fn process(&self, song: &FlaggedEntity) -> Result<Outcome> {
        warn!(
            song_id = %song.id,
            title = %song.title,
            artist = song.artist.as_deref().unwrap_or("unknown"),
            "detected unannounced Dead Song Walking"
        );

        let script = self.scripts.script(song).await?;
        info!(song_id = %song.id, backend = self.backend.id(), "generating announcement audio");
        let audio = self.backend.synthesize(script.as_str()).await?;
        let published = self.publisher.publish(&audio).await?;
        let entry = self
            .queue
            .inject(&published.url, &announcement_title(&song.title))
            .await?;
        info!(song_id = %song.id, url = %published.url, "announcement queued for broadcast");

        match self.source.acknowledge(&song.id).await {
            Ok(()) => Ok(Outcome::Announced(entry)),
            Err(error) => Ok(Outcome::InjectedUnacknowledged { entry, error }),
        }
    }

    /// One poll: fetch the pending batch and process every song in it.
    ///
    /// Only a failed fetch is returned as an error. Per-song failures are
    /// logged and counted in the report.
    pub async fn tick(&self) -> Result<TickReport> {
        let batch = self.source.fetch().await?;
        let mut report = TickReport {
            fetched: batch.len(),
            ..TickReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        let results: Vec<(String, Result<Outcome>)> = stream::iter(batch)
            .map(|song| async move {
                let result = self.process(&song).await;
                (song.id, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        for (song_id, result) in results {
            match result {
                Ok(Outcome::Announced(_)) => report.announced += 1,
                Ok(Outcome::InjectedUnacknowledged { error, .. }) => {
                    report.unacknowledged += 1;
                    error!(
                        song_id = %song_id,
                        error = %error,
                        "acknowledgement failed after injection; entity may be announced again"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        song_id = %song_id,
                        stage = e.stage(),
                        error = %e,
                        "announcement failed; will retry next tick"
                    );
                }
            }
        }
        Ok(report)
    }

    /// Polls forever. Shutdown is by killing the process.
    pub async fn run(&self) {
        loop {
            match self.tick().await {
                Ok(report) => debug!(
                    fetched = report.fetched,
                    announced = report.announced,
                    failed = report.failed,
                    unacknowledged = report.unacknowledged,
                    "tick complete"
                ),
                Err(e) => error!(
                    stage = e.stage(),
                    error = %e,
                    "error polling catalog; skipping tick"
                ),
            }
            sleep(self.interval).await;
        }
    }
}
