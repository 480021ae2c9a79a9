use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the catalog store endpoint.
pub const URL_VAR: &str = "SUPABASE_URL";
/// Environment variable holding the store access key.
pub const KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub supabase_url: String,
    pub supabase_key: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    // Catalog and storage layout
    pub songs_table: String,
    pub storage_bucket: String,
    pub storage_prefix: String,
    // Synthesis
    pub tts_backend: String, // "voicebox" or "espeak"
    pub voicebox_url: String,
    pub voice: String,
    pub audio_format: String,
    pub espeak_binary: String,
    // Script generation
    pub script_provider: String, // "template" or "ollama"
    pub ollama_url: String,
    pub ollama_model: String,
    // Queue entry identity
    pub bot_user_id: String,
    pub announcer_name: String,
    pub cover_art_url: String,
    pub announcement_duration_sec: u32,
    pub max_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Credentials have no default; validate() rejects them while empty.
            supabase_url: String::new(),
            supabase_key: String::new(),
            poll_interval_secs: 10,
            request_timeout_secs: 30,
            songs_table: "songs".to_string(),
            storage_bucket: "songs".to_string(),
            storage_prefix: "ai_dj".to_string(),
            tts_backend: "voicebox".to_string(),
            voicebox_url: "http://127.0.0.1:17493".to_string(),
            voice: "dj_voice".to_string(),
            audio_format: "mp3".to_string(),
            espeak_binary: "espeak-ng".to_string(),
            script_provider: "template".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            bot_user_id: "dj-python-bot".to_string(),
            announcer_name: "DJ Python".to_string(),
            cover_art_url: "https://i.pravatar.cc/150?u=djpython".to_string(),
            announcement_duration_sec: 15,
            max_concurrency: 1,
        }
    }
}

impl Settings {
    /// Default settings pointed at the given store. Nothing is read from disk
    /// or the environment.
    pub fn with_credentials(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            supabase_key: key.into(),
            ..Self::default()
        }
    }

    /// Loads settings from defaults, the usual config files and the environment.
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Same as [`Settings::new`] with an extra file layered on top of the
    /// default locations (the `--config` flag).
    pub fn load(extra: Option<&Path>) -> Result<Self, config::ConfigError> {
        let user_file = dirs::config_dir()
            .unwrap_or_default()
            .join("dsw-announcer/Announcer");

        let mut builder = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("Announcer").required(false))
            .add_source(File::with_name(&user_file.to_string_lossy()).required(false));

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        // e.g. ANNOUNCER_POLL_INTERVAL_SECS=30
        let builder = builder
            .add_source(Environment::with_prefix("ANNOUNCER").try_parsing(true))
            .set_override_option("supabase_url", non_empty_var(URL_VAR))?
            .set_override_option("supabase_key", non_empty_var(KEY_VAR))?;

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.supabase_url.trim().is_empty() {
            return Err(config::ConfigError::Message(format!("{} must be set", URL_VAR)));
        }
        if self.supabase_key.trim().is_empty() {
            return Err(config::ConfigError::Message(format!("{} must be set", KEY_VAR)));
        }
        if self.poll_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(config::ConfigError::Message(
                "max_concurrency must be greater than 0".to_string(),
            ));
        }
        if !matches!(self.tts_backend.as_str(), "voicebox" | "espeak") {
            return Err(config::ConfigError::Message(format!(
                "Invalid tts_backend: {}. Must be 'voicebox' or 'espeak'",
                self.tts_backend
            )));
        }
        if !matches!(self.script_provider.as_str(), "template" | "ollama") {
            return Err(config::ConfigError::Message(format!(
                "Invalid script_provider: {}. Must be 'template' or 'ollama'",
                self.script_provider
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
