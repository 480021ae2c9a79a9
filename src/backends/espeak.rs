use super::{AudioAsset, SpeechBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Local fallback: `espeak-ng --stdout --stdin` reads the script from stdin
/// and writes a WAV file to stdout.
pub struct EspeakBackend {
    binary: String,
    timeout: Duration,
}

impl EspeakBackend {
    pub fn new(binary: &str, timeout: Duration) -> Self {
        Self {
            binary: binary.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl SpeechBackend for EspeakBackend {
    fn id(&self) -> &'static str {
        "espeak-ng"
    }

    async fn synthesize(&self, text: &str) -> Result<AudioAsset> {
        if text.trim().is_empty() {
            return Err(Error::Synthesis("refusing to synthesize empty text".into()));
        }

        let mut child = Command::new(&self.binary)
            .arg("--stdout")
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Synthesis(format!("failed to run {}: {}", self.binary, e)))?;
        let stdin = child.stdin.take();

        let run = async move {
            if let Some(mut stdin) = stdin {
                // A child that exits without reading still reports through its status.
                match stdin.write_all(text.as_bytes()).await {
                    Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                        return Err(Error::Synthesis(format!("failed to write text: {}", e)))
                    }
                    _ => {}
                }
            }
            child
                .wait_with_output()
                .await
                .map_err(|e| Error::Synthesis(e.to_string()))
        };

        // Dropping the future on timeout kills the child.
        let output = match timeout(self.timeout, run).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::Synthesis(format!(
                    "backend timed out after {:?}",
                    self.timeout
                )))
            }
        };

        if !output.status.success() {
            let err_msg = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Synthesis(format!("espeak error: {}", err_msg.trim())));
        }
        if output.stdout.is_empty() {
            return Err(Error::Synthesis("espeak produced no audio".into()));
        }

        Ok(AudioAsset {
            bytes: output.stdout,
            content_type: "audio/wav".to_string(),
            extension: "wav".to_string(),
        })
    }
}
