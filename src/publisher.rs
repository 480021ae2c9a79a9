use crate::backends::AudioAsset;
use crate::error::{Error, Result};
use crate::supabase::{check_status, SupabaseClient};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

/// Where a published announcement ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedAsset {
    pub url: String,
    pub path: String,
}

/// Stores announcement audio and hands back a public URL.
#[async_trait]
pub trait AssetPublisher: Send + Sync {
    async fn publish(&self, audio: &AudioAsset) -> Result<PublishedAsset>;
}

/// Fresh storage path: `<prefix>/dsw_alert_<8 hex>.<ext>`.
pub fn storage_path(prefix: &str, extension: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let name = format!("dsw_alert_{}.{}", &id[..8], extension);
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

pub struct SupabaseStorage {
    client: SupabaseClient,
    bucket: String,
    prefix: String,
}

impl SupabaseStorage {
    pub fn new(
        client: SupabaseClient,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl AssetPublisher for SupabaseStorage {
    async fn publish(&self, audio: &AudioAsset) -> Result<PublishedAsset> {
        if audio.bytes.is_empty() {
            return Err(Error::Storage("refusing to upload empty audio".into()));
        }

        let path = storage_path(&self.prefix, &audio.extension);
        debug!(path = %path, bytes = audio.bytes.len(), "uploading announcement audio");

        let resp = self
            .client
            .upload(&self.bucket, &path, &audio.content_type)
            .body(audio.bytes.clone())
            .send()
            .await
            .map_err(|e| Error::from(e).in_stage(Error::Storage))?;
        check_status(resp)
            .await
            .map_err(|e| e.in_stage(Error::Storage))?;

        Ok(PublishedAsset {
            url: self.client.public_url(&self.bucket, &path),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use proptest::prelude::*;
    use reqwest::Client;
    use std::collections::HashSet;

    fn storage(server: &mockito::Server) -> SupabaseStorage {
        let client = SupabaseClient::with_client(Client::new(), &server.url(), "key");
        SupabaseStorage::new(client, "songs", "ai_dj")
    }

    #[tokio::test]
    async fn uploads_with_upsert_and_returns_public_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                Matcher::Regex(r"^/storage/v1/object/songs/ai_dj/dsw_alert_[0-9a-f]{8}\.mp3$".into()),
            )
            .match_header("content-type", "audio/mpeg")
            .match_header("x-upsert", "true")
            .match_body(Matcher::Exact("ID3audio".into()))
            .with_status(200)
            .with_body(r#"{"Key":"songs/ai_dj/x.mp3"}"#)
            .create_async()
            .await;

        let published = storage(&server)
            .publish(&AudioAsset::mp3(b"ID3audio".to_vec()))
            .await
            .unwrap();
        mock.assert_async().await;

        assert!(published.path.starts_with("ai_dj/dsw_alert_"));
        assert_eq!(
            published.url,
            format!("{}/storage/v1/object/public/songs/{}", server.url(), published.path)
        );
    }

    #[tokio::test]
    async fn rejected_upload_is_a_storage_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(403)
            .with_body("new row violates row-level security policy")
            .create_async()
            .await;

        let err = storage(&server)
            .publish(&AudioAsset::mp3(b"ID3audio".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "publish");
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn paths_do_not_collide() {
        let paths: HashSet<String> = (0..500).map(|_| storage_path("ai_dj", "mp3")).collect();
        assert_eq!(paths.len(), 500);
    }

    proptest! {
        #[test]
        fn path_keeps_prefix_and_extension(prefix in "[a-z_]{0,12}", ext in "(mp3|wav|ogg)") {
            let path = storage_path(&prefix, &ext);
            let expected_suffix = format!(".{}", ext);
            prop_assert!(path.ends_with(&expected_suffix));
            prop_assert!(path.starts_with(&prefix));
            prop_assert!(!path.starts_with('/'));
        }
    }

    #[tokio::test]
    async fn stalled_storage_is_a_publish_error_within_the_timeout() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let http = Client::builder()
            .timeout(std::time::Duration::from_millis(300))
            .build()
            .unwrap();
        let client = SupabaseClient::with_client(http, &format!("http://{}", addr), "key");
        let storage = SupabaseStorage::new(client, "songs", "ai_dj");

        let started = std::time::Instant::now();
        let err = storage
            .publish(&AudioAsset::mp3(b"ID3audio".to_vec()))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "publish");
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
