//! Thin REST client for the hosted catalog store.
//!
//! Speaks the two dialects the announcer needs: PostgREST under `/rest/v1`
//! for table reads and writes, and the storage API under `/storage/v1` for
//! blobs. Every request carries the service key both as `apikey` and as a
//! bearer token.

use crate::config_loader::Settings;
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    key: String,
}

impl SupabaseClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self::with_client(
            http,
            &settings.supabase_url,
            &settings.supabase_key,
        ))
    }

    pub fn with_client(http: Client, base_url: &str, key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /rest/v1/{table}` with the given query pairs.
    pub fn select(&self, table: &str, query: &[(&str, String)]) -> RequestBuilder {
        self.authorized(self.http.get(self.rest_url(table)))
            .query(query)
    }

    /// `PATCH /rest/v1/{table}` returning the updated rows.
    pub fn update(&self, table: &str, query: &[(&str, String)]) -> RequestBuilder {
        self.authorized(self.http.patch(self.rest_url(table)))
            .query(query)
            .header("Prefer", "return=representation")
    }

    /// `POST /rest/v1/{table}`.
    pub fn insert(&self, table: &str) -> RequestBuilder {
        self.authorized(self.http.post(self.rest_url(table)))
            .header("Prefer", "return=minimal")
    }

    /// `POST /storage/v1/object/{bucket}/{path}` with upsert enabled.
    pub fn upload(&self, bucket: &str, path: &str, content_type: &str) -> RequestBuilder {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        self.authorized(self.http.post(url))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
    }

    /// Public URL of an object in a public bucket. No request is made.
    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.key).bearer_auth(&self.key)
    }
}

/// Turns a non-2xx response into [`Error::Status`] carrying the body text.
pub async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}

/// Reads the whole body and decodes it as JSON.
///
/// A body that arrives but does not parse is [`Error::Serialization`], so bad
/// data never shows up as a network failure.
pub async fn json_body<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
