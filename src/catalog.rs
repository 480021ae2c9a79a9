use crate::error::{Error, Result};
use crate::supabase::{check_status, json_body, SupabaseClient};
use async_trait::async_trait;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Stand-in for a row whose title is null or missing.
pub const UNTITLED: &str = "Untitled";

/// A catalog row flagged as a Dead Song Walking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedEntity {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default = "untitled", deserialize_with = "title_or_untitled")]
    pub title: String,
    #[serde(rename = "artist_name", default)]
    pub artist: Option<String>,
    #[serde(rename = "is_dsw", default, deserialize_with = "null_as_false")]
    pub is_flagged: bool,
    #[serde(rename = "dsw_announced", default, deserialize_with = "null_as_false")]
    pub announced: bool,
}

impl FlaggedEntity {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: Some(artist.into()),
            is_flagged: true,
            announced: false,
        }
    }

    /// Flagged and not yet acknowledged.
    pub fn is_pending(&self) -> bool {
        self.is_flagged && !self.announced
    }
}

/// Source of flagged tracks, and the commit point once one is announced.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Every flagged track that has not been announced yet. Order is whatever
    /// the store returns.
    async fn fetch(&self) -> Result<Vec<FlaggedEntity>>;

    /// Marks exactly `id` as announced. Only call this after the announcement
    /// has been injected.
    async fn acknowledge(&self, id: &str) -> Result<()>;
}

pub struct PostgrestCatalog {
    client: SupabaseClient,
    table: String,
}

impl PostgrestCatalog {
    pub fn new(client: SupabaseClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl EventSource for PostgrestCatalog {
    async fn fetch(&self) -> Result<Vec<FlaggedEntity>> {
        let query = [
            ("select", "*".to_string()),
            ("is_dsw", "eq.true".to_string()),
            ("dsw_announced", "eq.false".to_string()),
        ];
        let rows = async {
            let resp = self.client.select(&self.table, &query).send().await?;
            let rows: Vec<Value> = json_body(check_status(resp).await?).await?;
            Ok::<_, Error>(rows)
        }
        .await
        .map_err(|e| e.in_stage(Error::Catalog))?;

        // One bad row must not hold back the rest of the batch.
        let total = rows.len();
        let mut decoded = Vec::with_capacity(total);
        for row in rows {
            let row_id = row.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<FlaggedEntity>(row) {
                Ok(entity) => decoded.push(entity),
                Err(e) => warn!(
                    row_id = %row_id,
                    error = %e,
                    "skipping malformed catalog row"
                ),
            }
        }
        let usable = decoded.len();
        let pending: Vec<FlaggedEntity> = decoded.into_iter().filter(|r| r.is_pending()).collect();
        if pending.len() != usable {
            debug!(
                dropped = usable - pending.len(),
                "ignoring rows that are unflagged or already announced"
            );
        }
        Ok(pending)
    }

    async fn acknowledge(&self, id: &str) -> Result<()> {
        let query = [("id", format!("eq.{}", id))];
        let updated = async {
            let resp = self
                .client
                .update(&self.table, &query)
                .json(&json!({ "dsw_announced": true }))
                .send()
                .await?;
            let rows: Vec<Value> = json_body(check_status(resp).await?).await?;
            Ok::<_, Error>(rows)
        }
        .await
        .map_err(|e| Error::Acknowledge {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        if updated.is_empty() {
            return Err(Error::Acknowledge {
                id: id.to_string(),
                reason: "no row matched".to_string(),
            });
        }
        Ok(())
    }
}

fn id_as_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("unsupported id value: {}", other))),
    }
}

fn untitled() -> String {
    UNTITLED.to_string()
}

fn title_or_untitled<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(untitled))
}

fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}
