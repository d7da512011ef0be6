//! Typed GraphQL client for the AniList API.

use super::query::{self, FetchOptions};
use crate::models::SyncConfig;
use crate::sync::ListSource;
use anilist_types::{
    GraphQlRequest, GraphQlResponse, ListKind, MediaData, MediaListCollectionData, MediaListEntry, Viewer,
    ViewerData,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Longest slice of an error body kept in `AniListError::Status`
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Error)]
pub enum AniListError {
    #[error("AniList request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AniList returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AniList query failed: {0}")]
    GraphQl(String),
    #[error("could not decode AniList response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("no AniList access token configured to resolve the current user")]
    MissingToken,
}

pub struct AniListClient {
    endpoint: String,
    access_token: Option<String>,
    user_id: Option<i64>,
    viewer_id: Mutex<Option<i64>>,
    client: reqwest::Client,
}

// ── Client impl ─────────────────────────────────────

impl AniListClient {
    pub fn new(endpoint: &str, access_token: Option<String>) -> Result<Self, AniListError> {
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token,
            user_id: None,
            viewer_id: Mutex::new(None),
            client: crate::http::http_client()?,
        })
    }

    /// Fetch lists of this user instead of the token's account
    pub fn with_user_id(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    async fn query<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T, AniListError> {
        let mut request = self.client.post(&self.endpoint).json(&GraphQlRequest {
            query: query.to_string(),
            variables,
        });
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(AniListError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        decode_response(&body)
    }

    /// Account the access token belongs to
    pub async fn viewer(&self) -> Result<Viewer, AniListError> {
        if self.access_token.is_none() {
            return Err(AniListError::MissingToken);
        }
        let data: ViewerData = self.query(query::VIEWER_QUERY, json!({})).await?;
        data.viewer
            .ok_or_else(|| AniListError::GraphQl("Viewer missing from response".to_string()))
    }

    /// Explicit user id first, then the settings file, then the token's account
    pub async fn resolve_user_id(&self, configured: Option<i64>) -> Result<i64, AniListError> {
        if let Some(id) = self.user_id.or(configured) {
            return Ok(id);
        }
        let cached = *self.viewer_id.lock();
        if let Some(id) = cached {
            return Ok(id);
        }

        let viewer = self.viewer().await?;
        log::info!("[ANILIST] Authenticated as {} (id {})", viewer.name, viewer.id);
        *self.viewer_id.lock() = Some(viewer.id);
        Ok(viewer.id)
    }

    /// All entries of a user's list, flattened across its groups
    pub async fn fetch_list(
        &self,
        user_id: i64,
        kind: ListKind,
        options: &FetchOptions,
    ) -> Result<Vec<MediaListEntry>, AniListError> {
        self.fetch_list_with_query(user_id, kind, &query::list_query(options))
            .await
    }

    /// Same as `fetch_list` with a caller-supplied `MediaListCollection` query.
    /// The query receives `$userId` and `$type`.
    pub async fn fetch_list_with_query(
        &self,
        user_id: i64,
        kind: ListKind,
        list_query: &str,
    ) -> Result<Vec<MediaListEntry>, AniListError> {
        let variables = json!({ "userId": user_id, "type": kind.media_type() });
        let data: MediaListCollectionData = self.query(list_query, variables).await?;
        let collection = data
            .collection
            .ok_or_else(|| AniListError::GraphQl("MediaListCollection missing from response".to_string()))?;

        let entries = flatten_groups(collection.lists);
        log::info!("[ANILIST] Fetched {} {} entries for user {}", entries.len(), kind, user_id);
        Ok(entries)
    }

    /// Fill in relation edges with one `Media` request per entry. Failures
    /// leave the entry as fetched.
    pub async fn enrich_relations(&self, entries: &mut [MediaListEntry], delay: Duration) {
        let query = query::relations_query();
        let mut first = true;

        for entry in entries.iter_mut() {
            let Some(media) = entry.media.as_mut() else {
                continue;
            };
            if !first && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            first = false;

            match self.query::<MediaData>(&query, json!({ "id": media.id })).await {
                Ok(MediaData { media: Some(fetched) }) => media.relations = fetched.relations,
                Ok(MediaData { media: None }) => {
                    log::warn!("[ANILIST] No media returned for id {} while fetching relations", media.id);
                }
                Err(e) => {
                    log::warn!("[ANILIST] Failed to fetch relations for media {}: {}", media.id, e);
                }
            }
        }
    }
}

#[async_trait]
impl ListSource for AniListClient {
    async fn fetch_entries(&self, kind: ListKind, config: &SyncConfig) -> Result<Vec<MediaListEntry>, AniListError> {
        let user_id = self.resolve_user_id(config.user_id).await?;

        let mut entries = match config.custom_query(kind) {
            Some(custom) => {
                log::debug!("[ANILIST] Using custom {} query", kind);
                self.fetch_list_with_query(user_id, kind, custom).await?
            }
            None => self.fetch_list(user_id, kind, &config.fetch_options).await?,
        };

        if config.enrich_relations {
            self.enrich_relations(&mut entries, Duration::from_millis(config.enrich_delay_ms))
                .await;
        }
        Ok(entries)
    }
}

fn decode_response<T: DeserializeOwned>(body: &str) -> Result<T, AniListError> {
    let envelope: GraphQlResponse<T> = serde_json::from_str(body).map_err(AniListError::Decode)?;

    if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
        let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
        return Err(AniListError::GraphQl(messages.join("; ")));
    }

    envelope
        .data
        .ok_or_else(|| AniListError::GraphQl("response has no data".to_string()))
}

/// Entries of every group in order, each tagged with its group's name
fn flatten_groups(groups: Vec<Option<anilist_types::MediaListGroup>>) -> Vec<MediaListEntry> {
    groups
        .into_iter()
        .flatten()
        .flat_map(|group| {
            let name = group.name;
            group.entries.into_iter().flatten().map(move |mut entry| {
                entry.list_name = name.clone();
                entry
            })
        })
        .collect()
}
