//! Shared AniList wire types for the man-sync service and its tooling.
//!
//! Field names follow the GraphQL schema (camelCase on the wire). Enum-like
//! schema values (`format`, `status`, ...) are kept as plain strings so new
//! values added upstream never break decoding.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

// =====================================================
// GraphQL Envelope
// =====================================================

#[derive(Debug, Serialize)]
pub struct GraphQlRequest {
    pub query: String,
    pub variables: Value,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GraphQlResponse<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
}

// =====================================================
// Query Payloads
// =====================================================

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    #[serde(rename = "Viewer")]
    pub viewer: Option<Viewer>,
}

/// The account an access token belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct MediaListCollectionData {
    #[serde(rename = "MediaListCollection")]
    pub collection: Option<MediaListCollection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaListCollection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub lists: Vec<Option<MediaListGroup>>,
}

/// One named list of the collection ("Watching", "Completed", custom lists...)
#[derive(Debug, Default, Deserialize)]
pub struct MediaListGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entries: Vec<Option<MediaListEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct MediaData {
    #[serde(rename = "Media")]
    pub media: Option<Media>,
}

/// GraphQL lists may come back as `null` instead of empty
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =====================================================
// Domain Types
// =====================================================

/// Which of the user's lists to sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Anime,
    Manga,
}

impl ListKind {
    /// Value of the `MediaType` GraphQL enum
    pub fn media_type(self) -> &'static str {
        match self {
            ListKind::Anime => "ANIME",
            ListKind::Manga => "MANGA",
        }
    }
}

/// Partial calendar date; any component may be unknown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
    pub user_preferred: Option<String>,
}

impl MediaTitle {
    /// First non-empty title, in the order the site itself prefers them
    pub fn preferred(&self) -> Option<&str> {
        [&self.user_preferred, &self.romaji, &self.english, &self.native]
            .into_iter()
            .filter_map(|t| t.as_deref())
            .find(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub extra_large: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    pub user_preferred: Option<String>,
    pub full: Option<String>,
    pub native: Option<String>,
}

/// A character or staff member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    #[serde(default)]
    pub name: Option<PersonName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Studio {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Connection<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub nodes: Vec<Option<T>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaTag {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub url: Option<String>,
    pub site: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedMedia {
    pub id: i64,
    #[serde(default)]
    pub title: Option<MediaTitle>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEdge {
    #[serde(default)]
    pub relation_type: Option<String>,
    #[serde(default)]
    pub node: Option<RelatedMedia>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationConnection {
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<Option<RelationEdge>>,
}

/// Catalog record of an anime or manga
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: i64,
    pub id_mal: Option<i64>,
    pub title: Option<MediaTitle>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub format: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub episodes: Option<i64>,
    pub chapters: Option<i64>,
    pub volumes: Option<i64>,
    pub country_of_origin: Option<String>,
    pub cover_image: Option<CoverImage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub synonyms: Vec<String>,
    pub average_score: Option<i64>,
    pub is_favourite: Option<bool>,
    pub site_url: Option<String>,
    pub relations: Option<RelationConnection>,
    pub characters: Option<Connection<Person>>,
    pub studios: Option<Connection<Studio>>,
    pub staff: Option<Connection<Person>>,
    pub tags: Option<Vec<MediaTag>>,
    pub external_links: Option<Vec<ExternalLink>>,
    /// Fields requested by a custom query that this struct does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One row of a user's list: catalog media plus the user's tracking state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaListEntry {
    pub id: i64,
    pub status: Option<String>,
    pub score: Option<f64>,
    pub progress: Option<i64>,
    pub progress_volumes: Option<i64>,
    pub repeat: Option<i64>,
    pub notes: Option<String>,
    pub started_at: Option<FuzzyDate>,
    pub completed_at: Option<FuzzyDate>,
    pub media: Option<Media>,
    /// Name of the list group the entry was fetched from (not part of the wire payload)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaListEntry {
    pub fn preferred_title(&self) -> Option<&str> {
        self.media.as_ref()?.title.as_ref()?.preferred()
    }
}
