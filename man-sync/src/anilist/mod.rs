//! AniList integration: GraphQL documents and the HTTP client that runs them.

pub mod client;
pub mod query;

pub use client::{AniListClient, AniListError};
pub use query::FetchOptions;
