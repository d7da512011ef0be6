//! GraphQL documents sent to AniList.

use serde::{Deserialize, Serialize};

/// Heavy media fields to include in the list query. Each one noticeably
/// grows the response, so all are off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    #[serde(default)]
    pub include_relations: bool,
    #[serde(default)]
    pub include_characters: bool,
    #[serde(default)]
    pub include_studios: bool,
    #[serde(default)]
    pub include_staff: bool,
    #[serde(default)]
    pub include_tags: bool,
    #[serde(default)]
    pub include_external_links: bool,
}

pub const VIEWER_QUERY: &str = "query { Viewer { id name } }";

const ENTRY_FIELDS: &[&str] = &[
    "id",
    "status",
    "score",
    "progress",
    "progressVolumes",
    "repeat",
    "notes",
    "startedAt { year month day }",
    "completedAt { year month day }",
];

const MEDIA_FIELDS: &[&str] = &[
    "id",
    "idMal",
    "title { romaji english native userPreferred }",
    "startDate { year month day }",
    "endDate { year month day }",
    "format",
    "status",
    "description",
    "episodes",
    "chapters",
    "volumes",
    "countryOfOrigin",
    "coverImage { extraLarge large }",
    "genres",
    "synonyms",
    "averageScore",
    "isFavourite",
    "siteUrl",
];

const RELATIONS_FIELD: &str =
    "relations { edges { relationType node { id title { romaji english native userPreferred } format type } } }";

impl FetchOptions {
    fn heavy_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.include_relations {
            fields.push(RELATIONS_FIELD);
        }
        if self.include_characters {
            fields.push("characters { nodes { id name { full native userPreferred } } }");
        }
        if self.include_studios {
            fields.push("studios { nodes { id name } }");
        }
        if self.include_staff {
            fields.push("staff { nodes { id name { full native userPreferred } } }");
        }
        if self.include_tags {
            fields.push("tags { name }");
        }
        if self.include_external_links {
            fields.push("externalLinks { url site }");
        }
        fields
    }
}

/// `MediaListCollection` query for `$userId` / `$type`
pub fn list_query(options: &FetchOptions) -> String {
    let media_fields: Vec<&str> = MEDIA_FIELDS
        .iter()
        .copied()
        .chain(options.heavy_fields())
        .collect();

    format!(
        "query ($userId: Int!, $type: MediaType!) {{\n  MediaListCollection(userId: $userId, type: $type) {{\n    lists {{\n      name\n      status\n      entries {{\n        {}\n        media {{\n          {}\n        }}\n      }}\n    }}\n  }}\n}}\n",
        ENTRY_FIELDS.join("\n        "),
        media_fields.join("\n          "),
    )
}

/// Relation edges of one `Media($id)`
pub fn relations_query() -> String {
    format!("query ($id: Int!) {{\n  Media(id: $id) {{\n    id\n    {}\n  }}\n}}\n", RELATIONS_FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_query_has_no_heavy_fields() {
        let query = list_query(&FetchOptions::default());
        assert!(query.contains("MediaListCollection(userId: $userId, type: $type)"));
        assert!(query.contains("coverImage { extraLarge large }"));
        assert!(!query.contains("relations"));
        assert!(!query.contains("studios"));
    }

    #[test]
    fn test_heavy_fields_included_on_request() {
        let options = FetchOptions {
            include_studios: true,
            include_tags: true,
            ..Default::default()
        };
        let query = list_query(&options);
        assert!(query.contains("studios { nodes { id name } }"));
        assert!(query.contains("tags { name }"));
        assert!(!query.contains("characters"));
    }

    #[test]
    fn test_braces_balanced() {
        for query in [list_query(&FetchOptions::default()), relations_query()] {
            let open = query.matches('{').count();
            let close = query.matches('}').count();
            assert_eq!(open, close, "{}", query);
        }
    }
}
