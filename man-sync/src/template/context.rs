//! Build the template context for one list entry.
//!
//! The raw entry (camelCase, as fetched) is kept whole so any field is
//! reachable by path (`media.title.english`, `startedAt`). Flat aliases are
//! added on top for the common fields; they never shadow a raw key.

use anilist_types::MediaListEntry;
use serde_json::{json, Map, Value};

fn names<'a>(items: impl Iterator<Item = Option<&'a str>>) -> Value {
    Value::Array(
        items
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    )
}

fn alias(context: &mut Map<String, Value>, key: &str, value: Value) {
    context.entry(key.to_string()).or_insert(value);
}

/// Flatten an entry into the value templates are rendered against
pub fn entry_context(entry: &MediaListEntry) -> Value {
    let mut context = match serde_json::to_value(entry) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    alias(&mut context, "user_status", json!(entry.status));
    alias(&mut context, "watch_status", json!(entry.status));
    alias(&mut context, "user_score", json!(entry.score));
    alias(&mut context, "started_at", json!(entry.started_at));
    alias(&mut context, "completed_at", json!(entry.completed_at));

    let Some(media) = entry.media.as_ref() else {
        return Value::Object(context);
    };
    let title = media.title.clone().unwrap_or_default();

    alias(&mut context, "media_id", json!(media.id));
    alias(&mut context, "id_mal", json!(media.id_mal));
    alias(&mut context, "title", json!(entry.preferred_title()));
    alias(&mut context, "english_title", json!(title.english));
    alias(&mut context, "romaji_title", json!(title.romaji));
    alias(&mut context, "native_title", json!(title.native));
    alias(&mut context, "format", json!(media.format));
    alias(&mut context, "media_type", json!(media.format));
    alias(&mut context, "media_status", json!(media.status));
    alias(&mut context, "description", json!(media.description));
    alias(&mut context, "synopsis", json!(media.description));
    alias(&mut context, "episodes", json!(media.episodes));
    alias(&mut context, "chapters", json!(media.chapters));
    alias(&mut context, "volumes", json!(media.volumes));
    alias(&mut context, "country", json!(media.country_of_origin));
    alias(&mut context, "genres", json!(media.genres));
    alias(&mut context, "synonyms", json!(media.synonyms));
    alias(&mut context, "average_score", json!(media.average_score));
    alias(&mut context, "is_favourite", json!(media.is_favourite));
    alias(&mut context, "site_url", json!(media.site_url));
    alias(&mut context, "start_date", json!(media.start_date));
    alias(&mut context, "end_date", json!(media.end_date));

    let cover = media
        .cover_image
        .as_ref()
        .and_then(|c| c.extra_large.clone().or_else(|| c.large.clone()));
    alias(&mut context, "cover", json!(cover));

    let studios = media.studios.as_ref().map(|c| c.nodes.as_slice()).unwrap_or_default();
    alias(
        &mut context,
        "studios",
        names(studios.iter().map(|s| s.as_ref().map(|s| s.name.as_str()))),
    );

    for (key, people) in [("staff", &media.staff), ("characters", &media.characters)] {
        let nodes = people.as_ref().map(|c| c.nodes.as_slice()).unwrap_or_default();
        let value = names(nodes.iter().map(|p| {
            let name = p.as_ref()?.name.as_ref()?;
            name.user_preferred.as_deref().or(name.full.as_deref())
        }));
        alias(&mut context, key, value);
    }

    let tags = media.tags.as_deref().unwrap_or_default();
    alias(
        &mut context,
        "tags",
        names(tags.iter().map(|t| Some(t.name.as_str()))),
    );

    let relations: Vec<Value> = media
        .relations
        .as_ref()
        .map(|r| r.edges.as_slice())
        .unwrap_or_default()
        .iter()
        .flatten()
        .filter_map(|edge| {
            let node = edge.node.as_ref()?;
            Some(json!({
                "id": node.id,
                "relation_type": edge.relation_type,
                "title": node.title.as_ref().and_then(|t| t.preferred()),
                "format": node.format,
                "type": node.media_type,
            }))
        })
        .collect();
    alias(&mut context, "relations", Value::Array(relations));

    Value::Object(context)
}
