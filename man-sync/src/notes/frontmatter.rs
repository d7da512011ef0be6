//! Read and write the YAML metadata block at the top of a note.
//!
//! Only the block is ever rewritten; the body after the closing `---` is
//! carried through byte for byte.

use serde::de::Error as _;
use serde_json::{Map, Value};

/// A note's metadata record, in the order the keys appear in the file
pub type Metadata = Map<String, Value>;

const DELIMITER: &str = "---";

/// Split content into (metadata yaml, body). `None` when the note has no
/// well-formed block, in which case the body is the whole content.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let text = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(after_open) = text.strip_prefix(DELIMITER) else {
        return (None, content);
    };
    let Some(rest) = after_open
        .strip_prefix("\r\n")
        .or_else(|| after_open.strip_prefix('\n'))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }

    (None, content)
}

/// Parse a metadata block. An empty block is an empty record; anything
/// other than a mapping is an error.
pub fn parse_metadata(yaml: &str) -> Result<Metadata, serde_yaml::Error> {
    if yaml.trim().is_empty() {
        return Ok(Metadata::new());
    }
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Metadata::new()),
        _ => Err(serde_yaml::Error::custom("metadata block is not a mapping")),
    }
}

/// Metadata of a whole note (empty when it has no block)
pub fn read_metadata(content: &str) -> Result<Metadata, serde_yaml::Error> {
    match split_frontmatter(content) {
        (Some(yaml), _) => parse_metadata(yaml),
        (None, _) => Ok(Metadata::new()),
    }
}

/// Apply rendered keys over the current record. Keys not rendered are left
/// untouched; existing keys keep their position.
pub fn merge_metadata(current: &Metadata, rendered: &Metadata) -> (Metadata, bool) {
    let mut merged = current.clone();
    let mut changed = false;

    for (key, value) in rendered {
        if merged.get(key) != Some(value) {
            merged.insert(key.clone(), value.clone());
            changed = true;
        }
    }

    (merged, changed)
}

/// Note text with `metadata` as its block followed by `body`
pub fn render_note(metadata: &Metadata, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = if metadata.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(metadata)?
    };
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

/// Replace the block of an existing note, keeping its body
pub fn replace_metadata(content: &str, metadata: &Metadata) -> Result<String, serde_yaml::Error> {
    let (_, body) = split_frontmatter(content);
    render_note(metadata, body)
}
