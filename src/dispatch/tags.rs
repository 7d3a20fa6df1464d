//! Tag spec parsing
//!
//! Tags are given as `key1=val1,key2=val2,key3,key4=`.

use super::error::DispatchError;
use crate::provider::image::Tag;

/// How bare keys are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    /// `key` creates the tag with an empty value
    Create,
    /// `key` deletes the tag whatever its value; `key=` only if empty
    Delete,
}

/// Parse a comma-separated tag spec
pub fn parse_tags(spec: &str, mode: TagMode) -> Result<Vec<Tag>, DispatchError> {
    let mut tags = Vec::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let tag = match entry.split_once('=') {
            Some((key, value)) => Tag::new(key.trim(), value.trim()),
            None => match mode {
                TagMode::Create => Tag::new(entry, ""),
                TagMode::Delete => Tag::key_only(entry),
            },
        };

        if tag.key.is_empty() {
            return Err(DispatchError::configuration(format!(
                "invalid tag '{}': key is empty",
                entry
            )));
        }
        tags.push(tag);
    }

    if tags.is_empty() {
        return Err(DispatchError::configuration("no tags given"));
    }

    Ok(tags)
}
