//! Machine images
//!
//! Wire and in-memory representation of an image as returned by a regional
//! image API, plus the request types region clients accept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Owner filter value selecting images owned by the calling account
pub const OWNER_SELF: &str = "self";

/// Image information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(rename = "imageId")]
    pub id: String,
    /// Owning region, filled in by the region client that listed the image
    #[serde(default)]
    pub region: String,
    #[serde(rename = "creationDate", default)]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub state_reason: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Provider-specific attributes the dispatcher never looks at
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Image {
    /// Create a bare image, mostly useful for tests and fixtures
    pub fn new(id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            region: region.into(),
            creation_time: None,
            name: None,
            description: None,
            state: "available".to_string(),
            state_reason: None,
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn created_at(mut self, time: DateTime<Utc>) -> Self {
        self.creation_time = Some(time);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// State with the failure reason appended for failed images
    pub fn state_display(&self) -> String {
        match (&self.state_reason, self.state.as_str()) {
            (Some(reason), "failed") => format!("{} ({})", self.state, reason),
            _ => self.state.clone(),
        }
    }
}

/// Image tag. A missing value means "any value" when deleting tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn key_only(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}:{}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// Filter applied when listing images in a region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub owner: String,
    pub image_ids: Vec<String>,
}

impl ListFilter {
    /// Images owned by the calling account
    pub fn owned() -> Self {
        Self {
            owner: OWNER_SELF.to_string(),
            image_ids: Vec::new(),
        }
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Whether an image passes the id part of this filter
    pub fn matches(&self, image: &Image) -> bool {
        self.image_ids.is_empty() || self.image_ids.iter().any(|id| *id == image.id)
    }
}

impl Default for ListFilter {
    fn default() -> Self {
        Self::owned()
    }
}

/// Request to copy one image into another region
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyImageInput {
    pub source_image_id: String,
    pub source_region: String,
    pub destination_region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub description: String,
    /// Idempotency token so a repeated request does not create a second copy
    pub client_token: String,
    pub dry_run: bool,
}

/// One page of a list response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ImagePage {
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
