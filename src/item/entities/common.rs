use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Language variant of a binder or publication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    #[serde(rename = "iso639_1")]
    pub iso639_1: String,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub story_title: String,
}

impl Language {
    #[must_use]
    pub fn new(iso639_1: impl Into<String>, story_title: impl Into<String>) -> Self {
        Self {
            iso639_1: iso639_1.into(),
            modules: Vec::new(),
            priority: 0,
            story_title: story_title.into(),
        }
    }
}

/// Cover image of a binder, collection or publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_behaviour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Thumbnail {
    #[must_use]
    pub fn with_medium(url: impl Into<String>) -> Self {
        Self {
            medium: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Kind of a collection element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Document,
    Collection,
}

/// Reference from a collection to a child document or collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionElement {
    pub kind: ElementKind,
    pub key: String,
}

impl CollectionElement {
    #[must_use]
    pub fn document(key: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Document,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn collection(key: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Collection,
            key: key.into(),
        }
    }
}
