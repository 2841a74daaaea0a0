//! Binder documents: versioned, multi-language content with embedded visuals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use super::common::{Language, Thumbnail};
use crate::item::core::error::RepositoryError;
use crate::item::core::repository::StoredItem;
use crate::item::lifecycle::SoftDeletable;
use crate::item::ItemKind;

/// An image or video reference inside an image chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visual {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_behaviour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Image chunk entry. Older binders store bare URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkVisual {
    Visual(Visual),
    Url(String),
}

impl ChunkVisual {
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            ChunkVisual::Visual(visual) => &visual.url,
            ChunkVisual::Url(url) => url,
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            ChunkVisual::Visual(visual) => visual.id.as_deref(),
            ChunkVisual::Url(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextModule {
    pub key: String,
    #[serde(rename = "iso639_1", default)]
    pub iso639_1: String,
    #[serde(default)]
    pub chunks: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageModule {
    pub key: String,
    #[serde(default)]
    pub chunks: Vec<Vec<ChunkVisual>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMeta {
    pub key: String,
    #[serde(rename = "type")]
    pub module_type: String,
    #[serde(rename = "iso639_1", default, skip_serializing_if = "Option::is_none")]
    pub iso639_1: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextModules {
    #[serde(default)]
    pub chunked: Vec<TextModule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageModules {
    #[serde(default)]
    pub chunked: Vec<ImageModule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BinderModules {
    #[serde(default)]
    pub meta: Vec<ModuleMeta>,
    #[serde(default)]
    pub text: TextModules,
    #[serde(default)]
    pub images: ImageModules,
}

impl BinderModules {
    /// Every visual in every image chunk.
    pub fn visuals_mut(&mut self) -> impl Iterator<Item = &mut ChunkVisual> {
        self.images
            .chunked
            .iter_mut()
            .flat_map(|module| module.chunks.iter_mut())
            .flat_map(|chunk| chunk.iter_mut())
    }

    pub fn visuals(&self) -> impl Iterator<Item = &ChunkVisual> {
        self.images
            .chunked
            .iter()
            .flat_map(|module| module.chunks.iter())
            .flat_map(|chunk| chunk.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub account_id: String,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub modules: BinderModules,
    #[serde(default)]
    pub thumbnail: Thumbnail,
    #[serde(default)]
    pub author_ids: Vec<String>,
    #[serde(default)]
    pub ancestor_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_group_collection_id: Option<String>,
}

impl Binder {
    #[must_use]
    pub fn new(account_id: impl Into<String>, language: Language) -> Self {
        Self {
            account_id: account_id.into(),
            languages: vec![language],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn language_codes(&self) -> Vec<&str> {
        self.languages.iter().map(|l| l.iso639_1.as_str()).collect()
    }

    /// Give text modules without a language the language of their meta entry.
    ///
    /// Returns how many modules were filled in.
    pub fn normalize_text_languages(&mut self) -> usize {
        let languages: HashMap<&str, &str> = self
            .modules
            .meta
            .iter()
            .filter_map(|meta| Some((meta.key.as_str(), meta.iso639_1.as_deref()?)))
            .collect();
        let mut filled: usize = 0;
        for module in &mut self.modules.text.chunked {
            if !module.iso639_1.is_empty() {
                continue;
            }
            if let Some(language) = languages.get(module.key.as_str()) {
                module.iso639_1 = (*language).to_string();
                filled = filled.saturating_add(1);
            }
        }
        filled
    }

    /// Structural checks applied before a binder is written.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if self.account_id.trim().is_empty() {
            return Err(RepositoryError::invalid("binder has no account id"));
        }
        let mut seen = HashSet::new();
        for language in &self.languages {
            if !seen.insert(language.iso639_1.as_str()) {
                return Err(RepositoryError::invalid(format!(
                    "language {} appears more than once",
                    language.iso639_1
                )));
            }
        }
        let known_keys: HashSet<&str> = self
            .modules
            .text
            .chunked
            .iter()
            .map(|m| m.key.as_str())
            .chain(self.modules.images.chunked.iter().map(|m| m.key.as_str()))
            .collect();
        if let Some(orphan) = self
            .modules
            .meta
            .iter()
            .find(|meta| !known_keys.contains(meta.key.as_str()))
        {
            return Err(RepositoryError::invalid(format!(
                "module meta {} has no matching module",
                orphan.key
            )));
        }
        Ok(())
    }
}

impl StoredItem for Binder {
    const KIND: ItemKind = ItemKind::Document;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl SoftDeletable for Binder {
    fn deletion_time(&self) -> Option<DateTime<Utc>> {
        self.deletion_time
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>, deleted_by: Option<&str>, group: Option<&str>) {
        self.deletion_time = Some(at);
        self.deleted_by_id = deleted_by.map(str::to_string);
        self.deleted_group_collection_id = group.map(str::to_string);
    }

    fn clear_deletion(&mut self) {
        self.deletion_time = None;
        self.deleted_by_id = None;
        self.deleted_group_collection_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_url_chunks_deserialize() {
        let source = json!({
            "accountId": "acc-1",
            "languages": [{ "iso639_1": "en", "modules": ["t1"], "priority": 0 }],
            "modules": {
                "images": { "chunked": [{ "key": "i1", "chunks": [
                    ["https://images.example.com/img-abc/medium"],
                    [{ "id": "img-def", "url": "https://images.example.com/img-def/original", "rotation": 90 }]
                ]}]}
            }
        });
        let binder: Binder = serde_json::from_value(source).unwrap();
        let visuals: Vec<_> = binder.modules.visuals().collect();
        assert_eq!(visuals.len(), 2);
        assert!(matches!(visuals[0], ChunkVisual::Url(_)));
        assert_eq!(visuals[1].id(), Some("img-def"));
        // Unknown visual properties survive a round trip
        let back = serde_json::to_value(&binder).unwrap();
        assert_eq!(
            back["modules"]["images"]["chunked"][0]["chunks"][1][0]["rotation"],
            90
        );
        assert_eq!(back["languages"][0]["iso639_1"], "en");
    }

    #[test]
    fn test_validate_rejects_duplicate_languages() {
        let mut binder = Binder::new("acc-1", Language::new("en", "Title"));
        binder.languages.push(Language::new("en", "Other"));
        assert!(matches!(
            binder.validate(),
            Err(RepositoryError::InvalidItem(_))
        ));
    }

    #[test]
    fn test_validate_rejects_orphan_meta() {
        let mut binder = Binder::new("acc-1", Language::new("en", "Title"));
        binder.modules.meta.push(ModuleMeta {
            key: "t9".to_string(),
            module_type: "text".to_string(),
            iso639_1: Some("en".to_string()),
            is_deleted: false,
        });
        assert!(binder.validate().is_err());
    }

    #[test]
    fn test_text_modules_inherit_meta_language() {
        let mut binder = Binder::new("acc-1", Language::new("nl", "Titel"));
        binder.modules.meta.push(ModuleMeta {
            key: "t1".to_string(),
            module_type: "text".to_string(),
            iso639_1: Some("nl".to_string()),
            is_deleted: false,
        });
        binder.modules.text.chunked.push(TextModule {
            key: "t1".to_string(),
            iso639_1: String::new(),
            chunks: vec![vec!["<p>Hallo</p>".to_string()]],
        });
        binder.modules.text.chunked.push(TextModule {
            key: "t2".to_string(),
            iso639_1: "en".to_string(),
            chunks: Vec::new(),
        });

        assert_eq!(binder.normalize_text_languages(), 1);
        assert_eq!(binder.modules.text.chunked[0].iso639_1, "nl");
        assert_eq!(binder.modules.text.chunked[1].iso639_1, "en");
    }

    #[test]
    fn test_soft_delete_fields() {
        let mut binder = Binder::new("acc-1", Language::new("en", "Title"));
        let now = Utc::now();
        binder.mark_deleted(now, Some("user-1"), Some("col-1"));
        assert_eq!(binder.deletion_time(), Some(now));
        assert_eq!(binder.deleted_group_collection_id.as_deref(), Some("col-1"));
        binder.clear_deletion();
        assert!(binder.deletion_time.is_none());
        assert!(binder.deleted_by_id.is_none());
        let value = serde_json::to_value(&binder).unwrap();
        assert!(value.get("deletionTime").is_none());
    }
}
