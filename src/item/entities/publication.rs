use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::binder::{Binder, BinderModules};
use super::common::{Language, Thumbnail};
use crate::item::core::repository::StoredItem;
use crate::item::ItemKind;

/// A published snapshot of one language of a binder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub binder_id: String,
    pub account_id: String,
    pub language: Language,
    #[serde(default)]
    pub is_active: bool,
    pub publication_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpublish_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_by: Option<String>,
    #[serde(default)]
    pub modules: BinderModules,
    #[serde(default)]
    pub thumbnail: Thumbnail,
    #[serde(default)]
    pub author_ids: Vec<String>,
    #[serde(default)]
    pub ancestor_ids: Vec<String>,
}

impl Publication {
    /// Snapshot `language` of `binder` as a new, not yet active publication.
    #[must_use]
    pub fn from_binder(binder_id: &str, binder: &Binder, language: Language) -> Self {
        Self {
            id: None,
            binder_id: binder_id.to_string(),
            account_id: binder.account_id.clone(),
            language,
            is_active: false,
            publication_date: Utc::now(),
            unpublish_date: None,
            published_by: None,
            modules: binder.modules.clone(),
            thumbnail: binder.thumbnail.clone(),
            author_ids: binder.author_ids.clone(),
            ancestor_ids: binder.ancestor_ids.clone(),
        }
    }
}

impl StoredItem for Publication {
    const KIND: ItemKind = ItemKind::Publication;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}
