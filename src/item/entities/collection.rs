//! Collections: ordered containers of documents and other collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{CollectionElement, ElementKind, Thumbnail};
use crate::item::core::repository::StoredItem;
use crate::item::lifecycle::SoftDeletable;
use crate::item::ItemKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionTitle {
    pub language_code: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub account_id: String,
    #[serde(default)]
    pub titles: Vec<CollectionTitle>,
    #[serde(default)]
    pub thumbnail: Thumbnail,
    #[serde(default)]
    pub elements: Vec<CollectionElement>,
    /// Children soft-deleted out of this collection, kept for recovery.
    #[serde(default)]
    pub deleted_elements: Vec<CollectionElement>,
    /// Whether any descendant document has an active publication.
    #[serde(default)]
    pub has_publications: bool,
    #[serde(default)]
    pub is_root_collection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_collection_id: Option<String>,
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

impl Collection {
    #[must_use]
    pub fn new(
        account_id: impl Into<String>,
        language_code: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            titles: vec![CollectionTitle {
                language_code: language_code.into(),
                title: title.into(),
            }],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_element(&self, key: &str) -> bool {
        self.elements.iter().any(|e| e.key == key)
    }

    /// Split live elements into document keys and collection keys.
    #[must_use]
    pub fn partition_elements(&self) -> (Vec<String>, Vec<String>) {
        let mut documents = Vec::new();
        let mut collections = Vec::new();
        for element in &self.elements {
            match element.kind {
                ElementKind::Document => documents.push(element.key.clone()),
                ElementKind::Collection => collections.push(element.key.clone()),
            }
        }
        (documents, collections)
    }

    /// Remove an element from both live and deleted lists.
    pub fn remove_element(&mut self, key: &str) -> bool {
        let before = self.elements.len().saturating_add(self.deleted_elements.len());
        self.elements.retain(|e| e.key != key);
        self.deleted_elements.retain(|e| e.key != key);
        before != self.elements.len().saturating_add(self.deleted_elements.len())
    }

    /// Move a live element to the deleted list. Returns false if absent.
    pub fn move_to_deleted(&mut self, key: &str) -> bool {
        let Some(position) = self.elements.iter().position(|e| e.key == key) else {
            return false;
        };
        let element = self.elements.remove(position);
        if !self.deleted_elements.contains(&element) {
            self.deleted_elements.push(element);
        }
        true
    }

    /// Move a deleted element back to the live list. Returns false if absent.
    pub fn restore_from_deleted(&mut self, key: &str) -> bool {
        let Some(position) = self.deleted_elements.iter().position(|e| e.key == key) else {
            return false;
        };
        let element = self.deleted_elements.remove(position);
        if !self.elements.contains(&element) {
            self.elements.push(element);
        }
        true
    }
}

impl StoredItem for Collection {
    const KIND: ItemKind = ItemKind::Collection;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl SoftDeletable for Collection {
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

    fn sample() -> Collection {
        let mut collection = Collection::new("acc-1", "en", "Manuals");
        collection.elements = vec![
            CollectionElement::document("doc-1"),
            CollectionElement::collection("col-2"),
            CollectionElement::document("doc-3"),
        ];
        collection
    }

    #[test]
    fn test_partition_elements() {
        let (documents, collections) = sample().partition_elements();
        assert_eq!(documents, vec!["doc-1", "doc-3"]);
        assert_eq!(collections, vec!["col-2"]);
    }

    #[test]
    fn test_move_and_restore() {
        let mut collection = sample();
        assert!(collection.move_to_deleted("doc-1"));
        assert!(!collection.has_element("doc-1"));
        assert_eq!(collection.deleted_elements.len(), 1);
        assert!(!collection.move_to_deleted("doc-1"));

        assert!(collection.restore_from_deleted("doc-1"));
        assert!(collection.has_element("doc-1"));
        assert!(collection.deleted_elements.is_empty());
    }

    #[test]
    fn test_remove_element_from_either_list() {
        let mut collection = sample();
        collection.move_to_deleted("doc-3");
        assert!(collection.remove_element("doc-3"));
        assert!(collection.remove_element("col-2"));
        assert!(!collection.remove_element("missing"));
        assert_eq!(collection.elements.len(), 1);
        assert!(collection.deleted_elements.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["elements"][1]["kind"], "collection");
        assert_eq!(value["hasPublications"], false);
        assert_eq!(value["titles"][0]["languageCode"], "en");
    }
}
