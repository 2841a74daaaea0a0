//! Binder, collection and publication items stored in the search index.
//!
//! Each item kind has an entity shape in [`entities`], a typed repository in
//! [`repositories`] built on the generic [`core::repository::IndexedRepository`],
//! and shared soft-delete/purge behavior in [`lifecycle`].

pub mod core;
pub mod entities;
pub mod lifecycle;
pub mod repositories;

pub use core::error::RepositoryError;
pub use core::filter::{DeletionVisibility, ItemFilter, SearchOptions};
pub use core::repository::{IndexedRepository, StoredItem};
pub use entities::{Binder, Collection, CollectionElement, ElementKind, Publication};
pub use repositories::{
    AnyItem, BinderRepository, CollectionRepository, PublicationRepository, Repositories,
};

/// Item kind discriminator.
///
/// Kinds are derived from the index a hit came from or from a stored tag.
/// Tags this code does not know are kept as [`ItemKind::Unknown`] instead of
/// being forced into a known kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Document,
    Collection,
    Publication,
    Unknown(String),
}

impl ItemKind {
    /// Parse a stored kind tag. `binder` and `document` both mean a document.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "document" | "binder" => ItemKind::Document,
            "collection" => ItemKind::Collection,
            "publication" => ItemKind::Publication,
            _ => ItemKind::Unknown(tag.to_string()),
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, ItemKind::Unknown(_))
    }
}

impl From<ElementKind> for ItemKind {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Document => ItemKind::Document,
            ElementKind::Collection => ItemKind::Collection,
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Document => write!(f, "document"),
            ItemKind::Collection => write!(f, "collection"),
            ItemKind::Publication => write!(f, "publication"),
            ItemKind::Unknown(tag) => write!(f, "unknown({tag})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        assert_eq!(ItemKind::from_tag("binder"), ItemKind::Document);
        assert_eq!(ItemKind::from_tag("Document"), ItemKind::Document);
        assert_eq!(ItemKind::from_tag("collection"), ItemKind::Collection);
        assert_eq!(ItemKind::from_tag("publication"), ItemKind::Publication);
        assert_eq!(
            ItemKind::from_tag("semanticlink"),
            ItemKind::Unknown("semanticlink".to_string())
        );
        assert!(!ItemKind::from_tag("x").is_known());
    }

    #[test]
    fn test_display() {
        assert_eq!(ItemKind::Collection.to_string(), "collection");
        assert_eq!(
            ItemKind::Unknown("link".to_string()).to_string(),
            "unknown(link)"
        );
    }
}
