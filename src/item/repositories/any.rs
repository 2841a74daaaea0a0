use crate::item::core::error::RepositoryError;
use crate::item::core::repository::IndexedRepository;
use crate::item::entities::{Binder, Collection, Publication};
use crate::item::ItemKind;
use crate::store::Hit;
use serde_json::Value;

/// An item whose kind is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyItem {
    Document(Binder),
    Collection(Collection),
    Publication(Publication),
    /// A hit from an index this code does not manage.
    Unknown {
        kind: String,
        id: String,
        source: Value,
    },
}

impl AnyItem {
    pub fn from_hit(kind: &ItemKind, hit: Hit) -> Result<Self, RepositoryError> {
        Ok(match kind {
            ItemKind::Document => AnyItem::Document(IndexedRepository::<Binder>::decode(hit)?),
            ItemKind::Collection => {
                AnyItem::Collection(IndexedRepository::<Collection>::decode(hit)?)
            }
            ItemKind::Publication => {
                AnyItem::Publication(IndexedRepository::<Publication>::decode(hit)?)
            }
            ItemKind::Unknown(tag) => AnyItem::Unknown {
                kind: tag.clone(),
                id: hit.id,
                source: hit.source,
            },
        })
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self {
            AnyItem::Document(_) => ItemKind::Document,
            AnyItem::Collection(_) => ItemKind::Collection,
            AnyItem::Publication(_) => ItemKind::Publication,
            AnyItem::Unknown { kind, .. } => ItemKind::Unknown(kind.clone()),
        }
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            AnyItem::Document(binder) => binder.id.as_deref(),
            AnyItem::Collection(collection) => collection.id.as_deref(),
            AnyItem::Publication(publication) => publication.id.as_deref(),
            AnyItem::Unknown { id, .. } => Some(id),
        }
    }
}
