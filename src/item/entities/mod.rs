//! Stored entity shapes. Field names serialize in camelCase.

pub mod binder;
pub mod collection;
pub mod common;
pub mod publication;

pub use binder::{
    Binder, BinderModules, ChunkVisual, ImageModule, ImageModules, ModuleMeta, TextModule,
    TextModules, Visual,
};
pub use collection::{Collection, CollectionTitle};
pub use common::{CollectionElement, ElementKind, Language, Thumbnail};
pub use publication::Publication;
