//! Duplication of items together with the binary assets they reference.

mod assets;
mod duplicate;
mod url_map;

pub use assets::{AssetService, AssetServiceError, DuplicatedAsset, DuplicatedFormat};
pub use duplicate::Duplicator;
pub use url_map::{asset_id_in, TranslatedRef, TranslationSource, UrlMap, PREFERRED_FORMAT, VIDEO_FORMAT};
