//! Translation of asset URLs from an original item to its duplicate.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::assets::DuplicatedAsset;

/// Format used when a reference can only be matched by asset id.
pub const PREFERRED_FORMAT: &str = "MEDIUM";

/// Format used instead of [`PREFERRED_FORMAT`] for video assets.
pub const VIDEO_FORMAT: &str = "VIDEO_SCREENSHOT";

fn asset_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?:img|vid)-[A-Za-z0-9-]+").ok())
        .as_ref()
}

/// First asset id embedded in `url`, if any.
#[must_use]
pub fn asset_id_in(url: &str) -> Option<&str> {
    asset_id_pattern()?.find(url).map(|m| m.as_str())
}

/// Replace every whole occurrence of asset id `from` in `url` with `to`.
///
/// `img-1` does not match inside `img-10`. Returns `None` when `from` does
/// not occur as a whole id.
fn replace_asset_id(url: &str, from: &str, to: &str) -> Option<String> {
    let pattern = asset_id_pattern()?;
    let mut replaced = false;
    let rewritten = pattern.replace_all(url, |caps: &regex::Captures<'_>| {
        let found = caps.get(0).map_or("", |m| m.as_str());
        if found == from {
            replaced = true;
            to.to_string()
        } else {
            found.to_string()
        }
    });
    replaced.then(|| rewritten.into_owned())
}

fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// How a reference was translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationSource {
    ExactUrl,
    UrlWithoutQuery,
    OriginalId,
    FormatSubstitution,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedRef {
    pub url: String,
    pub id: Option<String>,
    pub source: TranslationSource,
}

/// Lookup tables built from every asset duplicated for one item.
#[derive(Debug, Clone, Default)]
pub struct UrlMap {
    by_url: HashMap<String, (String, String)>,
    by_path: HashMap<String, (String, String)>,
    by_original_id: HashMap<String, DuplicatedAsset>,
}

impl UrlMap {
    #[must_use]
    pub fn build(assets: &[DuplicatedAsset]) -> Self {
        let mut map = Self::default();
        for asset in assets {
            for format in &asset.formats {
                let target = (format.url.clone(), asset.new_id.clone());
                map.by_path
                    .entry(without_query(&format.original_url).to_string())
                    .or_insert_with(|| target.clone());
                map.by_url.insert(format.original_url.clone(), target);
            }
            map.by_original_id
                .insert(asset.original_id.clone(), asset.clone());
        }
        map
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_original_id.is_empty()
    }

    /// Translate one asset reference.
    ///
    /// Tries the exact URL, then the URL without its query string, then
    /// substitutes the asset id inside the URL, then falls back to the
    /// duplicate's preferred format. A reference no step resolves is kept.
    #[must_use]
    pub fn translate(&self, url: &str, id_hint: Option<&str>) -> TranslatedRef {
        if let Some((new_url, new_id)) = self.by_url.get(url) {
            return TranslatedRef {
                url: new_url.clone(),
                id: Some(new_id.clone()),
                source: TranslationSource::ExactUrl,
            };
        }
        if let Some((new_url, new_id)) = self.by_path.get(without_query(url)) {
            return TranslatedRef {
                url: new_url.clone(),
                id: Some(new_id.clone()),
                source: TranslationSource::UrlWithoutQuery,
            };
        }

        let asset = id_hint
            .and_then(|id| self.by_original_id.get(id))
            .or_else(|| asset_id_in(url).and_then(|id| self.by_original_id.get(id)));
        let Some(asset) = asset else {
            return TranslatedRef {
                url: url.to_string(),
                id: id_hint.map(str::to_string),
                source: TranslationSource::Unchanged,
            };
        };

        if let Some(rewritten) = replace_asset_id(url, &asset.original_id, &asset.new_id) {
            return TranslatedRef {
                url: rewritten,
                id: Some(asset.new_id.clone()),
                source: TranslationSource::OriginalId,
            };
        }

        let format = if asset.new_id.starts_with("vid") {
            VIDEO_FORMAT
        } else {
            PREFERRED_FORMAT
        };
        match asset.format(format) {
            Some(found) => TranslatedRef {
                url: found.url.clone(),
                id: Some(asset.new_id.clone()),
                source: TranslationSource::FormatSubstitution,
            },
            None => TranslatedRef {
                url: url.to_string(),
                id: Some(asset.new_id.clone()),
                source: TranslationSource::Unchanged,
            },
        }
    }
}
