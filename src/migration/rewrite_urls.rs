//! Data migration rewriting image URLs in stored items.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::future::ready;
use tracing::info;

use super::migrator::{Migrator, SourceQuery};
use super::runner::DataMigration;
use super::types::{MigrationError, MigrationReport, TransformedDocument};
use crate::store::Hit;

/// Cover URL old items were created with.
pub const LEGACY_PLACEHOLDER_COVER: &str = "http://placehold.it/300x300";

/// Cover URL replacing [`LEGACY_PLACEHOLDER_COVER`].
pub const DEFAULT_COVER: &str =
    "https://s3-eu-west-1.amazonaws.com/manualto-images/document-cover-default.png";

/// Rewrites thumbnail and image chunk URLs matching `pattern` in place.
///
/// Thumbnail fields holding the legacy placeholder cover get the current
/// default cover instead. Documents without any change are not rewritten.
pub struct RewriteImageUrls {
    name: String,
    indices: Vec<String>,
    pattern: Regex,
    replacement: String,
}

impl RewriteImageUrls {
    pub fn new(
        indices: Vec<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, MigrationError> {
        let replacement = replacement.into();
        Ok(Self {
            name: format!("rewrite-image-urls:{pattern}=>{replacement}"),
            indices,
            pattern: Regex::new(pattern)?,
            replacement,
        })
    }

    fn rewrite(&self, url: &str) -> String {
        self.pattern
            .replace_all(url, self.replacement.as_str())
            .into_owned()
    }

    fn rewrite_string(&self, value: &mut Value) -> bool {
        let Value::String(url) = value else {
            return false;
        };
        let rewritten = self.rewrite(url);
        if rewritten == *url {
            return false;
        }
        *url = rewritten;
        true
    }

    fn rewrite_thumbnail(&self, thumbnail: &mut Value) -> bool {
        let Some(fields) = thumbnail.as_object_mut() else {
            return false;
        };
        let mut changed = false;
        for value in fields.values_mut() {
            if value.as_str() == Some(LEGACY_PLACEHOLDER_COVER) {
                *value = Value::String(DEFAULT_COVER.to_string());
                changed = true;
            } else {
                changed |= self.rewrite_string(value);
            }
        }
        changed
    }

    fn rewrite_chunks(&self, source: &mut Value) -> bool {
        let Some(modules) = source
            .pointer_mut("/modules/images/chunked")
            .and_then(Value::as_array_mut)
        else {
            return false;
        };
        let mut changed = false;
        let visuals = modules
            .iter_mut()
            .filter_map(|module| module.get_mut("chunks").and_then(Value::as_array_mut))
            .flatten()
            .filter_map(Value::as_array_mut)
            .flatten();
        for visual in visuals {
            let url = match visual {
                Value::Object(fields) => fields.get_mut("url"),
                other => Some(other),
            };
            changed |= url.is_some_and(|url| self.rewrite_string(url));
        }
        changed
    }

    /// The rewritten document, or `None` when nothing matched.
    pub fn rewrite_hit(&self, hit: Hit) -> Result<Option<TransformedDocument>, MigrationError> {
        let mut source = hit.source;
        if !source.is_object() {
            return Err(MigrationError::Transform {
                id: hit.id,
                message: "document source is not an object".to_string(),
            });
        }
        let thumbnail_changed = source
            .get_mut("thumbnail")
            .is_some_and(|thumbnail| self.rewrite_thumbnail(thumbnail));
        let chunks_changed = self.rewrite_chunks(&mut source);
        Ok((thumbnail_changed || chunks_changed)
            .then(|| TransformedDocument::with_id(hit.id, source)))
    }
}

#[async_trait]
impl DataMigration for RewriteImageUrls {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Rewrite thumbnail and image chunk URLs"
    }

    async fn run(&self, migrator: &Migrator) -> Result<MigrationReport, MigrationError> {
        let mut total = MigrationReport::default();
        for index in &self.indices {
            let report = migrator
                .migrate(
                    &SourceQuery::all(index.as_str()),
                    |hit| ready(self.rewrite_hit(hit)),
                    index,
                    true,
                )
                .await?;
            info!(index = %index, rewritten = report.written, "Image URLs rewritten");
            let aborted = report.aborted;
            total.absorb(report);
            if aborted {
                break;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn migration() -> RewriteImageUrls {
        RewriteImageUrls::new(
            vec!["binders".to_string()],
            "^http://api\\.binders\\.media/",
            "https://api.binders.media/",
        )
        .unwrap()
    }

    fn hit(source: Value) -> Hit {
        Hit {
            id: "b1".to_string(),
            index: "binders-v1".to_string(),
            source,
        }
    }

    #[test]
    fn test_rewrites_thumbnail_and_chunks() {
        let source = json!({
            "thumbnail": {
                "medium": "http://api.binders.media/images/v1/img-1/medium",
                "fitBehaviour": "fit"
            },
            "modules": { "images": { "chunked": [{ "key": "i1", "chunks": [
                ["http://api.binders.media/images/v1/img-2/original"],
                [{ "id": "img-3", "url": "http://api.binders.media/images/v1/img-3/original" }]
            ]}]}}
        });
        let doc = migration().rewrite_hit(hit(source)).unwrap().unwrap();
        assert_eq!(doc.id.as_deref(), Some("b1"));
        assert_eq!(
            doc.data["thumbnail"]["medium"],
            "https://api.binders.media/images/v1/img-1/medium"
        );
        assert_eq!(doc.data["thumbnail"]["fitBehaviour"], "fit");
        let chunks = &doc.data["modules"]["images"]["chunked"][0]["chunks"];
        assert_eq!(chunks[0][0], "https://api.binders.media/images/v1/img-2/original");
        assert_eq!(chunks[1][0]["url"], "https://api.binders.media/images/v1/img-3/original");
        assert_eq!(chunks[1][0]["id"], "img-3");
    }

    #[test]
    fn test_placeholder_cover_replaced() {
        let source = json!({ "thumbnail": { "medium": LEGACY_PLACEHOLDER_COVER } });
        let doc = migration().rewrite_hit(hit(source)).unwrap().unwrap();
        assert_eq!(doc.data["thumbnail"]["medium"], DEFAULT_COVER);
    }

    #[test]
    fn test_untouched_document_is_skipped() {
        let source = json!({
            "thumbnail": { "medium": "https://cdn.example.com/cover.png" },
            "modules": { "images": { "chunked": [] } }
        });
        assert!(migration().rewrite_hit(hit(source)).unwrap().is_none());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = RewriteImageUrls::new(vec![], "(", "x");
        assert!(matches!(result, Err(MigrationError::Regex(_))));
    }
}
