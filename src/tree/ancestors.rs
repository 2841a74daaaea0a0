//! Ancestor lookups over the collection tree.

use std::collections::HashSet;

use crate::item::repositories::CollectionRepository;
use crate::item::RepositoryError;

/// Ids of every live collection above `item_id`, nearest level first.
///
/// Fails with [`RepositoryError::DepthExceeded`] when the walk goes deeper
/// than `max_depth` levels.
pub async fn collect_ancestor_ids(
    collections: &CollectionRepository,
    item_id: &str,
    max_depth: usize,
) -> Result<Vec<String>, RepositoryError> {
    let mut visited: HashSet<String> = HashSet::from([item_id.to_string()]);
    let mut frontier = vec![item_id.to_string()];
    let mut ancestors = Vec::new();
    let mut depth: usize = 0;
    loop {
        let parents = collections.find_parents(&frontier).await?;
        let next: Vec<String> = parents
            .into_iter()
            .filter_map(|parent| parent.id)
            .filter(|id| visited.insert(id.clone()))
            .collect();
        if next.is_empty() {
            return Ok(ancestors);
        }
        depth = depth.saturating_add(1);
        if depth > max_depth {
            return Err(RepositoryError::DepthExceeded(max_depth));
        }
        ancestors.extend(next.iter().cloned());
        frontier = next;
    }
}
