//! Filters and search options shared by every repository.

use crate::store::{Query, SearchRequest, MAX_SEARCH_RESULTS};

/// Which items a filter returns with respect to soft deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletionVisibility {
    #[default]
    ExcludeDeleted,
    IncludeDeleted,
    OnlyDeleted,
}

/// Filter criteria for repository lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFilter {
    pub ids: Option<Vec<String>>,
    pub account_id: Option<String>,
    /// Collections whose live elements contain any of these keys.
    pub element_keys: Option<Vec<String>>,
    /// Collections whose deleted elements contain any of these keys.
    pub deleted_element_keys: Option<Vec<String>>,
    pub ancestor_id: Option<String>,
    pub deletion: DeletionVisibility,
    pub extra: Vec<Query>,
}

impl ItemFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    #[must_use]
    pub fn containing_elements<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.element_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn containing_deleted_elements<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deleted_element_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn under_ancestor(mut self, ancestor_id: impl Into<String>) -> Self {
        self.ancestor_id = Some(ancestor_id.into());
        self
    }

    #[must_use]
    pub fn include_deleted(mut self) -> Self {
        self.deletion = DeletionVisibility::IncludeDeleted;
        self
    }

    #[must_use]
    pub fn only_deleted(mut self) -> Self {
        self.deletion = DeletionVisibility::OnlyDeleted;
        self
    }

    #[must_use]
    pub fn matching(mut self, query: Query) -> Self {
        self.extra.push(query);
        self
    }

    #[must_use]
    pub fn to_query(&self) -> Query {
        let mut clauses = Vec::new();
        if let Some(ids) = &self.ids {
            clauses.push(Query::ids(ids.iter().cloned()));
        }
        if let Some(account_id) = &self.account_id {
            clauses.push(Query::term("accountId", account_id.as_str()));
        }
        if let Some(keys) = &self.element_keys {
            clauses.push(Query::terms("elements.key", keys.iter().map(String::as_str)));
        }
        if let Some(keys) = &self.deleted_element_keys {
            clauses.push(Query::terms(
                "deletedElements.key",
                keys.iter().map(String::as_str),
            ));
        }
        if let Some(ancestor_id) = &self.ancestor_id {
            clauses.push(Query::term("ancestorIds", ancestor_id.as_str()));
        }
        match self.deletion {
            DeletionVisibility::ExcludeDeleted => clauses.push(Query::missing("deletionTime")),
            DeletionVisibility::OnlyDeleted => clauses.push(Query::exists("deletionTime")),
            DeletionVisibility::IncludeDeleted => {}
        }
        clauses.extend(self.extra.iter().cloned());
        if clauses.is_empty() {
            Query::MatchAll
        } else {
            Query::and(clauses)
        }
    }
}

/// Result shaping for repository searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub max_results: usize,
    pub order_by: Option<String>,
    pub ascending: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: MAX_SEARCH_RESULTS,
            order_by: None,
            ascending: true,
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn limit(max_results: usize) -> Self {
        Self {
            max_results,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn to_request(&self, query: Query) -> SearchRequest {
        let request = SearchRequest::new(query).with_size(self.max_results);
        match &self.order_by {
            Some(field) => request.sorted_by(field.clone(), self.ascending),
            None => request,
        }
    }
}
