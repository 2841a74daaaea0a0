//! Query model for the document store.
//!
//! Queries address fields by dotted path (`elements.key`, `thumbnail.medium`).
//! When a path crosses an array, every element is visited, so a term query on
//! `elements.key` matches a collection if *any* element carries that key.
//! The special field `_id` addresses the document id rather than its source.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Upper bound on search results when a caller does not set one.
pub const MAX_SEARCH_RESULTS: usize = 9999;

/// Pseudo field addressing the document id.
pub const ID_FIELD: &str = "_id";

/// A structured query evaluated against stored documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    MatchAll,
    Ids(Vec<String>),
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Exists(String),
    Range {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<Value>,
    },
    And(Vec<Query>),
    Or(Vec<Query>),
    Not(Box<Query>),
}

impl Query {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query::Ids(ids.into_iter().map(Into::into).collect())
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists(field.into())
    }

    /// Matches documents where `field` is absent or null.
    pub fn missing(field: impl Into<String>) -> Self {
        Query::Not(Box::new(Query::Exists(field.into())))
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Range {
            field: field.into(),
            gte: None,
            lte: Some(value.into()),
        }
    }

    pub fn and(clauses: Vec<Query>) -> Self {
        Query::And(clauses)
    }

    pub fn or(clauses: Vec<Query>) -> Self {
        Query::Or(clauses)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(query: Query) -> Self {
        Query::Not(Box::new(query))
    }

    /// Evaluate the query against a document and its id.
    #[must_use]
    pub fn matches(&self, id: &str, source: &Value) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Ids(ids) => ids.iter().any(|candidate| candidate == id),
            Query::Term { field, value } => any_value(id, source, field, |found| found == value),
            Query::Terms { field, values } => {
                any_value(id, source, field, |found| values.contains(found))
            }
            Query::Exists(field) => any_value(id, source, field, |found| !found.is_null()),
            Query::Range { field, gte, lte } => any_value(id, source, field, |found| {
                let above = gte
                    .as_ref()
                    .is_none_or(|bound| compare_values(found, bound) != Ordering::Less);
                let below = lte
                    .as_ref()
                    .is_none_or(|bound| compare_values(found, bound) != Ordering::Greater);
                above && below
            }),
            Query::And(clauses) => clauses.iter().all(|clause| clause.matches(id, source)),
            Query::Or(clauses) => clauses.iter().any(|clause| clause.matches(id, source)),
            Query::Not(inner) => !inner.matches(id, source),
        }
    }
}

fn any_value(id: &str, source: &Value, field: &str, predicate: impl Fn(&Value) -> bool) -> bool {
    if field == ID_FIELD {
        return predicate(&Value::String(id.to_string()));
    }
    field_values(source, field).into_iter().any(predicate)
}

/// Sort order for search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub ascending: bool,
}

/// A search against one index or alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: Query,
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: Query) -> Self {
        Self {
            query,
            size: MAX_SEARCH_RESULTS,
            sort: None,
        }
    }

    #[must_use]
    pub fn match_all() -> Self {
        Self::new(Query::MatchAll)
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn sorted_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            ascending,
        });
        self
    }
}

/// A document returned by a search or scroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    /// Physical index the document lives in.
    pub index: String,
    pub source: Value,
}

/// Collect every value reachable by a dotted path, flattening arrays.
#[must_use]
pub fn field_values<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current: Vec<&'a Value> = vec![source];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_segment(value, segment, &mut next);
        }
        current = next;
    }
    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn collect_segment<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(segment) {
                out.push(found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_segment(item, segment, out);
            }
        }
        _ => {}
    }
}

/// Total order over JSON scalars used by range queries and sorting.
///
/// Numbers compare numerically, RFC 3339 timestamps chronologically, other
/// strings lexically. Mixed types order by type rank.
#[must_use]
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => {
            match (
                chrono::DateTime::parse_from_rfc3339(a),
                chrono::DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
