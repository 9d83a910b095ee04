//! Turns index hits back into store entities.
//!
//! The index only knows ids and relevance. Entities are re-fetched from the
//! relational store and put back into the order the index returned.

use super::search_index::{SearchHits, SearchIndex};
use super::searchable::Searchable;
use crate::server::metrics;
use crate::store::{Database, Post};
use anyhow::Result;
use std::collections::HashMap;
use tracing::warn;

/// A page of resolved search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    /// Index-side total, including ids the store no longer has.
    pub total: u64,
}

/// Fetches the entities behind `hits` and keeps the hit order.
///
/// Ids the store does not return are dropped from the page. When nothing
/// matched, `fetch` is not called.
pub fn resolve<T, F>(hits: &SearchHits, fetch: F) -> Result<Vec<T>>
where
    T: Searchable,
    F: FnOnce(&[i64]) -> Result<Vec<T>>,
{
    if hits.total == 0 || hits.ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut by_id: HashMap<i64, T> = fetch(&hits.ids)?
        .into_iter()
        .map(|item| (item.search_id(), item))
        .collect();
    let items: Vec<T> = hits.ids.iter().filter_map(|id| by_id.remove(id)).collect();

    if items.len() < hits.ids.len() {
        warn!(
            "Search index for '{}' references {} id(s) missing from the store",
            T::NAMESPACE,
            hits.ids.len() - items.len()
        );
    }
    Ok(items)
}

/// Runs a text query against the index and resolves the matching posts.
pub fn search_posts(
    db: &Database,
    index: &dyn SearchIndex,
    text: &str,
    page: u32,
    per_page: u32,
) -> Result<SearchPage<Post>> {
    let result = index.query(Post::NAMESPACE, text, page, per_page);
    metrics::record_search_operation(index.describe(), "query", result.is_ok());
    let hits = result?;

    let items = resolve(&hits, |ids| Ok(db.posts_by_ids(ids)?))?;
    Ok(SearchPage {
        items,
        total: hits.total,
    })
}
