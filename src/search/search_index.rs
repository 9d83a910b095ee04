//! Search index trait and the no-op backend.

use super::searchable::IndexDocument;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// One page of query results, most relevant first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchHits {
    pub ids: Vec<i64>,
    /// Matches across all pages.
    pub total: u64,
}

impl SearchHits {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A full-text index keyed by namespace and numeric id.
pub trait SearchIndex: Send + Sync {
    /// Add or replace a document.
    fn index(&self, namespace: &str, id: i64, document: &IndexDocument) -> Result<()>;

    /// Remove a document. Removing an absent document succeeds.
    fn remove(&self, namespace: &str, id: i64) -> Result<()>;

    /// Match `text` against every indexed field of the namespace.
    ///
    /// `page` is 1-based and values below 1 count as 1. A `per_page` of 0
    /// returns no ids but still reports the total.
    fn query(&self, namespace: &str, text: &str, page: u32, per_page: u32) -> Result<SearchHits>;

    /// Short backend name for logs and metrics.
    fn describe(&self) -> &'static str;
}

impl<T: SearchIndex + ?Sized> SearchIndex for Arc<T> {
    fn index(&self, namespace: &str, id: i64, document: &IndexDocument) -> Result<()> {
        (**self).index(namespace, id, document)
    }

    fn remove(&self, namespace: &str, id: i64) -> Result<()> {
        (**self).remove(namespace, id)
    }

    fn query(&self, namespace: &str, text: &str, page: u32, per_page: u32) -> Result<SearchHits> {
        (**self).query(namespace, text, page, per_page)
    }

    fn describe(&self) -> &'static str {
        (**self).describe()
    }
}

/// Used when no search backend is configured. Never fails.
pub struct NoOpSearchIndex;

impl SearchIndex for NoOpSearchIndex {
    fn index(&self, _namespace: &str, _id: i64, _document: &IndexDocument) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _namespace: &str, _id: i64) -> Result<()> {
        Ok(())
    }

    fn query(
        &self,
        _namespace: &str,
        _text: &str,
        _page: u32,
        _per_page: u32,
    ) -> Result<SearchHits> {
        Ok(SearchHits::empty())
    }

    fn describe(&self) -> &'static str {
        "noop"
    }
}

/// Offset of the first hit of a 1-based page.
pub(crate) fn page_offset(page: u32, per_page: u32) -> u64 {
    (page.max(1) as u64 - 1) * per_page as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_index_accepts_everything_and_finds_nothing() {
        let index = NoOpSearchIndex;
        let doc = IndexDocument::from([("body".to_string(), "text".to_string())]);
        index.index("post", 1, &doc).unwrap();
        index.remove("post", 99).unwrap();
        assert_eq!(index.query("post", "text", 1, 10).unwrap(), SearchHits::empty());
    }

    #[test]
    fn shared_handles_delegate() {
        let index: Arc<dyn SearchIndex> = Arc::new(NoOpSearchIndex);
        let shared = Arc::new(index);
        assert_eq!(shared.describe(), "noop");
    }

    #[test]
    fn page_offset_treats_zero_as_first_page() {
        assert_eq!(page_offset(0, 10), 0);
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
    }
}
