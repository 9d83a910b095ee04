//! Elasticsearch backend over its REST API.
//!
//! Uses the blocking reqwest client, so every call must run off the async
//! executor (inside `spawn_blocking` or a plain thread).

use super::search_index::{page_offset, SearchHits, SearchIndex};
use super::searchable::IndexDocument;
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct ElasticsearchIndex {
    base_url: String,
    client: Client,
}

impl ElasticsearchIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Elasticsearch HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn doc_url(&self, namespace: &str, id: i64) -> String {
        format!("{}/{}/_doc/{}", self.base_url, namespace, id)
    }

    /// Builds the body of a `_search` request.
    pub fn search_body(text: &str, page: u32, per_page: u32) -> Value {
        json!({
            "query": {
                "multi_match": {
                    "query": text,
                    "fields": ["*"],
                }
            },
            "from": page_offset(page, per_page),
            "size": per_page,
        })
    }

    /// Extracts ids and total from a `_search` response.
    ///
    /// Accepts both `hits.total.value` and the older bare-number form.
    pub fn parse_hits(body: &Value) -> Result<SearchHits> {
        let hits = body.get("hits").context("Search response has no 'hits'")?;
        let total = match hits.get("total") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(total) => total.get("value").and_then(Value::as_u64),
            None => None,
        }
        .context("Search response has no usable 'hits.total'")?;

        let mut ids = Vec::new();
        if let Some(entries) = hits.get("hits").and_then(Value::as_array) {
            for entry in entries {
                let id = entry
                    .get("_id")
                    .and_then(Value::as_str)
                    .context("Search hit has no '_id'")?;
                ids.push(
                    id.parse::<i64>()
                        .with_context(|| format!("Search hit id '{}' is not numeric", id))?,
                );
            }
        }
        Ok(SearchHits { ids, total })
    }

    fn is_index_not_found(body: &Value) -> bool {
        body.pointer("/error/type").and_then(Value::as_str) == Some("index_not_found_exception")
    }
}

impl SearchIndex for ElasticsearchIndex {
    fn index(&self, namespace: &str, id: i64, document: &IndexDocument) -> Result<()> {
        let response = self
            .client
            .put(self.doc_url(namespace, id))
            .json(document)
            .send()
            .with_context(|| format!("Failed to index {}/{}", namespace, id))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            bail!("Indexing {}/{} failed with {}: {}", namespace, id, status, text);
        }
        Ok(())
    }

    fn remove(&self, namespace: &str, id: i64) -> Result<()> {
        let response = self
            .client
            .delete(self.doc_url(namespace, id))
            .send()
            .with_context(|| format!("Failed to remove {}/{}", namespace, id))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("{}/{} was not in the index", namespace, id);
            return Ok(());
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            bail!("Removing {}/{} failed with {}: {}", namespace, id, status, text);
        }
        Ok(())
    }

    fn query(&self, namespace: &str, text: &str, page: u32, per_page: u32) -> Result<SearchHits> {
        let response = self
            .client
            .post(format!("{}/{}/_search", self.base_url, namespace))
            .json(&Self::search_body(text, page, per_page))
            .send()
            .with_context(|| format!("Failed to query '{}'", namespace))?;
        let status = response.status();
        let body: Value = response
            .json()
            .with_context(|| format!("Invalid search response from '{}'", namespace))?;

        if status == StatusCode::NOT_FOUND && Self::is_index_not_found(&body) {
            debug!("Index '{}' does not exist yet", namespace);
            return Ok(SearchHits::empty());
        }
        if !status.is_success() {
            bail!("Query on '{}' failed with {}: {}", namespace, status, body);
        }
        Self::parse_hits(&body)
    }

    fn describe(&self) -> &'static str {
        "elasticsearch"
    }
}
