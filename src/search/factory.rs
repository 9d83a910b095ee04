//! Factory function for creating search index instances

use super::{ElasticsearchIndex, Fts5SearchIndex, NoOpSearchIndex, SearchIndex};
use crate::config::{SearchEngine, SearchSettings};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Create a search index for the configured engine.
///
/// `db_dir` holds `search.db` for the FTS5 engine. The Elasticsearch engine
/// builds a blocking HTTP client, so call this outside of async code.
pub fn create_search_index(
    settings: &SearchSettings,
    db_dir: &Path,
) -> Result<Arc<dyn SearchIndex>> {
    match settings.engine {
        SearchEngine::Fts5 => {
            let db_path = db_dir.join("search.db");
            info!("Creating FTS5 search index at {:?}", db_path);
            Ok(Arc::new(Fts5SearchIndex::new(&db_path)?))
        }
        SearchEngine::Elasticsearch => {
            let url = settings
                .elasticsearch_url
                .as_deref()
                .context("Elasticsearch engine selected without a URL")?;
            info!("Creating Elasticsearch search index at {}", url);
            Ok(Arc::new(ElasticsearchIndex::new(
                url,
                Duration::from_secs(settings.timeout_sec),
            )?))
        }
        SearchEngine::NoOp => {
            info!("Creating NoOp search index (search disabled)");
            Ok(Arc::new(NoOpSearchIndex))
        }
    }
}
