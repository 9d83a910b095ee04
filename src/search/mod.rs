mod elasticsearch;
mod factory;
mod fts5_index;
mod index_sync;
mod resolve;
mod search_index;
mod searchable;

pub use elasticsearch::ElasticsearchIndex;
pub use factory::create_search_index;
pub use fts5_index::Fts5SearchIndex;
pub use index_sync::{
    index_target, reindex, reindex_all, IndexSyncObserver, IndexTarget, Reindexable,
};
pub use resolve::{resolve, search_posts, SearchPage};
pub use search_index::{NoOpSearchIndex, SearchHits, SearchIndex};
pub use searchable::{IndexDocument, Searchable};
