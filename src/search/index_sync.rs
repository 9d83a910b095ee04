//! Mirrors committed writes of searchable entities into the search index.

use super::search_index::SearchIndex;
use super::searchable::{IndexDocument, Searchable};
use crate::server::metrics;
use crate::store::{ChangeSet, CommitObserver, Database, Entity, Post};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

/// What the index needs to know about one searchable entity.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTarget {
    pub namespace: &'static str,
    pub id: i64,
    pub document: IndexDocument,
}

impl IndexTarget {
    pub fn of<T: Searchable>(item: &T) -> Self {
        Self {
            namespace: T::NAMESPACE,
            id: item.search_id(),
            document: item.index_document(),
        }
    }
}

/// Maps a change set entry to its index target, if its type is searchable.
pub fn index_target(entity: &Entity) -> Option<IndexTarget> {
    match entity {
        Entity::Post(post) => Some(IndexTarget::of(post)),
        Entity::User(_) | Entity::Message(_) | Entity::Notification(_) | Entity::Task(_) => None,
    }
}

/// Searchable types whose persisted rows can be enumerated for a rebuild.
pub trait Reindexable: Searchable + Sized {
    fn load_all(db: &Database) -> Result<Vec<Self>>;
}

impl Reindexable for Post {
    fn load_all(db: &Database) -> Result<Vec<Self>> {
        Ok(db.all_posts()?)
    }
}

pub struct IndexSyncObserver {
    index: Arc<dyn SearchIndex>,
}

impl IndexSyncObserver {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    fn apply(&self, target: &IndexTarget, removal: bool) -> Result<()> {
        let backend = self.index.describe();
        let (operation, result) = if removal {
            ("remove", self.index.remove(target.namespace, target.id))
        } else {
            (
                "index",
                self.index
                    .index(target.namespace, target.id, &target.document),
            )
        };
        metrics::record_search_operation(backend, operation, result.is_ok());
        if let Err(e) = &result {
            error!(
                "Search {} of {}/{} failed on {}: {:#}",
                operation, target.namespace, target.id, backend, e
            );
        }
        result
    }
}

impl CommitObserver for IndexSyncObserver {
    fn name(&self) -> &'static str {
        "search_index_sync"
    }

    /// Applies every entry, then reports the first failure.
    fn after_commit(&self, changes: &ChangeSet) -> Result<()> {
        let upserts = changes
            .new_entities()
            .iter()
            .chain(changes.modified_entities())
            .filter_map(index_target)
            .map(|target| (target, false));
        let removals = changes
            .deleted_entities()
            .iter()
            .filter_map(index_target)
            .map(|target| (target, true));

        let mut first_error = None;
        for (target, removal) in upserts.chain(removals) {
            if let Err(e) = self.apply(&target, removal) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Indexes every persisted row of `T`. Safe to run repeatedly.
pub fn reindex<T: Reindexable>(db: &Database, index: &dyn SearchIndex) -> Result<usize> {
    let rows = T::load_all(db)?;
    for row in &rows {
        let target = IndexTarget::of(row);
        let result = index.index(target.namespace, target.id, &target.document);
        metrics::record_search_operation(index.describe(), "index", result.is_ok());
        result?;
    }
    info!(
        "Reindexed {} '{}' document(s) into {}",
        rows.len(),
        T::NAMESPACE,
        index.describe()
    );
    Ok(rows.len())
}

/// Rebuilds the index for every searchable type.
pub fn reindex_all(db: &Database, index: &dyn SearchIndex) -> Result<usize> {
    reindex::<Post>(db, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Fts5SearchIndex, SearchHits};
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Fails on one chosen id, records everything it is asked to do.
    struct FlakyIndex {
        fail_id: i64,
        calls: Mutex<Vec<(String, i64)>>,
    }

    impl SearchIndex for FlakyIndex {
        fn index(&self, namespace: &str, id: i64, _document: &IndexDocument) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((format!("index:{}", namespace), id));
            if id == self.fail_id {
                return Err(anyhow!("index down"));
            }
            Ok(())
        }

        fn remove(&self, namespace: &str, id: i64) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((format!("remove:{}", namespace), id));
            Ok(())
        }

        fn query(&self, _: &str, _: &str, _: u32, _: u32) -> Result<SearchHits> {
            Ok(SearchHits::empty())
        }

        fn describe(&self) -> &'static str {
            "flaky"
        }
    }

    fn synced_db() -> (Database, Arc<Fts5SearchIndex>) {
        let index = Arc::new(Fts5SearchIndex::in_memory().unwrap());
        let observer = IndexSyncObserver::new(index.clone());
        let db = Database::open_in_memory(vec![Arc::new(observer)]).unwrap();
        (db, index)
    }

    #[test]
    fn committed_posts_become_searchable() {
        let (db, index) = synced_db();
        let user = db.write(|tx| tx.insert_user("susan", "susan@example.com")).unwrap();
        let post = db
            .write(|tx| tx.insert_post(user.id, "the quick brown fox", None))
            .unwrap();

        let hits = index.query("post", "fox", 1, 10).unwrap();
        assert_eq!(hits.ids, vec![post.id]);
    }

    #[test]
    fn edits_and_deletes_are_mirrored() {
        let (db, index) = synced_db();
        let user = db.write(|tx| tx.insert_user("john", "john@example.com")).unwrap();
        let post = db.write(|tx| tx.insert_post(user.id, "old words", None)).unwrap();

        db.write(|tx| tx.update_post_body(post.id, "new words")).unwrap();
        assert_eq!(index.query("post", "old", 1, 10).unwrap().total, 0);
        assert_eq!(index.query("post", "new", 1, 10).unwrap().ids, vec![post.id]);

        db.write(|tx| tx.delete_post(post.id)).unwrap();
        assert_eq!(index.query("post", "words", 1, 10).unwrap().total, 0);
    }

    #[test]
    fn reused_id_within_one_transaction_stays_indexed() {
        let (db, index) = synced_db();
        let user = db.write(|tx| tx.insert_user("lena", "lena@example.com")).unwrap();

        let (old, new) = db
            .write(|tx| {
                let old = tx.insert_post(user.id, "draft words", None)?;
                tx.delete_post(old.id)?;
                let new = tx.insert_post(user.id, "final words", None)?;
                Ok((old, new))
            })
            .unwrap();

        assert_eq!(old.id, new.id);
        assert_eq!(index.query("post", "final", 1, 10).unwrap().ids, vec![new.id]);
        assert_eq!(index.query("post", "draft", 1, 10).unwrap().total, 0);
    }

    #[test]
    fn rolled_back_posts_never_reach_the_index() {
        let (db, index) = synced_db();
        let user = db.write(|tx| tx.insert_user("ann", "ann@example.com")).unwrap();
        let result: Result<(), _> = db.write(|tx| {
            tx.insert_post(user.id, "phantom post", None)?;
            Err(anyhow!("changed my mind").into())
        });
        assert!(result.is_err());
        assert_eq!(index.query("post", "phantom", 1, 10).unwrap().total, 0);
    }

    #[test]
    fn failure_on_one_entry_still_applies_the_rest() {
        let flaky = Arc::new(FlakyIndex {
            fail_id: 1,
            calls: Mutex::new(Vec::new()),
        });
        let db =
            Database::open_in_memory(vec![Arc::new(IndexSyncObserver::new(flaky.clone()))])
                .unwrap();
        let user = db.write(|tx| tx.insert_user("mary", "mary@example.com")).unwrap();

        let result = db.write(|tx| {
            tx.insert_post(user.id, "first", None)?;
            tx.insert_post(user.id, "second", None)?;
            Ok(())
        });

        assert!(result.unwrap_err().is_post_commit());
        let calls = flaky.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![("index:post".to_string(), 1), ("index:post".to_string(), 2)]
        );
        assert_eq!(db.count_user_posts(user.id).unwrap(), 2);
    }

    #[test]
    fn non_searchable_entities_are_ignored() {
        let flaky = Arc::new(FlakyIndex {
            fail_id: -1,
            calls: Mutex::new(Vec::new()),
        });
        let db =
            Database::open_in_memory(vec![Arc::new(IndexSyncObserver::new(flaky.clone()))])
                .unwrap();
        let a = db.write(|tx| tx.insert_user("a", "a@example.com")).unwrap();
        let b = db.write(|tx| tx.insert_user("b", "b@example.com")).unwrap();
        db.write(|tx| tx.insert_message(a.id, b.id, "hi")).unwrap();

        assert!(flaky.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn reindex_restores_a_blank_index() {
        let db = Database::open_in_memory(vec![]).unwrap();
        let user = db.write(|tx| tx.insert_user("bob", "bob@example.com")).unwrap();
        db.write(|tx| {
            tx.insert_post(user.id, "alpha", None)?;
            tx.insert_post(user.id, "beta", None)?;
            Ok(())
        })
        .unwrap();

        let index = Fts5SearchIndex::in_memory().unwrap();
        assert_eq!(index.query("post", "alpha", 1, 10).unwrap().total, 0);

        assert_eq!(reindex_all(&db, &index).unwrap(), 2);
        assert_eq!(reindex_all(&db, &index).unwrap(), 2);
        assert_eq!(index.document_count("post").unwrap(), 2);
        assert_eq!(index.query("post", "beta", 1, 10).unwrap().total, 1);
    }
}
