//! The capability that makes an entity type eligible for full-text indexing.

use crate::store::Post;
use std::collections::BTreeMap;

/// Field name to field value, as sent to a search backend.
pub type IndexDocument = BTreeMap<String, String>;

pub trait Searchable {
    /// Entity type name. Backends use it as index (or table) namespace.
    const NAMESPACE: &'static str;

    /// Fields copied into the index, in order.
    const SEARCHABLE_FIELDS: &'static [&'static str];

    fn search_id(&self) -> i64;

    fn field_value(&self, field: &str) -> Option<String>;

    fn index_document(&self) -> IndexDocument {
        Self::SEARCHABLE_FIELDS
            .iter()
            .filter_map(|field| {
                self.field_value(field)
                    .map(|value| (field.to_string(), value))
            })
            .collect()
    }
}

impl Searchable for Post {
    const NAMESPACE: &'static str = "post";
    const SEARCHABLE_FIELDS: &'static [&'static str] = &["body"];

    fn search_id(&self) -> i64 {
        self.id
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "body" => Some(self.body.clone()),
            _ => None,
        }
    }
}
