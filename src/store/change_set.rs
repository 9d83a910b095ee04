//! Per-transaction change tracking and the post-commit observer seam.

use super::models::{Message, Notification, Post, TaskRecord, User};

/// Snapshot of a row touched by a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    User(User),
    Post(Post),
    Message(Message),
    Notification(Notification),
    Task(TaskRecord),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub kind: &'static str,
    pub id: String,
}

impl Entity {
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::User(_) => "user",
            Entity::Post(_) => "post",
            Entity::Message(_) => "message",
            Entity::Notification(_) => "notification",
            Entity::Task(_) => "task",
        }
    }

    pub fn key(&self) -> EntityKey {
        let id = match self {
            Entity::User(u) => u.id.to_string(),
            Entity::Post(p) => p.id.to_string(),
            Entity::Message(m) => m.id.to_string(),
            Entity::Notification(n) => n.id.to_string(),
            Entity::Task(t) => t.id.clone(),
        };
        EntityKey {
            kind: self.kind(),
            id,
        }
    }
}

/// Rows inserted, updated and deleted by one transaction.
///
/// Filled while the transaction is open and handed to every
/// [`CommitObserver`] once the commit has succeeded. A rolled back
/// transaction drops its change set unseen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    new: Vec<Entity>,
    modified: Vec<Entity>,
    deleted: Vec<Entity>,
}

impl ChangeSet {
    pub fn new_entities(&self) -> &[Entity] {
        &self.new
    }

    pub fn modified_entities(&self) -> &[Entity] {
        &self.modified
    }

    pub fn deleted_entities(&self) -> &[Entity] {
        &self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.new.len() + self.modified.len() + self.deleted.len()
    }

    /// Records an insert. SQLite may hand out the id of a row deleted
    /// earlier in the same transaction, so the insert replaces that
    /// pending deletion.
    pub(crate) fn record_new(&mut self, entity: Entity) {
        let key = entity.key();
        self.deleted.retain(|e| e.key() != key);
        self.new.push(entity);
    }

    /// Records an update. A row inserted earlier in the same transaction
    /// stays in the new list with its snapshot refreshed.
    pub(crate) fn record_modified(&mut self, entity: Entity) {
        let key = entity.key();
        if let Some(slot) = self.new.iter_mut().find(|e| e.key() == key) {
            *slot = entity;
        } else if let Some(slot) = self.modified.iter_mut().find(|e| e.key() == key) {
            *slot = entity;
        } else {
            self.modified.push(entity);
        }
    }

    pub(crate) fn record_deleted(&mut self, entity: Entity) {
        let key = entity.key();
        self.new.retain(|e| e.key() != key);
        self.modified.retain(|e| e.key() != key);
        if !self.deleted.iter().any(|e| e.key() == key) {
            self.deleted.push(entity);
        }
    }
}

/// Receives the change set of every successful commit.
///
/// Observers are registered when the [`super::Database`] is built and are
/// called in registration order, after the connection lock is released.
pub trait CommitObserver: Send + Sync {
    fn name(&self) -> &'static str;

    fn after_commit(&self, changes: &ChangeSet) -> anyhow::Result<()>;
}
