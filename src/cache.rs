use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{CategoriesPage, CategorySort, CollaboratorsPage, SubTodosPage, TodosPage};

/// Typed cache key: resource kind plus the parameters the query was issued
/// with. Two reads with the same key share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Todos { page: u32, search: Option<String> },
    CollaboratedTodos { page: u32 },
    Invitations { page: u32 },
    SubTodos { todo_id: Uuid },
    Collaborators { todo_id: Uuid },
    Categories { page: u32, sort: Option<CategorySort> },
}

/// Prefix used for invalidation: matches every key of a resource kind,
/// optionally narrowed to one parent todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    Todos,
    CollaboratedTodos,
    Invitations,
    SubTodos(Option<Uuid>),
    Collaborators(Option<Uuid>),
    Categories,
}

impl QueryKey {
    pub fn matches(&self, prefix: KeyPrefix) -> bool {
        match (self, prefix) {
            (QueryKey::Todos { .. }, KeyPrefix::Todos) => true,
            (QueryKey::CollaboratedTodos { .. }, KeyPrefix::CollaboratedTodos) => true,
            (QueryKey::Invitations { .. }, KeyPrefix::Invitations) => true,
            (QueryKey::SubTodos { .. }, KeyPrefix::SubTodos(None)) => true,
            (QueryKey::SubTodos { todo_id }, KeyPrefix::SubTodos(Some(id))) => *todo_id == id,
            (QueryKey::Collaborators { .. }, KeyPrefix::Collaborators(None)) => true,
            (QueryKey::Collaborators { todo_id }, KeyPrefix::Collaborators(Some(id))) => {
                *todo_id == id
            }
            (QueryKey::Categories { .. }, KeyPrefix::Categories) => true,
            _ => false,
        }
    }
}

/// Last-known server state for one query key. Entries stay typed so a patch
/// cannot write a subtodo page under a todos key.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Todos(TodosPage),
    SubTodos(SubTodosPage),
    Collaborators(CollaboratorsPage),
    Categories(CategoriesPage),
}

impl Snapshot {
    pub fn as_todos(&self) -> Option<&TodosPage> {
        match self {
            Snapshot::Todos(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_subtodos(&self) -> Option<&SubTodosPage> {
        match self {
            Snapshot::SubTodos(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_collaborators(&self) -> Option<&CollaboratorsPage> {
        match self {
            Snapshot::Collaborators(page) => Some(page),
            _ => None,
        }
    }

    pub fn as_categories(&self) -> Option<&CategoriesPage> {
        match self {
            Snapshot::Categories(page) => Some(page),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: Snapshot,
    stale: bool,
    fetched_at: DateTime<Utc>,
}

/// In-memory keyed cache of query results.
///
/// Owned by the application root and handed to the services that need it;
/// there is no ambient singleton. Reads never block on the network: a read
/// returns whatever snapshot is present, and staleness is surfaced through
/// `lookup` rather than hidden.
#[derive(Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot for `key`, stale or not.
    pub fn read(&self, key: &QueryKey) -> Option<Snapshot> {
        self.guard().get(key).map(|e| e.snapshot.clone())
    }

    /// Snapshot plus its staleness flag.
    pub fn lookup(&self, key: &QueryKey) -> Option<(Snapshot, bool)> {
        self.guard()
            .get(key)
            .map(|e| (e.snapshot.clone(), e.stale))
    }

    pub fn fetched_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
        self.guard().get(key).map(|e| e.fetched_at)
    }

    /// Store a fresh server snapshot, clearing any staleness mark.
    pub fn write(&self, key: QueryKey, snapshot: Snapshot) {
        self.guard_mut().insert(
            key,
            CacheEntry {
                snapshot,
                stale: false,
                fetched_at: Utc::now(),
            },
        );
    }

    /// Apply a pure update to the snapshot under `key`, if present. Returns
    /// the displaced snapshot so the caller can roll back.
    pub fn patch<F>(&self, key: &QueryKey, f: F) -> Option<Snapshot>
    where
        F: Fn(&Snapshot) -> Snapshot,
    {
        let mut entries = self.guard_mut();
        let entry = entries.get_mut(key)?;
        let previous = entry.snapshot.clone();
        entry.snapshot = f(&previous);
        Some(previous)
    }

    /// Apply a pure update to every snapshot whose key matches `prefix`.
    /// Returns the displaced snapshots, keyed, for rollback.
    pub fn patch_matching<F>(&self, prefix: KeyPrefix, f: F) -> Vec<(QueryKey, Snapshot)>
    where
        F: Fn(&Snapshot) -> Snapshot,
    {
        let mut entries = self.guard_mut();
        let mut displaced = Vec::new();
        for (key, entry) in entries.iter_mut() {
            if key.matches(prefix) {
                let previous = entry.snapshot.clone();
                entry.snapshot = f(&previous);
                displaced.push((key.clone(), previous));
            }
        }
        displaced
    }

    /// Put back snapshots displaced by an optimistic patch. Entries that have
    /// been refetched in the meantime (newer `fetched_at`) are left alone.
    pub fn restore(&self, saved: Vec<(QueryKey, Snapshot)>, patched_at: DateTime<Utc>) {
        let mut entries = self.guard_mut();
        for (key, snapshot) in saved {
            if let Some(entry) = entries.get_mut(&key) {
                if entry.fetched_at <= patched_at {
                    entry.snapshot = snapshot;
                }
            }
        }
    }

    /// Mark every entry matching `prefix` stale. Stale entries are still
    /// readable; the refresh worker (or the next forced read) reconciles them.
    pub fn invalidate(&self, prefix: KeyPrefix) -> usize {
        let mut entries = self.guard_mut();
        let mut marked = 0;
        for (key, entry) in entries.iter_mut() {
            if key.matches(prefix) {
                entry.stale = true;
                marked += 1;
            }
        }
        marked
    }

    /// Drop entries matching `prefix` entirely (used when the underlying
    /// resource is gone, e.g. subtodo lists of a deleted todo).
    pub fn evict(&self, prefix: KeyPrefix) -> usize {
        let mut entries = self.guard_mut();
        let before = entries.len();
        entries.retain(|key, _| !key.matches(prefix));
        before - entries.len()
    }

    pub fn stale_keys(&self) -> Vec<QueryKey> {
        self.guard()
            .iter()
            .filter(|(_, e)| e.stale)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.read().expect("cache lock poisoned")
    }

    fn guard_mut(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.write().expect("cache lock poisoned")
    }
}
