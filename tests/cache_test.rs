use chrono::Utc;
use uuid::Uuid;

use tododash_sync::cache::{KeyPrefix, QueryCache, QueryKey, Snapshot};
use tododash_sync::models::{SubTodosPage, TodosPage};

fn todos_key(page: u32) -> QueryKey {
    QueryKey::Todos { page, search: None }
}

fn empty_todos() -> Snapshot {
    Snapshot::Todos(TodosPage {
        data: Vec::new(),
        count: 0,
    })
}

#[test]
fn read_returns_written_snapshot() {
    let cache = QueryCache::new();
    assert!(cache.read(&todos_key(1)).is_none());

    cache.write(todos_key(1), empty_todos());
    let snapshot = cache.read(&todos_key(1)).expect("snapshot present");
    assert_eq!(snapshot.as_todos().expect("todos snapshot").count, 0);
}

#[test]
fn write_clears_staleness() {
    let cache = QueryCache::new();
    cache.write(todos_key(1), empty_todos());
    cache.invalidate(KeyPrefix::Todos);
    assert_eq!(cache.stale_keys().len(), 1);

    cache.write(todos_key(1), empty_todos());
    assert!(cache.stale_keys().is_empty());
}

#[test]
fn invalidate_only_marks_matching_prefix() {
    let cache = QueryCache::new();
    let todo_id = Uuid::new_v4();
    cache.write(todos_key(1), empty_todos());
    cache.write(
        QueryKey::SubTodos { todo_id },
        Snapshot::SubTodos(SubTodosPage {
            data: Vec::new(),
            count: 0,
        }),
    );

    let marked = cache.invalidate(KeyPrefix::SubTodos(Some(todo_id)));
    assert_eq!(marked, 1);
    assert_eq!(cache.stale_keys(), vec![QueryKey::SubTodos { todo_id }]);

    // Stale entries are still readable.
    let (_, stale) = cache
        .lookup(&QueryKey::SubTodos { todo_id })
        .expect("entry kept");
    assert!(stale);
}

#[test]
fn subtodo_prefix_without_id_matches_every_parent() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert!(QueryKey::SubTodos { todo_id: a }.matches(KeyPrefix::SubTodos(None)));
    assert!(QueryKey::SubTodos { todo_id: a }.matches(KeyPrefix::SubTodos(Some(a))));
    assert!(!QueryKey::SubTodos { todo_id: a }.matches(KeyPrefix::SubTodos(Some(b))));
    assert!(!QueryKey::SubTodos { todo_id: a }.matches(KeyPrefix::Todos));
}

#[test]
fn patch_matching_returns_displaced_snapshots() {
    let cache = QueryCache::new();
    cache.write(todos_key(1), empty_todos());
    cache.write(todos_key(2), empty_todos());

    let displaced = cache.patch_matching(KeyPrefix::Todos, |snap| match snap {
        Snapshot::Todos(page) => {
            let mut page = page.clone();
            page.count = 99;
            Snapshot::Todos(page)
        }
        other => other.clone(),
    });
    assert_eq!(displaced.len(), 2);

    for page in 1..=2 {
        let snapshot = cache.read(&todos_key(page)).expect("entry present");
        assert_eq!(snapshot.as_todos().expect("todos").count, 99);
    }
}

#[test]
fn restore_puts_back_displaced_snapshots() {
    let cache = QueryCache::new();
    cache.write(todos_key(1), empty_todos());

    let patched_at = Utc::now();
    let displaced = cache.patch_matching(KeyPrefix::Todos, |snap| match snap {
        Snapshot::Todos(page) => {
            let mut page = page.clone();
            page.count = 99;
            Snapshot::Todos(page)
        }
        other => other.clone(),
    });

    cache.restore(displaced, patched_at);
    let snapshot = cache.read(&todos_key(1)).expect("entry present");
    assert_eq!(snapshot.as_todos().expect("todos").count, 0);
}

#[test]
fn restore_skips_entries_refetched_after_the_patch() {
    let cache = QueryCache::new();
    cache.write(todos_key(1), empty_todos());

    let patched_at = Utc::now();
    let displaced = cache.patch_matching(KeyPrefix::Todos, |snap| snap.clone());

    // A refetch lands between the patch and the rollback; the rollback must
    // not clobber the newer server truth.
    std::thread::sleep(std::time::Duration::from_millis(5));
    cache.write(
        todos_key(1),
        Snapshot::Todos(TodosPage {
            data: Vec::new(),
            count: 42,
        }),
    );

    cache.restore(displaced, patched_at);
    let snapshot = cache.read(&todos_key(1)).expect("entry present");
    assert_eq!(snapshot.as_todos().expect("todos").count, 42);
}

#[test]
fn evict_drops_entries_entirely() {
    let cache = QueryCache::new();
    let todo_id = Uuid::new_v4();
    cache.write(todos_key(1), empty_todos());
    cache.write(
        QueryKey::SubTodos { todo_id },
        Snapshot::SubTodos(SubTodosPage {
            data: Vec::new(),
            count: 0,
        }),
    );

    let evicted = cache.evict(KeyPrefix::SubTodos(Some(todo_id)));
    assert_eq!(evicted, 1);
    assert!(cache.read(&QueryKey::SubTodos { todo_id }).is_none());
    assert_eq!(cache.len(), 1);
}
