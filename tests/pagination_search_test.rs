use std::sync::Arc;
use std::time::Duration;

use tododash_sync::cache::{QueryCache, QueryKey};
use tododash_sync::models::{TodoStatus, TodosPage};
use tododash_sync::remote::{InMemoryTodoService, TodoService};
use tododash_sync::services::{
    filter_todos_local, Pager, QueryClient, SearchDebouncer, TODOS_PER_PAGE,
};

fn setup() -> (Arc<InMemoryTodoService>, Arc<QueryClient>) {
    let service = Arc::new(InMemoryTodoService::new());
    let cache = Arc::new(QueryCache::new());
    let remote: Arc<dyn TodoService> = service.clone();
    let client = Arc::new(QueryClient::new(remote, cache));
    (service, client)
}

// P3: hasNextPage iff the page came back full, hasPreviousPage iff page > 1.
#[tokio::test]
async fn page_flags_follow_the_window_size() {
    let (service, client) = setup();
    for i in 0..10 {
        service.seed_todo(&format!("todo {}", i), None, TodoStatus::Pending);
    }

    let first = client.todos_page(1, None).await.expect("page 1");
    let pager = Pager::at(1, TODOS_PER_PAGE);
    assert_eq!(first.data.len(), 7);
    assert!(pager.has_next_page(first.data.len()));
    assert!(!pager.has_previous_page());

    let second = client.todos_page(2, None).await.expect("page 2");
    let pager = pager.next();
    assert_eq!(second.data.len(), 3);
    assert!(!pager.has_next_page(second.data.len()));
    assert!(pager.has_previous_page());
}

#[tokio::test]
async fn a_multiple_of_the_page_size_still_reports_a_next_page() {
    let (service, client) = setup();
    for i in 0..14 {
        service.seed_todo(&format!("todo {}", i), None, TodoStatus::Pending);
    }

    // 14 items, page size 7: page 2 is full, so a next page is assumed even
    // though page 3 will come back empty. The derivation only looks at the
    // returned window.
    let second = client.todos_page(2, None).await.expect("page 2");
    assert!(Pager::at(2, TODOS_PER_PAGE).has_next_page(second.data.len()));

    let third = client.todos_page(3, None).await.expect("page 3");
    assert!(third.data.is_empty());
    assert!(!Pager::at(3, TODOS_PER_PAGE).has_next_page(third.data.len()));
}

#[test]
fn window_translates_page_to_skip_and_limit() {
    let pager = Pager::at(3, 7);
    let window = pager.window();
    assert_eq!(window.skip, 14);
    assert_eq!(window.limit, 7);
}

#[tokio::test]
async fn cached_page_is_served_without_a_second_request() {
    let (service, client) = setup();
    service.seed_todo("only", None, TodoStatus::Pending);

    client.todos_page(1, None).await.expect("first read");
    client.todos_page(1, None).await.expect("second read");
    assert_eq!(service.call_count("list_todos"), 1);

    // A different search term is a different key.
    client.todos_page(1, Some("only")).await.expect("search read");
    assert_eq!(service.call_count("list_todos"), 2);
}

#[tokio::test]
async fn full_page_triggers_a_next_page_prefetch() {
    let (service, client) = setup();
    for i in 0..8 {
        service.seed_todo(&format!("todo {}", i), None, TodoStatus::Pending);
    }

    let first = client.todos_page(1, None).await.expect("page 1");
    let prefetch = client
        .prefetch_next_page(1, None, first.data.len())
        .expect("full page prefetches");
    prefetch.join().await;

    assert_eq!(service.call_count("list_todos"), 2);
    assert!(
        client
            .cache()
            .read(&QueryKey::Todos {
                page: 2,
                search: None
            })
            .is_some()
    );
}

#[tokio::test]
async fn short_page_skips_the_prefetch() {
    let (service, client) = setup();
    service.seed_todo("only", None, TodoStatus::Pending);

    let first = client.todos_page(1, None).await.expect("page 1");
    assert!(client.prefetch_next_page(1, None, first.data.len()).is_none());
}

#[tokio::test]
async fn dropping_the_handle_aborts_an_in_flight_fetch() {
    let (service, client) = setup();
    service.seed_todo("slow", None, TodoStatus::Pending);
    service.set_latency(Duration::from_millis(200));

    let handle = client.spawn_prefetch(QueryKey::Todos {
        page: 1,
        search: None,
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(handle);
    tokio::time::sleep(Duration::from_millis(250)).await;

    // The fetch was cancelled mid-flight; nothing was written.
    assert!(
        client
            .cache()
            .read(&QueryKey::Todos {
                page: 1,
                search: None
            })
            .is_none()
    );
}

// P5: rapid keystrokes within the debounce window issue one remote call,
// carrying the final input value.
#[tokio::test]
async fn debounce_collapses_rapid_keystrokes() {
    let (service, client) = setup();
    service.seed_todo("write spec", None, TodoStatus::Pending);
    let debouncer = Arc::new(SearchDebouncer::new(Duration::from_millis(50)));

    let mut settles = Vec::new();
    for input in ["w", "wr", "wri"] {
        let debouncer = debouncer.clone();
        settles.push(tokio::spawn(
            async move { debouncer.settle(input).await },
        ));
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let last = debouncer.settle("write").await;
    assert_eq!(last.as_deref(), Some("write"));

    for settle in settles {
        assert_eq!(settle.await.expect("join"), None, "superseded keystroke");
    }

    // Only the settled value reaches the remote.
    if let Some(term) = last {
        client.todos_page(1, Some(&term)).await.expect("search");
    }
    assert_eq!(service.call_count("list_todos"), 1);
    assert!(service.calls()[0].contains("write"));
}

#[tokio::test]
async fn empty_input_settles_to_a_cleared_search() {
    let debouncer = SearchDebouncer::new(Duration::from_millis(10));
    assert_eq!(debouncer.settle("   ").await.as_deref(), Some(""));
}

#[test]
fn local_filter_matches_title_desc_and_status_label() {
    let page = TodosPage {
        count: 3,
        data: vec![
            todo("Write spec", Some("draft the design"), TodoStatus::Pending),
            todo("Groceries", None, TodoStatus::InProgress),
            todo("Ship release", Some("cut v1.0"), TodoStatus::Completed),
        ],
    };

    assert_eq!(filter_todos_local(&page, "spec").data.len(), 1);
    assert_eq!(filter_todos_local(&page, "DRAFT").data.len(), 1);
    // "in progress" matches via the status label, underscore-free.
    assert_eq!(filter_todos_local(&page, "in progress").data.len(), 1);
    assert_eq!(filter_todos_local(&page, "").data.len(), 3);
    assert_eq!(filter_todos_local(&page, "nope").data.len(), 0);
}

fn todo(title: &str, desc: Option<&str>, status: TodoStatus) -> tododash_sync::models::Todo {
    let now = chrono::Utc::now();
    tododash_sync::models::Todo {
        id: uuid::Uuid::new_v4(),
        owner_id: uuid::Uuid::new_v4(),
        title: title.to_string(),
        desc: desc.map(str::to_string),
        status,
        created_at: now,
        updated_at: now,
    }
}
