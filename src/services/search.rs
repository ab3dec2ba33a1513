use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::models::TodosPage;

/// Default delay before a keystroke becomes a remote search.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Collapses rapid input into a single remote query. Each submission bumps a
/// generation counter and waits out the delay; if a newer submission arrived
/// in the meantime the older one yields `None` instead of a query term.
pub struct SearchDebouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    /// Wait out the debounce window for `input`. Returns the trimmed term to
    /// send remotely, or `None` when a later submission superseded this one.
    /// An empty input settles to `Some("")`, which callers treat as
    /// "clear the search".
    pub async fn settle(&self, input: &str) -> Option<String> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.generation.load(Ordering::SeqCst) == generation {
            Some(input.trim().to_string())
        } else {
            None
        }
    }
}

/// Client-side filter stage applied to the already-cached page, independent
/// of the debounced remote query. Matches case-insensitively against title,
/// description, and the human-readable status label ("in progress"). This
/// stage operates on possibly-stale data; the remote query is the source of
/// truth.
pub fn filter_todos_local(page: &TodosPage, needle: &str) -> TodosPage {
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return page.clone();
    }
    let data: Vec<_> = page
        .data
        .iter()
        .filter(|todo| {
            todo.title.to_lowercase().contains(&needle)
                || todo
                    .desc
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
                || todo.status.as_label().contains(&needle)
        })
        .cloned()
        .collect();
    TodosPage {
        count: data.len() as i64,
        data,
    }
}
