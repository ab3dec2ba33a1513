use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{QueryCache, QueryKey, Snapshot};
use crate::error::ApiError;
use crate::models::{CategoriesPage, CategorySort, CollaboratorsPage, SubTodosPage, TodosPage};
use crate::remote::TodoService;
use crate::services::pager::{CATEGORIES_PER_PAGE, Pager, TODOS_PER_PAGE};

/// Handle to an in-flight background fetch. Aborting (or dropping) it cancels
/// the request, so a fetch never outlives the scope that spawned it.
pub struct FetchHandle {
    handle: Option<JoinHandle<()>>,
}

impl FetchHandle {
    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wait for the fetch to settle instead of cancelling it.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for FetchHandle {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

/// Read path of the sync layer: serves fresh snapshots straight from the
/// cache and goes to the remote only when the entry is missing or stale.
pub struct QueryClient {
    remote: Arc<dyn TodoService>,
    cache: Arc<QueryCache>,
    todos_per_page: u32,
    categories_per_page: u32,
}

impl QueryClient {
    pub fn new(remote: Arc<dyn TodoService>, cache: Arc<QueryCache>) -> Self {
        Self {
            remote,
            cache,
            todos_per_page: TODOS_PER_PAGE,
            categories_per_page: CATEGORIES_PER_PAGE,
        }
    }

    pub fn with_page_sizes(mut self, todos: u32, categories: u32) -> Self {
        self.todos_per_page = todos;
        self.categories_per_page = categories;
        self
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn todos_pager(&self, page: u32) -> Pager {
        Pager::at(page, self.todos_per_page)
    }

    pub async fn todos_page(
        &self,
        page: u32,
        search: Option<&str>,
    ) -> Result<TodosPage, ApiError> {
        let key = QueryKey::Todos {
            page,
            search: search.map(str::to_string),
        };
        if let Some(page) = self.cached(&key, Snapshot::as_todos) {
            return Ok(page);
        }
        self.refresh(&key).await?;
        self.cached(&key, Snapshot::as_todos)
            .ok_or(ApiError::NotFound)
    }

    pub async fn collaborated_todos_page(&self, page: u32) -> Result<TodosPage, ApiError> {
        let key = QueryKey::CollaboratedTodos { page };
        if let Some(page) = self.cached(&key, Snapshot::as_todos) {
            return Ok(page);
        }
        self.refresh(&key).await?;
        self.cached(&key, Snapshot::as_todos)
            .ok_or(ApiError::NotFound)
    }

    pub async fn invitations_page(&self, page: u32) -> Result<CollaboratorsPage, ApiError> {
        let key = QueryKey::Invitations { page };
        if let Some(page) = self.cached(&key, Snapshot::as_collaborators) {
            return Ok(page);
        }
        self.refresh(&key).await?;
        self.cached(&key, Snapshot::as_collaborators)
            .ok_or(ApiError::NotFound)
    }

    pub async fn subtodos(&self, todo_id: Uuid) -> Result<SubTodosPage, ApiError> {
        let key = QueryKey::SubTodos { todo_id };
        if let Some(page) = self.cached(&key, Snapshot::as_subtodos) {
            return Ok(page);
        }
        self.refresh(&key).await?;
        self.cached(&key, Snapshot::as_subtodos)
            .ok_or(ApiError::NotFound)
    }

    pub async fn collaborators(&self, todo_id: Uuid) -> Result<CollaboratorsPage, ApiError> {
        let key = QueryKey::Collaborators { todo_id };
        if let Some(page) = self.cached(&key, Snapshot::as_collaborators) {
            return Ok(page);
        }
        self.refresh(&key).await?;
        self.cached(&key, Snapshot::as_collaborators)
            .ok_or(ApiError::NotFound)
    }

    pub async fn categories_page(
        &self,
        page: u32,
        sort: Option<CategorySort>,
    ) -> Result<CategoriesPage, ApiError> {
        let key = QueryKey::Categories { page, sort };
        if let Some(page) = self.cached(&key, Snapshot::as_categories) {
            return Ok(page);
        }
        self.refresh(&key).await?;
        self.cached(&key, Snapshot::as_categories)
            .ok_or(ApiError::NotFound)
    }

    /// Fetch the authoritative snapshot for `key` and store it, regardless of
    /// the current cache state.
    pub async fn refresh(&self, key: &QueryKey) -> Result<(), ApiError> {
        debug!("refreshing {:?}", key);
        let snapshot = match key {
            QueryKey::Todos { page, search } => {
                let window = Pager::at(*page, self.todos_per_page).window();
                Snapshot::Todos(
                    self.remote
                        .list_todos(window.skip, window.limit, search.as_deref())
                        .await?,
                )
            }
            QueryKey::CollaboratedTodos { page } => {
                let window = Pager::at(*page, self.todos_per_page).window();
                Snapshot::Todos(
                    self.remote
                        .list_collaborated_todos(window.skip, window.limit)
                        .await?,
                )
            }
            QueryKey::Invitations { page } => {
                let window = Pager::at(*page, self.todos_per_page).window();
                Snapshot::Collaborators(
                    self.remote
                        .list_invitations(window.skip, window.limit)
                        .await?,
                )
            }
            QueryKey::SubTodos { todo_id } => {
                Snapshot::SubTodos(self.remote.list_subtodos(*todo_id).await?)
            }
            QueryKey::Collaborators { todo_id } => {
                Snapshot::Collaborators(self.remote.list_collaborators(*todo_id).await?)
            }
            QueryKey::Categories { page, sort } => Snapshot::Categories(
                self.remote
                    .list_categories(*page, self.categories_per_page, *sort)
                    .await?,
            ),
        };
        self.cache.write(key.clone(), snapshot);
        Ok(())
    }

    /// Kick off a background refresh of `key`. The returned handle aborts the
    /// fetch when dropped, tying its lifetime to the caller's scope.
    pub fn spawn_prefetch(self: &Arc<Self>, key: QueryKey) -> FetchHandle {
        let client = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Err(e) = client.refresh(&key).await {
                warn!("background fetch of {:?} failed: {}", key, e);
            }
        });
        FetchHandle {
            handle: Some(handle),
        }
    }

    /// Warm the next page when the current one came back full, mirroring the
    /// dashboard's prefetch-on-full-page behavior.
    pub fn prefetch_next_page(
        self: &Arc<Self>,
        page: u32,
        search: Option<&str>,
        returned: usize,
    ) -> Option<FetchHandle> {
        if self.todos_pager(page).has_next_page(returned) {
            Some(self.spawn_prefetch(QueryKey::Todos {
                page: page + 1,
                search: search.map(str::to_string),
            }))
        } else {
            None
        }
    }

    fn cached<T: Clone, F>(&self, key: &QueryKey, project: F) -> Option<T>
    where
        F: Fn(&Snapshot) -> Option<&T>,
    {
        match self.cache.lookup(key) {
            Some((snapshot, false)) => project(&snapshot).cloned(),
            _ => None,
        }
    }
}
