use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{KeyPrefix, QueryCache, QueryKey, Snapshot};
use crate::error::ApiError;
use crate::models::{
    Category, CategoryCreate, CategoryUpdate, CollaborationStatus, Collaborator, InviteDecision,
    SubTodo, SubTodoCreate, SubTodoUpdate, Todo, TodoCreate, TodoStatus, TodoUpdate,
};
use crate::remote::dto::Message;
use crate::remote::TodoService;

/// What to do with an optimistic patch when its mutation fails.
///
/// `RefetchOnly` (default) leaves reconciliation to a refetch: the patched
/// prefixes are invalidated so the next read pulls server truth.
/// `RollbackOnFailure` restores the displaced snapshots immediately. Either
/// way the optimistic data does not outlive the mutation un-reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RollbackPolicy {
    #[default]
    RefetchOnly,
    RollbackOnFailure,
}

/// Locally tracked set of checked todo rows, used by bulk status changes.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    ids: HashSet<Uuid>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: Uuid) {
        if !self.ids.insert(id) {
            self.ids.remove(&id);
        }
    }

    pub fn select_all<I: IntoIterator<Item = Uuid>>(&mut self, ids: I) {
        self.ids.extend(ids);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.ids.iter().copied().collect()
    }
}

/// Write path of the sync layer.
///
/// Status changes are optimistic: the relevant cache entries are patched
/// before the remote call, and the affected prefixes are invalidated once the
/// call settles. Creation, deletion and collaborator management skip the
/// patch and rely on invalidation alone.
pub struct MutationDispatcher {
    remote: Arc<dyn TodoService>,
    cache: Arc<QueryCache>,
    rollback: RollbackPolicy,
}

impl MutationDispatcher {
    pub fn new(remote: Arc<dyn TodoService>, cache: Arc<QueryCache>) -> Self {
        Self {
            remote,
            cache,
            rollback: RollbackPolicy::default(),
        }
    }

    pub fn with_rollback_policy(mut self, policy: RollbackPolicy) -> Self {
        self.rollback = policy;
        self
    }

    // --- todos ---

    pub async fn create_todo(&self, req: &TodoCreate) -> Result<Todo, ApiError> {
        req.validate()?;
        let todo = self.remote.create_todo(req).await?;
        info!("created todo {}", todo.id);
        self.cache.invalidate(KeyPrefix::Todos);
        Ok(todo)
    }

    pub async fn update_todo(&self, id: Uuid, req: &TodoUpdate) -> Result<Todo, ApiError> {
        req.validate()?;
        let todo = self.remote.update_todo(id, req).await?;
        self.cache.invalidate(KeyPrefix::Todos);
        Ok(todo)
    }

    pub async fn delete_todo(&self, id: Uuid) -> Result<Message, ApiError> {
        let message = self.remote.delete_todo(id).await?;
        info!("deleted todo {}", id);
        self.cache.invalidate(KeyPrefix::Todos);
        self.cache.invalidate(KeyPrefix::CollaboratedTodos);
        // The todo is gone, so its child lists are meaningless rather than stale.
        self.cache.evict(KeyPrefix::SubTodos(Some(id)));
        self.cache.evict(KeyPrefix::Collaborators(Some(id)));
        Ok(message)
    }

    /// Optimistic status flip: every cached todos page shows the new status
    /// before the network call resolves.
    pub async fn set_todo_status(&self, id: Uuid, status: TodoStatus) -> Result<Todo, ApiError> {
        let patched_at = Utc::now();
        let saved = self
            .cache
            .patch_matching(KeyPrefix::Todos, |snap| with_todo_status(snap, id, status));

        match self.remote.update_todo(id, &TodoUpdate::status(status)).await {
            Ok(todo) => {
                info!("todo {} status set to {:?}", id, status);
                self.cache.invalidate(KeyPrefix::Todos);
                Ok(todo)
            }
            Err(e) => {
                warn!("todo {} status change failed: {}", id, e);
                self.reconcile_failure(saved, patched_at, &[KeyPrefix::Todos]);
                Err(e)
            }
        }
    }

    /// Bulk status change for the current selection. The selection is cleared
    /// only on success so a failed batch can be retried as-is; the todos
    /// prefix is invalidated either way, since the server may have applied a
    /// subset before failing.
    pub async fn bulk_set_status(
        &self,
        selection: &mut SelectionSet,
        status: TodoStatus,
    ) -> Result<Message, ApiError> {
        if selection.is_empty() {
            return Err(ApiError::Validation("no todos selected".to_string()));
        }
        let ids = selection.ids();
        let result = self.remote.bulk_update_status(&ids, status).await;
        self.cache.invalidate(KeyPrefix::Todos);
        match result {
            Ok(message) => {
                info!("bulk status change applied to {} todos", ids.len());
                selection.clear();
                Ok(message)
            }
            Err(e) => {
                warn!("bulk status change failed: {}", e);
                Err(e)
            }
        }
    }

    // --- subtodos ---

    pub async fn create_subtodo(
        &self,
        todo_id: Uuid,
        req: &SubTodoCreate,
    ) -> Result<SubTodo, ApiError> {
        req.validate()?;
        let subtodo = self.remote.create_subtodo(todo_id, req).await?;
        self.cache.invalidate(KeyPrefix::SubTodos(Some(todo_id)));
        Ok(subtodo)
    }

    pub async fn update_subtodo(
        &self,
        todo_id: Uuid,
        id: Uuid,
        req: &SubTodoUpdate,
    ) -> Result<SubTodo, ApiError> {
        req.validate()?;
        let subtodo = self.remote.update_subtodo(todo_id, id, req).await?;
        self.cache.invalidate(KeyPrefix::SubTodos(Some(todo_id)));
        Ok(subtodo)
    }

    pub async fn delete_subtodo(&self, todo_id: Uuid, id: Uuid) -> Result<Message, ApiError> {
        let message = self.remote.delete_subtodo(todo_id, id).await?;
        self.cache.invalidate(KeyPrefix::SubTodos(Some(todo_id)));
        Ok(message)
    }

    pub async fn set_subtodo_status(
        &self,
        todo_id: Uuid,
        id: Uuid,
        status: TodoStatus,
    ) -> Result<SubTodo, ApiError> {
        let patched_at = Utc::now();
        let prefix = KeyPrefix::SubTodos(Some(todo_id));
        let saved = self
            .cache
            .patch_matching(prefix, |snap| with_subtodo_status(snap, id, status));

        match self
            .remote
            .update_subtodo(todo_id, id, &SubTodoUpdate::status(status))
            .await
        {
            Ok(subtodo) => {
                info!("subtodo {} status set to {:?}", id, status);
                self.cache.invalidate(prefix);
                Ok(subtodo)
            }
            Err(e) => {
                warn!("subtodo {} status change failed: {}", id, e);
                self.reconcile_failure(saved, patched_at, &[prefix]);
                Err(e)
            }
        }
    }

    // --- collaboration ---

    pub async fn invite_collaborator(
        &self,
        todo_id: Uuid,
        invite_code: &str,
    ) -> Result<Collaborator, ApiError> {
        if invite_code.trim().is_empty() {
            return Err(ApiError::Validation("invite code is required".to_string()));
        }
        let invitation = self.remote.invite_collaborator(todo_id, invite_code).await?;
        info!("invited collaborator to todo {}", todo_id);
        self.cache.invalidate(KeyPrefix::Collaborators(Some(todo_id)));
        Ok(invitation)
    }

    pub async fn remove_collaborator(
        &self,
        todo_id: Uuid,
        user_id: Uuid,
    ) -> Result<Message, ApiError> {
        let message = self.remote.remove_collaborator(todo_id, user_id).await?;
        self.cache.invalidate(KeyPrefix::Collaborators(Some(todo_id)));
        Ok(message)
    }

    /// Resolve an invitation. The invitations snapshot is patched to the
    /// decided status immediately; the collaboration lists are invalidated
    /// once the remote confirms. `InviteDecision` cannot express `pending`,
    /// so a resolved invitation never reverts.
    pub async fn confirm_invitation(
        &self,
        todo_id: Uuid,
        decision: InviteDecision,
    ) -> Result<Collaborator, ApiError> {
        let status: CollaborationStatus = decision.into();
        let patched_at = Utc::now();
        let saved = self.cache.patch_matching(KeyPrefix::Invitations, |snap| {
            with_invitation_status(snap, todo_id, status)
        });

        match self.remote.confirm_collaboration(todo_id, decision).await {
            Ok(invitation) => {
                info!("invitation for todo {} resolved as {:?}", todo_id, status);
                self.cache.invalidate(KeyPrefix::Invitations);
                self.cache.invalidate(KeyPrefix::CollaboratedTodos);
                self.cache.invalidate(KeyPrefix::Collaborators(Some(todo_id)));
                Ok(invitation)
            }
            Err(e) => {
                warn!("confirming invitation for todo {} failed: {}", todo_id, e);
                self.reconcile_failure(saved, patched_at, &[KeyPrefix::Invitations]);
                Err(e)
            }
        }
    }

    // --- categories ---

    pub async fn create_category(&self, req: &CategoryCreate) -> Result<Category, ApiError> {
        req.validate()?;
        let category = self.remote.create_category(req).await?;
        self.cache.invalidate(KeyPrefix::Categories);
        Ok(category)
    }

    pub async fn update_category(
        &self,
        id: Uuid,
        req: &CategoryUpdate,
    ) -> Result<Category, ApiError> {
        req.validate()?;
        let category = self.remote.update_category(id, req).await?;
        self.cache.invalidate(KeyPrefix::Categories);
        Ok(category)
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<Message, ApiError> {
        let message = self.remote.delete_category(id).await?;
        self.cache.invalidate(KeyPrefix::Categories);
        Ok(message)
    }

    pub async fn delete_all_categories(&self) -> Result<Message, ApiError> {
        let message = self.remote.delete_all_categories().await?;
        info!("deleted all categories");
        self.cache.invalidate(KeyPrefix::Categories);
        Ok(message)
    }

    fn reconcile_failure(
        &self,
        saved: Vec<(QueryKey, Snapshot)>,
        patched_at: DateTime<Utc>,
        prefixes: &[KeyPrefix],
    ) {
        match self.rollback {
            RollbackPolicy::RollbackOnFailure => self.cache.restore(saved, patched_at),
            RollbackPolicy::RefetchOnly => {
                for prefix in prefixes {
                    self.cache.invalidate(*prefix);
                }
            }
        }
    }
}

fn with_todo_status(snapshot: &Snapshot, id: Uuid, status: TodoStatus) -> Snapshot {
    match snapshot {
        Snapshot::Todos(page) => {
            let mut page = page.clone();
            for todo in page.data.iter_mut().filter(|t| t.id == id) {
                todo.status = status;
            }
            Snapshot::Todos(page)
        }
        other => other.clone(),
    }
}

fn with_subtodo_status(snapshot: &Snapshot, id: Uuid, status: TodoStatus) -> Snapshot {
    match snapshot {
        Snapshot::SubTodos(page) => {
            let mut page = page.clone();
            for subtodo in page.data.iter_mut().filter(|s| s.id == id) {
                subtodo.status = status;
            }
            Snapshot::SubTodos(page)
        }
        other => other.clone(),
    }
}

fn with_invitation_status(
    snapshot: &Snapshot,
    todo_id: Uuid,
    status: CollaborationStatus,
) -> Snapshot {
    match snapshot {
        Snapshot::Collaborators(page) => {
            let mut page = page.clone();
            for invitation in page.data.iter_mut().filter(|c| c.todo_id == todo_id) {
                invitation.status = status;
            }
            Snapshot::Collaborators(page)
        }
        other => other.clone(),
    }
}
