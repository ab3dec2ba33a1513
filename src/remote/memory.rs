use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    CategoriesPage, Category, CategoryCreate, CategorySort, CategoryUpdate, CollaborationStatus,
    Collaborator, CollaboratorsPage, InviteDecision, Priority, SubTodo, SubTodoCreate,
    SubTodoUpdate, SubTodosPage, Todo, TodoCreate, TodoStatus, TodoUpdate, TodosPage,
};
use crate::remote::dto::Message;
use crate::remote::TodoService;

#[derive(Default)]
struct RemoteState {
    todos: Vec<Todo>,
    subtodos: Vec<SubTodo>,
    collaborators: Vec<Collaborator>,
    categories: Vec<Category>,
    invite_codes: HashMap<String, Uuid>,
}

/// In-memory stand-in for the remote dashboard API. Behaves like a
/// single-user session: seeded data belongs to `user_id`, invitations are
/// resolved as that user. Supports one-shot failure injection and records
/// every call so tests can assert on traffic.
pub struct InMemoryTodoService {
    state: Mutex<RemoteState>,
    user_id: Uuid,
    fail_next: AtomicBool,
    latency: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
}

impl Default for InMemoryTodoService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTodoService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState::default()),
            user_id: Uuid::new_v4(),
            fail_next: AtomicBool::new(false),
            latency: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Make the next request fail with a 500 before touching any state.
    pub fn fail_next_request(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Delay every request by `latency`, simulating a slow network.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("latency lock poisoned") = latency;
    }

    /// Calls recorded so far, most recent last.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log lock poisoned").clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn register_invite_code(&self, code: &str, user_id: Uuid) {
        self.state().invite_codes.insert(code.to_string(), user_id);
    }

    pub fn seed_todo(&self, title: &str, desc: Option<&str>, status: TodoStatus) -> Todo {
        let now = Utc::now();
        let todo = Todo {
            id: Uuid::new_v4(),
            owner_id: self.user_id,
            title: title.to_string(),
            desc: desc.map(str::to_string),
            status,
            created_at: now,
            updated_at: now,
        };
        self.state().todos.push(todo.clone());
        todo
    }

    pub fn seed_subtodo(&self, todo_id: Uuid, title: &str, status: TodoStatus) -> SubTodo {
        let now = Utc::now();
        let subtodo = SubTodo {
            id: Uuid::new_v4(),
            todo_id,
            title: title.to_string(),
            desc: None,
            status,
            created_at: now,
            updated_at: now,
        };
        self.state().subtodos.push(subtodo.clone());
        subtodo
    }

    pub fn seed_category(&self, title: &str, priority: Priority) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            owner_id: self.user_id,
            title: title.to_string(),
            description: None,
            priority,
        };
        self.state().categories.push(category.clone());
        category
    }

    /// Seed a pending invitation addressed to the current user.
    pub fn seed_invitation(&self, todo_id: Uuid) -> Collaborator {
        let invitation = Collaborator {
            id: Uuid::new_v4(),
            todo_id,
            user_id: self.user_id,
            status: CollaborationStatus::Pending,
            created_at: Utc::now(),
        };
        self.state().collaborators.push(invitation.clone());
        invitation
    }

    /// Server-side view of a todo, bypassing the API surface.
    pub fn todo(&self, id: Uuid) -> Option<Todo> {
        self.state().todos.iter().find(|t| t.id == id).cloned()
    }

    pub fn invitation_for(&self, todo_id: Uuid) -> Option<Collaborator> {
        self.state()
            .collaborators
            .iter()
            .find(|c| c.todo_id == todo_id && c.user_id == self.user_id)
            .cloned()
    }

    fn state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().expect("remote state lock poisoned")
    }

    async fn record(&self, call: String) -> Result<(), ApiError> {
        self.calls.lock().expect("call log lock poisoned").push(call);
        let latency = *self.latency.lock().expect("latency lock poisoned");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ApiError::Api {
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

fn window<T: Clone>(items: &[T], skip: u32, limit: u32) -> Vec<T> {
    items
        .iter()
        .skip(skip as usize)
        .take(limit as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl TodoService for InMemoryTodoService {
    async fn list_todos(
        &self,
        skip: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<TodosPage, ApiError> {
        self.record(format!("list_todos search={:?}", search)).await?;
        let state = self.state();
        let needle = search.map(str::to_lowercase);
        let matches: Vec<Todo> = state
            .todos
            .iter()
            .filter(|t| match &needle {
                Some(needle) if !needle.is_empty() => {
                    t.title.to_lowercase().contains(needle)
                        || t.desc
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                }
                _ => true,
            })
            .cloned()
            .collect();
        Ok(TodosPage {
            count: matches.len() as i64,
            data: window(&matches, skip, limit),
        })
    }

    async fn create_todo(&self, req: &TodoCreate) -> Result<Todo, ApiError> {
        self.record(format!("create_todo {:?}", req.title)).await?;
        let now = Utc::now();
        let todo = Todo {
            id: Uuid::new_v4(),
            owner_id: self.user_id,
            title: req.title.clone(),
            desc: req.desc.clone(),
            status: TodoStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.state().todos.push(todo.clone());
        Ok(todo)
    }

    async fn update_todo(&self, id: Uuid, req: &TodoUpdate) -> Result<Todo, ApiError> {
        self.record(format!("update_todo {}", id)).await?;
        let mut state = self.state();
        let todo = state
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(ApiError::NotFound)?;
        if let Some(title) = &req.title {
            todo.title = title.clone();
        }
        if let Some(desc) = &req.desc {
            todo.desc = Some(desc.clone());
        }
        if let Some(status) = req.status {
            todo.status = status;
        }
        todo.updated_at = Utc::now();
        Ok(todo.clone())
    }

    async fn delete_todo(&self, id: Uuid) -> Result<Message, ApiError> {
        self.record(format!("delete_todo {}", id)).await?;
        let mut state = self.state();
        if !state.todos.iter().any(|t| t.id == id) {
            return Err(ApiError::NotFound);
        }
        // Deleting a todo cascades to its subtodos and collaborator rows.
        state.todos.retain(|t| t.id != id);
        state.subtodos.retain(|s| s.todo_id != id);
        state.collaborators.retain(|c| c.todo_id != id);
        Ok(Message {
            message: "Task deleted successfully".to_string(),
        })
    }

    async fn bulk_update_status(
        &self,
        ids: &[Uuid],
        status: TodoStatus,
    ) -> Result<Message, ApiError> {
        self.record(format!("bulk_update_status n={}", ids.len())).await?;
        let mut state = self.state();
        for id in ids {
            if !state.todos.iter().any(|t| t.id == *id) {
                return Err(ApiError::NotFound);
            }
        }
        let now = Utc::now();
        for todo in state.todos.iter_mut().filter(|t| ids.contains(&t.id)) {
            todo.status = status;
            todo.updated_at = now;
        }
        Ok(Message {
            message: format!("{} tasks updated", ids.len()),
        })
    }

    async fn list_collaborated_todos(&self, skip: u32, limit: u32) -> Result<TodosPage, ApiError> {
        self.record("list_collaborated_todos".to_string()).await?;
        let state = self.state();
        let accepted: Vec<Uuid> = state
            .collaborators
            .iter()
            .filter(|c| c.user_id == self.user_id && c.status == CollaborationStatus::Accepted)
            .map(|c| c.todo_id)
            .collect();
        let todos: Vec<Todo> = state
            .todos
            .iter()
            .filter(|t| accepted.contains(&t.id))
            .cloned()
            .collect();
        Ok(TodosPage {
            count: todos.len() as i64,
            data: window(&todos, skip, limit),
        })
    }

    async fn list_invitations(&self, skip: u32, limit: u32) -> Result<CollaboratorsPage, ApiError> {
        self.record("list_invitations".to_string()).await?;
        let state = self.state();
        let invitations: Vec<Collaborator> = state
            .collaborators
            .iter()
            .filter(|c| c.user_id == self.user_id)
            .cloned()
            .collect();
        Ok(CollaboratorsPage {
            count: invitations.len() as i64,
            data: window(&invitations, skip, limit),
        })
    }

    async fn invite_collaborator(
        &self,
        todo_id: Uuid,
        invite_code: &str,
    ) -> Result<Collaborator, ApiError> {
        self.record(format!("invite_collaborator {}", todo_id)).await?;
        let mut state = self.state();
        if !state.todos.iter().any(|t| t.id == todo_id) {
            return Err(ApiError::NotFound);
        }
        let user_id = *state
            .invite_codes
            .get(invite_code)
            .ok_or_else(|| ApiError::BadRequest("invalid invite code".to_string()))?;
        if state
            .collaborators
            .iter()
            .any(|c| c.todo_id == todo_id && c.user_id == user_id)
        {
            return Err(ApiError::Conflict(
                "collaborator already exists for this todo".to_string(),
            ));
        }
        let invitation = Collaborator {
            id: Uuid::new_v4(),
            todo_id,
            user_id,
            status: CollaborationStatus::Pending,
            created_at: Utc::now(),
        };
        state.collaborators.push(invitation.clone());
        Ok(invitation)
    }

    async fn list_collaborators(&self, todo_id: Uuid) -> Result<CollaboratorsPage, ApiError> {
        self.record(format!("list_collaborators {}", todo_id)).await?;
        let state = self.state();
        let collaborators: Vec<Collaborator> = state
            .collaborators
            .iter()
            .filter(|c| c.todo_id == todo_id)
            .cloned()
            .collect();
        Ok(CollaboratorsPage {
            count: collaborators.len() as i64,
            data: collaborators,
        })
    }

    async fn remove_collaborator(
        &self,
        todo_id: Uuid,
        user_id: Uuid,
    ) -> Result<Message, ApiError> {
        self.record(format!("remove_collaborator {}", todo_id)).await?;
        let mut state = self.state();
        let before = state.collaborators.len();
        state
            .collaborators
            .retain(|c| !(c.todo_id == todo_id && c.user_id == user_id));
        if state.collaborators.len() == before {
            return Err(ApiError::NotFound);
        }
        Ok(Message {
            message: "Collaborator removed successfully".to_string(),
        })
    }

    async fn confirm_collaboration(
        &self,
        todo_id: Uuid,
        decision: InviteDecision,
    ) -> Result<Collaborator, ApiError> {
        self.record(format!("confirm_collaboration {}", todo_id)).await?;
        let mut state = self.state();
        let invitation = state
            .collaborators
            .iter_mut()
            .find(|c| c.todo_id == todo_id && c.user_id == self.user_id)
            .ok_or(ApiError::NotFound)?;
        if invitation.status.is_terminal() {
            return Err(ApiError::Conflict(
                "invitation already resolved".to_string(),
            ));
        }
        invitation.status = decision.into();
        Ok(invitation.clone())
    }

    async fn list_subtodos(&self, todo_id: Uuid) -> Result<SubTodosPage, ApiError> {
        self.record(format!("list_subtodos {}", todo_id)).await?;
        let state = self.state();
        if !state.todos.iter().any(|t| t.id == todo_id) {
            return Err(ApiError::NotFound);
        }
        let subtodos: Vec<SubTodo> = state
            .subtodos
            .iter()
            .filter(|s| s.todo_id == todo_id)
            .cloned()
            .collect();
        Ok(SubTodosPage {
            count: subtodos.len() as i64,
            data: subtodos,
        })
    }

    async fn create_subtodo(
        &self,
        todo_id: Uuid,
        req: &SubTodoCreate,
    ) -> Result<SubTodo, ApiError> {
        self.record(format!("create_subtodo {}", todo_id)).await?;
        let mut state = self.state();
        if !state.todos.iter().any(|t| t.id == todo_id) {
            return Err(ApiError::NotFound);
        }
        let now = Utc::now();
        let subtodo = SubTodo {
            id: Uuid::new_v4(),
            todo_id,
            title: req.title.clone(),
            desc: req.desc.clone(),
            status: TodoStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.subtodos.push(subtodo.clone());
        Ok(subtodo)
    }

    async fn update_subtodo(
        &self,
        todo_id: Uuid,
        id: Uuid,
        req: &SubTodoUpdate,
    ) -> Result<SubTodo, ApiError> {
        self.record(format!("update_subtodo {}", id)).await?;
        let mut state = self.state();
        let subtodo = state
            .subtodos
            .iter_mut()
            .find(|s| s.id == id && s.todo_id == todo_id)
            .ok_or(ApiError::NotFound)?;
        if let Some(title) = &req.title {
            subtodo.title = title.clone();
        }
        if let Some(desc) = &req.desc {
            subtodo.desc = Some(desc.clone());
        }
        if let Some(status) = req.status {
            subtodo.status = status;
        }
        subtodo.updated_at = Utc::now();
        Ok(subtodo.clone())
    }

    async fn delete_subtodo(&self, todo_id: Uuid, id: Uuid) -> Result<Message, ApiError> {
        self.record(format!("delete_subtodo {}", id)).await?;
        let mut state = self.state();
        let before = state.subtodos.len();
        state
            .subtodos
            .retain(|s| !(s.id == id && s.todo_id == todo_id));
        if state.subtodos.len() == before {
            return Err(ApiError::NotFound);
        }
        Ok(Message {
            message: "SubTodo deleted successfully".to_string(),
        })
    }

    async fn list_categories(
        &self,
        page: u32,
        limit: u32,
        sort: Option<CategorySort>,
    ) -> Result<CategoriesPage, ApiError> {
        self.record(format!("list_categories page={}", page)).await?;
        let state = self.state();
        let mut categories = state.categories.clone();
        match sort {
            Some(CategorySort::PriorityAsc) => categories.sort_by_key(|c| c.priority),
            Some(CategorySort::PriorityDesc) => {
                categories.sort_by_key(|c| std::cmp::Reverse(c.priority))
            }
            None => {}
        }
        let skip = page.saturating_sub(1) * limit;
        Ok(CategoriesPage {
            count: categories.len() as i64,
            data: window(&categories, skip, limit),
        })
    }

    async fn create_category(&self, req: &CategoryCreate) -> Result<Category, ApiError> {
        self.record(format!("create_category {:?}", req.title)).await?;
        let category = Category {
            id: Uuid::new_v4(),
            owner_id: self.user_id,
            title: req.title.clone(),
            description: req.description.clone(),
            priority: req.priority,
        };
        self.state().categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, req: &CategoryUpdate) -> Result<Category, ApiError> {
        self.record(format!("update_category {}", id)).await?;
        let mut state = self.state();
        let category = state
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ApiError::NotFound)?;
        if let Some(title) = &req.title {
            category.title = title.clone();
        }
        if let Some(description) = &req.description {
            category.description = Some(description.clone());
        }
        if let Some(priority) = req.priority {
            category.priority = priority;
        }
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<Message, ApiError> {
        self.record(format!("delete_category {}", id)).await?;
        let mut state = self.state();
        let before = state.categories.len();
        state.categories.retain(|c| c.id != id);
        if state.categories.len() == before {
            return Err(ApiError::NotFound);
        }
        Ok(Message {
            message: "Category deleted successfully".to_string(),
        })
    }

    async fn delete_all_categories(&self) -> Result<Message, ApiError> {
        self.record("delete_all_categories".to_string()).await?;
        let mut state = self.state();
        let removed = state.categories.len();
        state.categories.clear();
        Ok(Message {
            message: format!("{} categories deleted", removed),
        })
    }
}
