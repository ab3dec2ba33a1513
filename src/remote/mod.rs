pub mod dto;

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    CategoriesPage, Category, CategoryCreate, CategorySort, CategoryUpdate, Collaborator,
    CollaboratorsPage, InviteDecision, SubTodo, SubTodoCreate, SubTodoUpdate, SubTodosPage, Todo,
    TodoCreate, TodoStatus, TodoUpdate, TodosPage,
};

mod memory;
pub use memory::InMemoryTodoService;

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_token: String,
}

impl RemoteConfig {
    pub fn new_from_env() -> Result<Self, ApiError> {
        let base_url = env::var("TODO_API_URL")
            .map_err(|_| ApiError::BadRequest("TODO_API_URL is not set".to_string()))?;
        let api_token = env::var("TODO_API_TOKEN")
            .map_err(|_| ApiError::BadRequest("TODO_API_TOKEN is not set".to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

/// The remote todo service consumed by the sync layer. Implemented over HTTP
/// in production and in memory for tests.
#[async_trait]
pub trait TodoService: Send + Sync {
    async fn list_todos(
        &self,
        skip: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<TodosPage, ApiError>;
    async fn create_todo(&self, req: &TodoCreate) -> Result<Todo, ApiError>;
    async fn update_todo(&self, id: Uuid, req: &TodoUpdate) -> Result<Todo, ApiError>;
    async fn delete_todo(&self, id: Uuid) -> Result<dto::Message, ApiError>;
    async fn bulk_update_status(
        &self,
        ids: &[Uuid],
        status: TodoStatus,
    ) -> Result<dto::Message, ApiError>;

    async fn list_collaborated_todos(&self, skip: u32, limit: u32) -> Result<TodosPage, ApiError>;
    async fn list_invitations(&self, skip: u32, limit: u32) -> Result<CollaboratorsPage, ApiError>;
    async fn invite_collaborator(
        &self,
        todo_id: Uuid,
        invite_code: &str,
    ) -> Result<Collaborator, ApiError>;
    async fn list_collaborators(&self, todo_id: Uuid) -> Result<CollaboratorsPage, ApiError>;
    async fn remove_collaborator(
        &self,
        todo_id: Uuid,
        user_id: Uuid,
    ) -> Result<dto::Message, ApiError>;
    async fn confirm_collaboration(
        &self,
        todo_id: Uuid,
        decision: InviteDecision,
    ) -> Result<Collaborator, ApiError>;

    async fn list_subtodos(&self, todo_id: Uuid) -> Result<SubTodosPage, ApiError>;
    async fn create_subtodo(
        &self,
        todo_id: Uuid,
        req: &SubTodoCreate,
    ) -> Result<SubTodo, ApiError>;
    async fn update_subtodo(
        &self,
        todo_id: Uuid,
        id: Uuid,
        req: &SubTodoUpdate,
    ) -> Result<SubTodo, ApiError>;
    async fn delete_subtodo(&self, todo_id: Uuid, id: Uuid) -> Result<dto::Message, ApiError>;

    async fn list_categories(
        &self,
        page: u32,
        limit: u32,
        sort: Option<CategorySort>,
    ) -> Result<CategoriesPage, ApiError>;
    async fn create_category(&self, req: &CategoryCreate) -> Result<Category, ApiError>;
    async fn update_category(&self, id: Uuid, req: &CategoryUpdate) -> Result<Category, ApiError>;
    async fn delete_category(&self, id: Uuid) -> Result<dto::Message, ApiError>;
    async fn delete_all_categories(&self) -> Result<dto::Message, ApiError>;
}

/// HTTP implementation against the remote dashboard API. Every request
/// carries the bearer token from `RemoteConfig`.
pub struct HttpTodoService {
    client: Client,
    config: RemoteConfig,
}

impl HttpTodoService {
    pub fn new(config: RemoteConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::BadRequest(format!("failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.config.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("Authorization", format!("Bearer {}", self.config.api_token))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            // Failure payloads are expected to carry a `detail` message; fall
            // back to the raw body when they don't.
            let message = serde_json::from_str::<dto::ErrorBody>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            tracing::error!("failed to parse response body: {}", e);
            ApiError::Parse(e)
        })
    }
}

#[async_trait]
impl TodoService for HttpTodoService {
    async fn list_todos(
        &self,
        skip: u32,
        limit: u32,
        search: Option<&str>,
    ) -> Result<TodosPage, ApiError> {
        let mut builder = self
            .request(reqwest::Method::GET, "/todos")
            .query(&[("skip", skip), ("limit", limit)]);
        if let Some(search) = search {
            builder = builder.query(&[("search", search)]);
        }
        self.send(builder).await
    }

    async fn create_todo(&self, req: &TodoCreate) -> Result<Todo, ApiError> {
        self.send(self.request(reqwest::Method::POST, "/todos").json(req))
            .await
    }

    async fn update_todo(&self, id: Uuid, req: &TodoUpdate) -> Result<Todo, ApiError> {
        self.send(
            self.request(reqwest::Method::PUT, &format!("/todos/{}", id))
                .json(req),
        )
        .await
    }

    async fn delete_todo(&self, id: Uuid) -> Result<dto::Message, ApiError> {
        self.send(self.request(reqwest::Method::DELETE, &format!("/todos/{}", id)))
            .await
    }

    async fn bulk_update_status(
        &self,
        ids: &[Uuid],
        status: TodoStatus,
    ) -> Result<dto::Message, ApiError> {
        let body = dto::BulkStatusRequest {
            todo_ids: ids.to_vec(),
            status,
        };
        self.send(
            self.request(reqwest::Method::PUT, "/todos/bulk-status")
                .json(&body),
        )
        .await
    }

    async fn list_collaborated_todos(&self, skip: u32, limit: u32) -> Result<TodosPage, ApiError> {
        self.send(
            self.request(reqwest::Method::GET, "/todos/collaborated")
                .query(&[("skip", skip), ("limit", limit)]),
        )
        .await
    }

    async fn list_invitations(&self, skip: u32, limit: u32) -> Result<CollaboratorsPage, ApiError> {
        self.send(
            self.request(reqwest::Method::GET, "/todos/invitations")
                .query(&[("skip", skip), ("limit", limit)]),
        )
        .await
    }

    async fn invite_collaborator(
        &self,
        todo_id: Uuid,
        invite_code: &str,
    ) -> Result<Collaborator, ApiError> {
        let body = dto::InviteRequest {
            invite_code: invite_code.to_string(),
        };
        self.send(
            self.request(reqwest::Method::POST, &format!("/todos/{}/invite", todo_id))
                .json(&body),
        )
        .await
    }

    async fn list_collaborators(&self, todo_id: Uuid) -> Result<CollaboratorsPage, ApiError> {
        self.send(self.request(
            reqwest::Method::GET,
            &format!("/todos/{}/collaborators", todo_id),
        ))
        .await
    }

    async fn remove_collaborator(
        &self,
        todo_id: Uuid,
        user_id: Uuid,
    ) -> Result<dto::Message, ApiError> {
        self.send(self.request(
            reqwest::Method::DELETE,
            &format!("/todos/{}/collaborators/{}", todo_id, user_id),
        ))
        .await
    }

    async fn confirm_collaboration(
        &self,
        todo_id: Uuid,
        decision: InviteDecision,
    ) -> Result<Collaborator, ApiError> {
        let body = dto::ConfirmRequest { status: decision };
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/todos/{}/confirm", todo_id),
            )
            .json(&body),
        )
        .await
    }

    async fn list_subtodos(&self, todo_id: Uuid) -> Result<SubTodosPage, ApiError> {
        self.send(self.request(
            reqwest::Method::GET,
            &format!("/todos/{}/subtodos", todo_id),
        ))
        .await
    }

    async fn create_subtodo(
        &self,
        todo_id: Uuid,
        req: &SubTodoCreate,
    ) -> Result<SubTodo, ApiError> {
        self.send(
            self.request(
                reqwest::Method::POST,
                &format!("/todos/{}/subtodos", todo_id),
            )
            .json(req),
        )
        .await
    }

    async fn update_subtodo(
        &self,
        todo_id: Uuid,
        id: Uuid,
        req: &SubTodoUpdate,
    ) -> Result<SubTodo, ApiError> {
        self.send(
            self.request(
                reqwest::Method::PUT,
                &format!("/todos/{}/subtodos/{}", todo_id, id),
            )
            .json(req),
        )
        .await
    }

    async fn delete_subtodo(&self, todo_id: Uuid, id: Uuid) -> Result<dto::Message, ApiError> {
        self.send(self.request(
            reqwest::Method::DELETE,
            &format!("/todos/{}/subtodos/{}", todo_id, id),
        ))
        .await
    }

    async fn list_categories(
        &self,
        page: u32,
        limit: u32,
        sort: Option<CategorySort>,
    ) -> Result<CategoriesPage, ApiError> {
        let mut builder = self
            .request(reqwest::Method::GET, "/categories")
            .query(&[("page", page), ("limit", limit)]);
        if let Some(sort) = sort {
            builder = builder.query(&[("sort", sort.as_str())]);
        }
        self.send(builder).await
    }

    async fn create_category(&self, req: &CategoryCreate) -> Result<Category, ApiError> {
        self.send(self.request(reqwest::Method::POST, "/categories").json(req))
            .await
    }

    async fn update_category(&self, id: Uuid, req: &CategoryUpdate) -> Result<Category, ApiError> {
        self.send(
            self.request(reqwest::Method::PUT, &format!("/categories/{}", id))
                .json(req),
        )
        .await
    }

    async fn delete_category(&self, id: Uuid) -> Result<dto::Message, ApiError> {
        self.send(self.request(reqwest::Method::DELETE, &format!("/categories/{}", id)))
            .await
    }

    async fn delete_all_categories(&self) -> Result<dto::Message, ApiError> {
        self.send(self.request(reqwest::Method::DELETE, "/categories"))
            .await
    }
}
