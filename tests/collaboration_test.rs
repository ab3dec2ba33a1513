use std::sync::Arc;

use tododash_sync::cache::{QueryCache, QueryKey};
use tododash_sync::error::ApiError;
use tododash_sync::models::{CollaborationStatus, InviteDecision, TodoStatus};
use tododash_sync::remote::{InMemoryTodoService, TodoService};
use tododash_sync::services::{MutationDispatcher, QueryClient};

fn setup() -> (
    Arc<InMemoryTodoService>,
    Arc<QueryCache>,
    Arc<QueryClient>,
    MutationDispatcher,
) {
    let service = Arc::new(InMemoryTodoService::new());
    let cache = Arc::new(QueryCache::new());
    let remote: Arc<dyn TodoService> = service.clone();
    let client = Arc::new(QueryClient::new(remote.clone(), cache.clone()));
    let dispatcher = MutationDispatcher::new(remote, cache.clone());
    (service, cache, client, dispatcher)
}

#[tokio::test]
async fn invite_with_valid_code_creates_pending_invitation() {
    let (service, _cache, client, dispatcher) = setup();
    let todo = service.seed_todo("shared", None, TodoStatus::Pending);
    service.register_invite_code("abcd1234", service.user_id());

    let invitation = dispatcher
        .invite_collaborator(todo.id, "abcd1234")
        .await
        .expect("invite");
    assert_eq!(invitation.status, CollaborationStatus::Pending);

    let collaborators = client.collaborators(todo.id).await.expect("list");
    assert_eq!(collaborators.data.len(), 1);
    assert_eq!(collaborators.data[0].status, CollaborationStatus::Pending);
}

#[tokio::test]
async fn invite_with_unknown_code_is_rejected() {
    let (service, _cache, _client, dispatcher) = setup();
    let todo = service.seed_todo("shared", None, TodoStatus::Pending);

    let err = dispatcher
        .invite_collaborator(todo.id, "nope")
        .await
        .expect_err("bad code");
    assert!(matches!(err, ApiError::BadRequest(_)));

    let err = dispatcher
        .invite_collaborator(todo.id, "   ")
        .await
        .expect_err("empty code caught client-side");
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn duplicate_invite_conflicts() {
    let (service, _cache, _client, dispatcher) = setup();
    let todo = service.seed_todo("shared", None, TodoStatus::Pending);
    service.register_invite_code("abcd1234", service.user_id());

    dispatcher
        .invite_collaborator(todo.id, "abcd1234")
        .await
        .expect("first invite");
    let err = dispatcher
        .invite_collaborator(todo.id, "abcd1234")
        .await
        .expect_err("second invite");
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn confirming_patches_the_invitation_list_optimistically() {
    let (service, cache, client, dispatcher) = setup();
    let todo = service.seed_todo("shared", None, TodoStatus::Pending);
    service.seed_invitation(todo.id);
    client.invitations_page(1).await.expect("initial fetch");

    dispatcher
        .confirm_invitation(todo.id, InviteDecision::Accepted)
        .await
        .expect("confirm");

    // The patched snapshot is in place (and stale, pending reconciliation).
    let (snapshot, stale) = cache
        .lookup(&QueryKey::Invitations { page: 1 })
        .expect("entry present");
    assert!(stale);
    assert_eq!(
        snapshot.as_collaborators().expect("invitations").data[0].status,
        CollaborationStatus::Accepted
    );

    let invitations = client.invitations_page(1).await.expect("refetch");
    assert_eq!(invitations.data[0].status, CollaborationStatus::Accepted);
}

// P4: accepted and rejected are terminal.
#[tokio::test]
async fn resolved_invitations_cannot_be_confirmed_again() {
    let (service, _cache, _client, dispatcher) = setup();
    let todo = service.seed_todo("shared", None, TodoStatus::Pending);
    service.seed_invitation(todo.id);

    dispatcher
        .confirm_invitation(todo.id, InviteDecision::Rejected)
        .await
        .expect("first confirm");

    let err = dispatcher
        .confirm_invitation(todo.id, InviteDecision::Accepted)
        .await
        .expect_err("already resolved");
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(
        service.invitation_for(todo.id).expect("row kept").status,
        CollaborationStatus::Rejected
    );
}

#[tokio::test]
async fn accepting_grants_access_to_the_collaborated_list() {
    let (service, _cache, client, dispatcher) = setup();
    let todo = service.seed_todo("shared", None, TodoStatus::Pending);
    service.seed_invitation(todo.id);

    let before = client.collaborated_todos_page(1).await.expect("list");
    assert!(before.data.is_empty());

    dispatcher
        .confirm_invitation(todo.id, InviteDecision::Accepted)
        .await
        .expect("confirm");

    let after = client.collaborated_todos_page(1).await.expect("refetch");
    assert_eq!(after.data.len(), 1);
    assert_eq!(after.data[0].id, todo.id);
}

#[tokio::test]
async fn removing_a_collaborator_invalidates_the_list() {
    let (service, cache, client, dispatcher) = setup();
    let todo = service.seed_todo("shared", None, TodoStatus::Pending);
    let invitation = service.seed_invitation(todo.id);
    client.collaborators(todo.id).await.expect("initial fetch");

    dispatcher
        .remove_collaborator(todo.id, invitation.user_id)
        .await
        .expect("remove");

    assert!(!cache.stale_keys().is_empty());
    let collaborators = client.collaborators(todo.id).await.expect("refetch");
    assert!(collaborators.data.is_empty());
}
