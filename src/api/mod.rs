//! External API contracts and their concrete adapters.
//!
//! Each external service is an explicit trait so the sync pass can be
//! exercised against in-memory fakes; `todoist.rs` and `miro.rs` hold the
//! one concrete adapter per service.

pub mod miro;
pub mod todoist;

use crate::error::{SyncError, SyncResult};
use crate::types::{Card, CardPosition, CardUpsert, Collaborator, Task};
use async_trait::async_trait;

/// The task-management side: where tasks live and get completed.
#[async_trait]
pub trait TaskSource {
    /// Active tasks, optionally narrowed to one project.
    async fn list_tasks(&self, project_id: Option<&str>) -> SyncResult<Vec<Task>>;

    /// People who can be assigned to tasks in the given project.
    async fn list_collaborators(&self, project_id: Option<&str>) -> SyncResult<Vec<Collaborator>>;

    /// Mark a task complete at the source.
    async fn complete_task(&self, task_id: &str) -> SyncResult<()>;
}

/// The visual board side: where tasks appear as cards.
#[async_trait]
pub trait Board {
    /// Push a task to the board. Updates `known_card_id` in place when
    /// given; creates a card at `position` when there is none, or when
    /// the known card turned out to be gone (the board is authoritative
    /// for card existence).
    async fn upsert_card(
        &self,
        task: &Task,
        theme: Option<&str>,
        known_card_id: Option<&str>,
        position: CardPosition,
    ) -> SyncResult<CardUpsert>;

    /// All cards currently inside the board's "Done" frame. The full
    /// listing is collected before returning, so callers never act on a
    /// partial read.
    async fn list_done_cards(&self) -> SyncResult<Vec<Card>>;

    /// Attach a named tag to a card. Re-applying an already attached tag
    /// is a no-op.
    async fn tag_card(&self, card_id: &str, tag: &str) -> SyncResult<()>;
}

/// Pass through a successful response, otherwise classify the status and
/// capture the body for the error.
pub(crate) async fn check_status(
    service: &'static str,
    resp: reqwest::Response,
) -> SyncResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        let body = resp.text().await.unwrap_or_default();
        Err(SyncError::status(service, status.as_u16(), body))
    }
}
