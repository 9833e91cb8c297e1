//! The synchronization pass.
//!
//! One strictly sequential pass per invocation: fetch tasks and
//! collaborators from the source, re-apply every task to the board as a
//! card, persist the observed state, then complete any task whose card
//! sits in the Done frame. Each step is idempotent, so a failed run is
//! simply retried whole by the next scheduled invocation.

use crate::api::{Board, TaskSource};
use crate::db::Database;
use crate::error::SyncError;
use crate::types::{CardPosition, Collaborator, name_color};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Counters for one pass, logged by the caller.
#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub tasks_fetched: usize,
    pub collaborators_fetched: usize,
    pub cards_created: usize,
    pub cards_updated: usize,
    pub tags_applied: usize,
    pub done_cards_seen: usize,
    pub tasks_completed: usize,
    pub unlinked_done_cards: usize,
}

/// Drives one sync pass against a task source, a board, and the cache.
pub struct SyncEngine<'a, S, B> {
    source: &'a S,
    board: &'a B,
    db: &'a Database,
    project_id: Option<String>,
}

impl<'a, S: TaskSource, B: Board> SyncEngine<'a, S, B> {
    pub fn new(source: &'a S, board: &'a B, db: &'a Database, project_id: Option<String>) -> Self {
        Self {
            source,
            board,
            db,
            project_id,
        }
    }

    pub async fn run(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let project = self.project_id.as_deref();

        // Fetch everything from the source before the first local write,
        // so a failed fetch leaves the cache exactly as the last run
        // left it.
        let collaborators = self.source.list_collaborators(project).await?;
        let tasks = self.source.list_tasks(project).await?;
        report.collaborators_fetched = collaborators.len();
        report.tasks_fetched = tasks.len();
        info!(
            tasks = tasks.len(),
            collaborators = collaborators.len(),
            "fetched source state"
        );

        for collaborator in &collaborators {
            self.db.save_collaborator(collaborator)?;
        }

        let by_id: HashMap<&str, &Collaborator> = collaborators
            .iter()
            .map(|c| (c.id.as_str(), c))
            .collect();

        for (index, task) in tasks.iter().enumerate() {
            let assignee = task
                .assignee_id
                .as_deref()
                .and_then(|id| by_id.get(id).copied());
            let theme = assignee.map(|a| name_color(&a.name));
            let known_card = self.db.get_task(&task.id)?.and_then(|cached| cached.card_id);

            // Re-apply state every run instead of diffing against the
            // cache; the board update is idempotent.
            let upsert = self
                .board
                .upsert_card(
                    task,
                    theme.as_deref(),
                    known_card.as_deref(),
                    CardPosition::grid(index),
                )
                .await?;
            if upsert.created {
                debug!(task_id = %task.id, card_id = %upsert.card.id, "card created");
                report.cards_created += 1;
            } else {
                report.cards_updated += 1;
            }

            // Record the card link before tagging; if a tag call fails the
            // next run must find the card instead of creating a second one.
            self.db.save_task(task, Some(&upsert.card.id))?;

            if let Some(assignee) = assignee {
                self.board.tag_card(&upsert.card.id, &assignee.name).await?;
                report.tags_applied += 1;
            }
        }

        // The full Done listing is in hand before the first completion
        // call, so a partial board read can never complete a task.
        let done_cards = self.board.list_done_cards().await?;
        report.done_cards_seen = done_cards.len();

        for card in &done_cards {
            let Some(cached) = self.db.task_for_card(&card.id)? else {
                let err = SyncError::DataIntegrity {
                    card_id: card.id.clone(),
                };
                warn!(%err, title = card.title.as_deref().unwrap_or(""), "skipping done card");
                report.unlinked_done_cards += 1;
                continue;
            };
            if cached.task.completed {
                continue;
            }
            self.source.complete_task(&cached.task.id).await?;
            self.db.mark_completed(&cached.task.id)?;
            info!(task_id = %cached.task.id, card_id = %card.id, "task completed from done card");
            report.tasks_completed += 1;
        }

        Ok(report)
    }
}
