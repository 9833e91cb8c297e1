//! End-to-end tests for the sync pass.
//!
//! The orchestrator runs against in-memory fakes of both services and a
//! real in-memory cache, which is enough to exercise every observable
//! property of a pass: card creation and update, tagging, completion
//! reconciliation, idempotence, and failure behavior.

use async_trait::async_trait;
use board_sync::api::{Board, TaskSource};
use board_sync::db::Database;
use board_sync::error::{SyncError, SyncResult};
use board_sync::sync::SyncEngine;
use board_sync::types::{Card, CardPosition, CardUpsert, Collaborator, Task, name_color};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn task(id: &str, title: &str, assignee_id: Option<&str>) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        project_id: Some("proj-1".to_string()),
        assignee_id: assignee_id.map(str::to_string),
        completed: false,
        priority: 1,
        due_date: None,
        url: None,
        created_at: None,
    }
}

fn collaborator(id: &str, name: &str) -> Collaborator {
    Collaborator {
        id: id.to_string(),
        name: name.to_string(),
        email: None,
    }
}

/// Task source fake: serves canned tasks/collaborators, records
/// completion calls, optionally fails the task fetch.
#[derive(Default)]
struct FakeSource {
    tasks: Mutex<Vec<Task>>,
    collaborators: Vec<Collaborator>,
    completed: Mutex<Vec<String>>,
    fail_task_fetch: bool,
}

impl FakeSource {
    fn with_tasks(tasks: Vec<Task>, collaborators: Vec<Collaborator>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            collaborators,
            ..Default::default()
        }
    }

    /// Replace the active task listing (a completed task disappears from
    /// the source's active list, the way Todoist behaves).
    fn set_tasks(&self, tasks: Vec<Task>) {
        *self.tasks.lock().unwrap() = tasks;
    }

    fn completed_calls(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskSource for FakeSource {
    async fn list_tasks(&self, _project_id: Option<&str>) -> SyncResult<Vec<Task>> {
        if self.fail_task_fetch {
            return Err(SyncError::Api {
                service: "todoist",
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn list_collaborators(&self, _project_id: Option<&str>) -> SyncResult<Vec<Collaborator>> {
        Ok(self.collaborators.clone())
    }

    async fn complete_task(&self, task_id: &str) -> SyncResult<()> {
        self.completed.lock().unwrap().push(task_id.to_string());
        Ok(())
    }
}

#[derive(Clone)]
struct StoredCard {
    title: String,
    theme: Option<String>,
}

/// Board fake: an in-memory card store with a Done list and per-card
/// tags.
#[derive(Default)]
struct FakeBoard {
    cards: Mutex<HashMap<String, StoredCard>>,
    done: Mutex<Vec<String>>,
    tags: Mutex<HashMap<String, Vec<String>>>,
    next_id: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_tagging: AtomicBool,
}

impl FakeBoard {
    fn card(&self, id: &str) -> Option<StoredCard> {
        self.cards.lock().unwrap().get(id).cloned()
    }

    fn card_count(&self) -> usize {
        self.cards.lock().unwrap().len()
    }

    fn move_to_done(&self, card_id: &str) {
        self.done.lock().unwrap().push(card_id.to_string());
    }

    fn delete_card(&self, card_id: &str) {
        self.cards.lock().unwrap().remove(card_id);
    }

    fn tags_of(&self, card_id: &str) -> Vec<String> {
        self.tags
            .lock()
            .unwrap()
            .get(card_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Board for FakeBoard {
    async fn upsert_card(
        &self,
        task: &Task,
        theme: Option<&str>,
        known_card_id: Option<&str>,
        _position: CardPosition,
    ) -> SyncResult<CardUpsert> {
        if let Some(card_id) = known_card_id {
            let mut cards = self.cards.lock().unwrap();
            if let Some(stored) = cards.get_mut(card_id) {
                stored.title = task.title.clone();
                stored.theme = theme.map(str::to_string);
                self.update_calls.fetch_add(1, Ordering::SeqCst);
                return Ok(CardUpsert {
                    card: Card {
                        id: card_id.to_string(),
                        title: Some(task.title.clone()),
                    },
                    created: false,
                });
            }
            // Known card vanished from the board; fall through to create.
        }
        let id = format!("card-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.cards.lock().unwrap().insert(
            id.clone(),
            StoredCard {
                title: task.title.clone(),
                theme: theme.map(str::to_string),
            },
        );
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CardUpsert {
            card: Card {
                id,
                title: Some(task.title.clone()),
            },
            created: true,
        })
    }

    async fn list_done_cards(&self) -> SyncResult<Vec<Card>> {
        Ok(self
            .done
            .lock()
            .unwrap()
            .iter()
            .map(|id| Card {
                id: id.clone(),
                title: None,
            })
            .collect())
    }

    async fn tag_card(&self, card_id: &str, tag: &str) -> SyncResult<()> {
        if self.fail_tagging.load(Ordering::SeqCst) {
            return Err(SyncError::Api {
                service: "miro",
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        let mut tags = self.tags.lock().unwrap();
        let entry = tags.entry(card_id.to_string()).or_default();
        if !entry.iter().any(|t| t == tag) {
            entry.push(tag.to_string());
        }
        Ok(())
    }
}

#[tokio::test]
async fn first_run_creates_a_card_per_task() {
    let db = setup_db();
    let source = FakeSource::with_tasks(
        vec![
            task("1", "Write report", Some("29")),
            task("2", "Review deck", None),
        ],
        vec![collaborator("29", "Alice")],
    );
    let board = FakeBoard::default();

    let report = SyncEngine::new(&source, &board, &db, None)
        .run()
        .await
        .unwrap();

    assert_eq!(report.tasks_fetched, 2);
    assert_eq!(report.cards_created, 2);
    assert_eq!(report.cards_updated, 0);
    assert_eq!(board.card_count(), 2);

    // Cache knows both tasks and their card links.
    let cached = db.get_task("1").unwrap().unwrap();
    assert!(cached.card_id.is_some());
    assert_eq!(db.all_task_ids().unwrap().len(), 2);
}

#[tokio::test]
async fn card_tag_and_theme_follow_the_assignee() {
    let db = setup_db();
    let source = FakeSource::with_tasks(
        vec![
            task("1", "Write report", Some("29")),
            task("2", "Untagged task", None),
        ],
        vec![collaborator("29", "Alice Example")],
    );
    let board = FakeBoard::default();

    let report = SyncEngine::new(&source, &board, &db, None)
        .run()
        .await
        .unwrap();
    assert_eq!(report.tags_applied, 1);

    let card_id = db.get_task("1").unwrap().unwrap().card_id.unwrap();
    assert_eq!(board.tags_of(&card_id), vec!["Alice Example".to_string()]);
    assert_eq!(
        board.card(&card_id).unwrap().theme.as_deref(),
        Some(name_color("Alice Example").as_str())
    );

    // No assignee: no tag, no theme.
    let untagged_id = db.get_task("2").unwrap().unwrap().card_id.unwrap();
    assert!(board.tags_of(&untagged_id).is_empty());
    assert!(board.card(&untagged_id).unwrap().theme.is_none());
}

#[tokio::test]
async fn rerun_without_upstream_changes_updates_in_place() {
    let db = setup_db();
    let source = FakeSource::with_tasks(
        vec![task("1", "Write report", None), task("2", "Review deck", None)],
        vec![],
    );
    let board = FakeBoard::default();

    let engine = SyncEngine::new(&source, &board, &db, None);
    engine.run().await.unwrap();
    let second = engine.run().await.unwrap();

    assert_eq!(second.cards_created, 0);
    assert_eq!(second.cards_updated, 2);
    assert_eq!(board.card_count(), 2);
    assert_eq!(board.create_calls.load(Ordering::SeqCst), 2);
    assert!(source.completed_calls().is_empty());
}

#[tokio::test]
async fn done_card_completes_its_task_exactly_once() {
    let db = setup_db();
    let source = FakeSource::with_tasks(vec![task("1", "Write report", None)], vec![]);
    let board = FakeBoard::default();
    let engine = SyncEngine::new(&source, &board, &db, None);

    engine.run().await.unwrap();
    let card_id = db.get_task("1").unwrap().unwrap().card_id.unwrap();

    // Someone drags the card into the Done frame between runs.
    board.move_to_done(&card_id);
    let second = engine.run().await.unwrap();
    assert_eq!(second.tasks_completed, 1);
    assert_eq!(source.completed_calls(), vec!["1".to_string()]);
    assert!(db.get_task("1").unwrap().unwrap().task.completed);

    // The completed task drops out of the active listing; the Done frame
    // still holds the card. Nothing further happens.
    source.set_tasks(vec![]);
    let third = engine.run().await.unwrap();
    assert_eq!(third.tasks_completed, 0);
    assert_eq!(source.completed_calls().len(), 1);
}

#[tokio::test]
async fn done_card_with_task_still_active_completes_only_once() {
    let db = setup_db();
    let source = FakeSource::with_tasks(vec![task("1", "Write report", None)], vec![]);
    let board = FakeBoard::default();
    let engine = SyncEngine::new(&source, &board, &db, None);

    engine.run().await.unwrap();
    let card_id = db.get_task("1").unwrap().unwrap().card_id.unwrap();
    board.move_to_done(&card_id);
    engine.run().await.unwrap();
    assert_eq!(source.completed_calls(), vec!["1".to_string()]);

    // The source keeps listing the task as active (eventual consistency).
    // Re-saving it must not clear the cache's completed flag, so the card
    // in the Done frame triggers no second completion.
    let third = engine.run().await.unwrap();
    assert_eq!(third.tasks_completed, 0);
    assert_eq!(source.completed_calls().len(), 1);
}

#[tokio::test]
async fn failed_tag_call_does_not_duplicate_the_card_on_retry() {
    let db = setup_db();
    let source = FakeSource::with_tasks(
        vec![task("1", "Write report", Some("29"))],
        vec![collaborator("29", "Alice")],
    );
    let board = FakeBoard::default();
    board.fail_tagging.store(true, Ordering::SeqCst);
    let engine = SyncEngine::new(&source, &board, &db, None);

    // Run fails after the card was created, but the card link is already
    // in the cache.
    assert!(engine.run().await.is_err());
    assert_eq!(board.card_count(), 1);
    let card_id = db.get_task("1").unwrap().unwrap().card_id.unwrap();

    // The retry finds the existing card instead of creating a second one.
    board.fail_tagging.store(false, Ordering::SeqCst);
    let second = engine.run().await.unwrap();
    assert_eq!(second.cards_created, 0);
    assert_eq!(second.cards_updated, 1);
    assert_eq!(board.card_count(), 1);
    assert_eq!(board.tags_of(&card_id), vec!["Alice".to_string()]);
}

#[tokio::test]
async fn done_card_without_a_link_is_skipped_not_fatal() {
    let db = setup_db();
    let source = FakeSource::with_tasks(vec![task("1", "Write report", None)], vec![]);
    let board = FakeBoard::default();
    board.move_to_done("card-nobody-knows");

    let report = SyncEngine::new(&source, &board, &db, None)
        .run()
        .await
        .unwrap();

    assert_eq!(report.unlinked_done_cards, 1);
    assert_eq!(report.tasks_completed, 0);
    assert!(source.completed_calls().is_empty());
}

#[tokio::test]
async fn failed_source_fetch_leaves_cache_untouched() {
    let db = setup_db();
    let source = FakeSource {
        tasks: Mutex::new(vec![task("1", "Write report", None)]),
        fail_task_fetch: true,
        ..Default::default()
    };
    let board = FakeBoard::default();

    let result = SyncEngine::new(&source, &board, &db, None).run().await;

    assert!(result.is_err());
    assert!(db.all_task_ids().unwrap().is_empty());
    assert_eq!(board.create_calls.load(Ordering::SeqCst), 0);
    assert!(source.completed_calls().is_empty());
}

#[tokio::test]
async fn card_deleted_on_the_board_is_recreated() {
    let db = setup_db();
    let source = FakeSource::with_tasks(vec![task("1", "Write report", None)], vec![]);
    let board = FakeBoard::default();
    let engine = SyncEngine::new(&source, &board, &db, None);

    engine.run().await.unwrap();
    let old_card_id = db.get_task("1").unwrap().unwrap().card_id.unwrap();

    // Board owners delete the card; the board stays authoritative.
    board.delete_card(&old_card_id);
    let second = engine.run().await.unwrap();

    assert_eq!(second.cards_created, 1);
    let new_card_id = db.get_task("1").unwrap().unwrap().card_id.unwrap();
    assert_ne!(new_card_id, old_card_id);
    assert!(board.card(&new_card_id).is_some());
}

#[tokio::test]
async fn collaborators_are_cached_with_derived_fields() {
    let db = setup_db();
    let source = FakeSource::with_tasks(vec![], vec![collaborator("29", "alice example")]);
    let board = FakeBoard::default();

    SyncEngine::new(&source, &board, &db, None)
        .run()
        .await
        .unwrap();

    let cached = db.get_collaborator("29").unwrap().unwrap();
    assert_eq!(cached.first_name, "Alice");
    assert_eq!(cached.hex_color, name_color("alice example"));
}
