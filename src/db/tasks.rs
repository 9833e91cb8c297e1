//! Task cache reads and writes.

use super::{Database, now_ms};
use crate::types::{CachedTask, Task};
use anyhow::Result;
use rusqlite::{Row, params};
use std::collections::HashSet;

pub fn parse_task_row(row: &Row) -> rusqlite::Result<CachedTask> {
    let id: String = row.get("id")?;
    let title: String = row.get("title")?;
    let description: Option<String> = row.get("description")?;
    let project_id: Option<String> = row.get("project_id")?;
    let assignee_id: Option<String> = row.get("assignee_id")?;
    let completed: bool = row.get("completed")?;
    let priority: i32 = row.get("priority")?;
    let due_date: Option<String> = row.get("due_date")?;
    let url: Option<String> = row.get("url")?;
    let created_at: Option<String> = row.get("source_created_at")?;
    let card_id: Option<String> = row.get("card_id")?;
    let first_seen_at: i64 = row.get("first_seen_at")?;
    let updated_at: i64 = row.get("updated_at")?;

    Ok(CachedTask {
        task: Task {
            id,
            title,
            description,
            project_id,
            assignee_id,
            completed,
            priority,
            due_date,
            url,
            created_at,
        },
        card_id,
        first_seen_at,
        updated_at,
    })
}

impl Database {
    /// Persist the current state of a task along with the card it was
    /// pushed to. Inserts on first sight, overwrites on every later run;
    /// `first_seen_at` survives updates, and `completed` never goes back
    /// to false once set (it guards against duplicate completion calls).
    pub fn save_task(&self, task: &Task, card_id: Option<&str>) -> Result<()> {
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (
                    id, title, description, project_id, assignee_id,
                    completed, priority, due_date, url, source_created_at,
                    card_id, first_seen_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    project_id = excluded.project_id,
                    assignee_id = excluded.assignee_id,
                    completed = MAX(tasks.completed, excluded.completed),
                    priority = excluded.priority,
                    due_date = excluded.due_date,
                    url = excluded.url,
                    source_created_at = excluded.source_created_at,
                    card_id = excluded.card_id,
                    updated_at = excluded.updated_at",
                params![
                    task.id,
                    task.title,
                    task.description,
                    task.project_id,
                    task.assignee_id,
                    task.completed,
                    task.priority,
                    task.due_date,
                    task.url,
                    task.created_at,
                    card_id,
                    now,
                    now,
                ],
            )?;
            Ok(())
        })
    }

    /// Last-known state of a task, if the cache has seen it.
    pub fn get_task(&self, task_id: &str) -> Result<Option<CachedTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
            match stmt.query_row(params![task_id], parse_task_row) {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// The task a board card mirrors, resolved through the stored link.
    pub fn task_for_card(&self, card_id: &str) -> Result<Option<CachedTask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM tasks WHERE card_id = ?1")?;
            match stmt.query_row(params![card_id], parse_task_row) {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Ids of all tasks the cache has ever seen.
    pub fn all_task_ids(&self) -> Result<HashSet<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM tasks")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Flag a task completed. Returns false when the cache has no such
    /// task.
    pub fn mark_completed(&self, task_id: &str) -> Result<bool> {
        let now = now_ms();
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET completed = 1, updated_at = ?1 WHERE id = ?2",
                params![now, task_id],
            )?;
            Ok(changed > 0)
        })
    }
}
