//! Todoist REST v2 adapter.

use super::{TaskSource, check_status};
use crate::error::{SyncError, SyncResult};
use crate::types::{Collaborator, Task};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "todoist";
const API_BASE: &str = "https://api.todoist.com/rest/v2";

pub struct TodoistClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl TodoistClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root (tests).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TaskSource for TodoistClient {
    async fn list_tasks(&self, project_id: Option<&str>) -> SyncResult<Vec<Task>> {
        let url = format!("{}/tasks", self.base_url);
        let mut req = self.http.get(&url).bearer_auth(&self.token);
        if let Some(project_id) = project_id {
            req = req.query(&[("project_id", project_id)]);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        let tasks: Vec<TodoistTask> = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        Ok(tasks.into_iter().map(Task::from).collect())
    }

    async fn list_collaborators(&self, project_id: Option<&str>) -> SyncResult<Vec<Collaborator>> {
        // Todoist only exposes collaborators per project.
        let Some(project_id) = project_id else {
            debug!("no project configured, skipping collaborator fetch");
            return Ok(Vec::new());
        };
        let url = format!("{}/projects/{}/collaborators", self.base_url, project_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        let collaborators: Vec<TodoistCollaborator> = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        Ok(collaborators
            .into_iter()
            .map(Collaborator::from)
            .collect())
    }

    async fn complete_task(&self, task_id: &str) -> SyncResult<()> {
        let url = format!("{}/tasks/{}/close", self.base_url, task_id);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        if resp.status().as_u16() == 404 {
            return Err(SyncError::task_not_found(task_id));
        }
        check_status(SERVICE, resp).await?;
        Ok(())
    }
}

// Wire types (deserialize responses).

#[derive(Debug, Deserialize)]
struct TodoistDue {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TodoistTask {
    id: String,
    content: String,
    #[serde(default)]
    description: String,
    project_id: Option<String>,
    assignee_id: Option<String>,
    #[serde(default)]
    is_completed: bool,
    #[serde(default = "default_priority")]
    priority: i32,
    due: Option<TodoistDue>,
    url: Option<String>,
    created_at: Option<String>,
}

fn default_priority() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct TodoistCollaborator {
    id: String,
    name: String,
    email: Option<String>,
}

impl From<TodoistTask> for Task {
    fn from(t: TodoistTask) -> Self {
        Task {
            id: t.id,
            title: t.content,
            description: if t.description.is_empty() {
                None
            } else {
                Some(t.description)
            },
            project_id: t.project_id,
            assignee_id: t.assignee_id,
            completed: t.is_completed,
            priority: t.priority,
            due_date: t.due.and_then(|d| d.date),
            url: t.url,
            created_at: t.created_at,
        }
    }
}

impl From<TodoistCollaborator> for Collaborator {
    fn from(c: TodoistCollaborator) -> Self {
        Collaborator {
            id: c.id,
            name: c.name,
            email: c.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_maps_into_domain_type() {
        let wire: TodoistTask = serde_json::from_value(json!({
            "id": "7025",
            "content": "Write report",
            "description": "",
            "project_id": "2203",
            "assignee_id": "29",
            "is_completed": false,
            "priority": 3,
            "due": { "date": "2026-08-10", "string": "next Monday" },
            "url": "https://todoist.com/showTask?id=7025",
            "created_at": "2026-08-01T09:00:00.000000Z",
            "labels": ["board"]
        }))
        .unwrap();

        let task = Task::from(wire);
        assert_eq!(task.id, "7025");
        assert_eq!(task.title, "Write report");
        assert!(task.description.is_none());
        assert_eq!(task.assignee_id.as_deref(), Some("29"));
        assert_eq!(task.due_date.as_deref(), Some("2026-08-10"));
        assert_eq!(task.priority, 3);
        assert!(!task.completed);
    }

    #[test]
    fn missing_optional_fields_get_defaults() {
        let wire: TodoistTask = serde_json::from_value(json!({
            "id": "1",
            "content": "Bare task"
        }))
        .unwrap();

        let task = Task::from(wire);
        assert_eq!(task.priority, 1);
        assert!(task.due_date.is_none());
        assert!(!task.completed);
    }
}
