//! Core types shared between the API clients, the cache, and the sync pass.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A task as reported by the source task system.
///
/// Todoist owns these; the local cache only mirrors the last state this
/// tool observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub project_id: Option<String>,
    pub assignee_id: Option<String>,
    pub completed: bool,
    /// Todoist priority, 1 (normal) to 4 (urgent).
    pub priority: i32,
    pub due_date: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<String>,
}

/// A person who can be assigned to tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// A card as the board reports it.
///
/// The board does not know which task a card mirrors; that link lives in
/// the local cache (`card_id` on the task row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub title: Option<String>,
}

/// Result of pushing a task to the board.
#[derive(Debug, Clone)]
pub struct CardUpsert {
    pub card: Card,
    /// True when a new card was created, false when an existing one was
    /// updated in place.
    pub created: bool,
}

/// A task row as stored in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTask {
    #[serde(flatten)]
    pub task: Task,
    /// Board card this task was last pushed to, if any.
    pub card_id: Option<String>,
    pub first_seen_at: i64,
    pub updated_at: i64,
}

/// A collaborator row as stored in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedCollaborator {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub first_name: String,
    pub hex_color: String,
    pub updated_at: i64,
}

/// Where a newly created card lands on the board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardPosition {
    pub x: f64,
    pub y: f64,
}

/// Card geometry and grid spacing for newly created cards.
pub const CARD_WIDTH: f64 = 300.0;
pub const CARD_HEIGHT: f64 = 100.0;
const CARDS_PER_COLUMN: usize = 15;
const H_SPACING: f64 = 10.0;
const V_SPACING: f64 = 10.0;

impl CardPosition {
    /// Grid slot for the n-th card: columns of 15 cards, filled top to
    /// bottom, left to right.
    pub fn grid(index: usize) -> Self {
        let column = index / CARDS_PER_COLUMN;
        let row = index % CARDS_PER_COLUMN;
        Self {
            x: column as f64 * (CARD_WIDTH + H_SPACING),
            y: row as f64 * (CARD_HEIGHT + V_SPACING),
        }
    }
}

/// Extract a capitalized first name from a full display name.
///
/// Splits on spaces and dots ("jane.doe" and "Jane Doe" both yield "Jane").
pub fn first_name(full_name: &str) -> String {
    let head = full_name
        .split([' ', '.'])
        .find(|part| !part.is_empty())
        .unwrap_or(full_name)
        .trim();
    let mut chars = head.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Derive a stable hex color from a display name.
///
/// The same name always hashes to the same color, so a collaborator's
/// cards keep their theme across runs and machines.
pub fn name_color(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    format!("#{}", hex::encode(&digest[..3]))
}
