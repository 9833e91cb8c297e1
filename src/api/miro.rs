//! Miro REST v2 adapter.

use super::{Board, check_status};
use crate::error::{SyncError, SyncResult};
use crate::types::{CARD_HEIGHT, CARD_WIDTH, Card, CardPosition, CardUpsert, Task};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "miro";
const API_BASE: &str = "https://api.miro.com/v2";

/// Miro caps item listings at 50 per page; pages are chained by cursor.
const PAGE_LIMIT: &str = "50";

pub struct MiroClient {
    http: reqwest::Client,
    token: String,
    board_id: String,
    done_frame: String,
    base_url: String,
}

impl MiroClient {
    pub fn new(
        token: impl Into<String>,
        board_id: impl Into<String>,
        done_frame: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            board_id: board_id.into(),
            done_frame: done_frame.into(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root (tests).
    #[allow(dead_code)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn board_url(&self, suffix: &str) -> String {
        format!("{}/boards/{}{}", self.base_url, self.board_id, suffix)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> SyncResult<T> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))
    }

    /// Walk an item listing to the end, following cursors.
    async fn list_items(&self, base_query: &[(&str, &str)]) -> SyncResult<Vec<Item>> {
        let url = self.board_url("/items");
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query: Vec<(&str, &str)> = base_query.to_vec();
            query.push(("limit", PAGE_LIMIT));
            if let Some(ref c) = cursor {
                query.push(("cursor", c.as_str()));
            }
            let page: ItemPage = self.get_json(&url, &query).await?;
            items.extend(page.data);
            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }
        Ok(items)
    }

    /// Id of the frame whose title matches the configured Done frame.
    async fn find_done_frame(&self) -> SyncResult<Option<String>> {
        let frames = self.list_items(&[("type", "frame")]).await?;
        Ok(frames
            .into_iter()
            .find(|frame| frame.data.title.as_deref() == Some(self.done_frame.as_str()))
            .map(|frame| frame.id))
    }

    async fn create_card(
        &self,
        task: &Task,
        theme: Option<&str>,
        position: CardPosition,
    ) -> SyncResult<Card> {
        let url = self.board_url("/cards");
        let payload = card_payload(task, theme, Some(position));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        let item: Item = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        Ok(Card {
            id: item.id,
            title: item.data.title,
        })
    }

    async fn update_card(
        &self,
        card_id: &str,
        task: &Task,
        theme: Option<&str>,
    ) -> SyncResult<Card> {
        let url = self.board_url(&format!("/cards/{}", card_id));
        // No position on update: a card someone dragged into the Done
        // frame must stay there.
        let payload = card_payload(task, theme, None);
        let resp = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        if resp.status().as_u16() == 404 {
            return Err(SyncError::card_not_found(card_id));
        }
        let item: Item = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        Ok(Card {
            id: item.id,
            title: item.data.title,
        })
    }

    /// Board tag id for `title`, creating the tag when the board has none.
    async fn ensure_tag(&self, title: &str) -> SyncResult<String> {
        let url = self.board_url("/tags");
        let mut cursor: Option<String> = None;
        loop {
            let mut query: Vec<(&str, &str)> = vec![("limit", PAGE_LIMIT)];
            if let Some(ref c) = cursor {
                query.push(("cursor", c.as_str()));
            }
            let page: TagPage = self.get_json(&url, &query).await?;
            if let Some(tag) = page.data.into_iter().find(|tag| tag.title == title) {
                return Ok(tag.id);
            }
            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        debug!(tag = %title, "creating board tag");
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "title": title }))
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        let tag: Tag = check_status(SERVICE, resp)
            .await?
            .json()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        Ok(tag.id)
    }

    async fn item_has_tag(&self, item_id: &str, tag_id: &str) -> SyncResult<bool> {
        let url = self.board_url(&format!("/items/{}/tags", item_id));
        let attached: ItemTags = self.get_json(&url, &[]).await?;
        Ok(attached.tags.iter().any(|tag| tag.id == tag_id))
    }
}

#[async_trait]
impl Board for MiroClient {
    async fn upsert_card(
        &self,
        task: &Task,
        theme: Option<&str>,
        known_card_id: Option<&str>,
        position: CardPosition,
    ) -> SyncResult<CardUpsert> {
        if let Some(card_id) = known_card_id {
            match self.update_card(card_id, task, theme).await {
                Ok(card) => {
                    return Ok(CardUpsert {
                        card,
                        created: false,
                    });
                }
                Err(err) if err.is_not_found() => {
                    // The board is authoritative: the linked card was
                    // deleted there, so recreate it.
                    warn!(card_id = %card_id, task_id = %task.id, "linked card gone from board, recreating");
                }
                Err(err) => return Err(err),
            }
        }
        let card = self.create_card(task, theme, position).await?;
        Ok(CardUpsert {
            card,
            created: true,
        })
    }

    async fn list_done_cards(&self) -> SyncResult<Vec<Card>> {
        let Some(frame_id) = self.find_done_frame().await? else {
            warn!(frame = %self.done_frame, "board has no frame with this title, nothing to reconcile");
            return Ok(Vec::new());
        };
        let items = self
            .list_items(&[("parent_item_id", frame_id.as_str()), ("type", "card")])
            .await?;
        Ok(items
            .into_iter()
            .map(|item| Card {
                id: item.id,
                title: item.data.title,
            })
            .collect())
    }

    async fn tag_card(&self, card_id: &str, tag: &str) -> SyncResult<()> {
        let tag_id = self.ensure_tag(tag).await?;
        if self.item_has_tag(card_id, &tag_id).await? {
            return Ok(());
        }
        let url = self.board_url(&format!("/items/{}", card_id));
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .query(&[("tag_id", tag_id.as_str())])
            .send()
            .await
            .map_err(|e| SyncError::transport(SERVICE, e))?;
        check_status(SERVICE, resp).await?;
        Ok(())
    }
}

/// Request body for card create/update. Position and geometry are only
/// sent at creation.
fn card_payload(task: &Task, theme: Option<&str>, position: Option<CardPosition>) -> Value {
    let mut payload = json!({
        "data": {
            "title": task.title,
            "description": task.description.clone().unwrap_or_default(),
        },
    });
    if let Some(theme) = theme {
        payload["style"] = json!({ "cardTheme": theme });
    }
    if let Some(position) = position {
        payload["position"] = json!({ "x": position.x, "y": position.y });
        payload["geometry"] = json!({ "width": CARD_WIDTH, "height": CARD_HEIGHT });
    }
    payload
}

// Wire types (deserialize responses).

#[derive(Debug, Deserialize)]
struct ItemPage {
    #[serde(default)]
    data: Vec<Item>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    id: String,
    #[serde(default)]
    data: ItemData,
}

#[derive(Debug, Default, Deserialize)]
struct ItemData {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagPage {
    #[serde(default)]
    data: Vec<Tag>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ItemTags {
    #[serde(default)]
    tags: Vec<Tag>,
}
