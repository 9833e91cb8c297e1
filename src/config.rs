//! Environment-backed configuration.
//!
//! All configuration comes from environment variables, read and validated
//! once at startup. Missing required values fail the run before any
//! network or database work happens.

use crate::error::{SyncError, SyncResult};
use std::path::PathBuf;

/// Default cache database file, next to the working directory the
/// scheduler invokes us from.
pub const DEFAULT_DB_PATH: &str = "board-sync.db";

/// Frame title that signals completion when no override is configured.
pub const DEFAULT_DONE_FRAME: &str = "Done";

/// Fixed port for the OAuth redirect listener. Must match the redirect
/// URI registered on the Miro app.
pub const OAUTH_PORT: u16 = 9876;

/// Configuration for a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Todoist bearer API token.
    pub todoist_token: String,
    /// Miro OAuth access token.
    pub miro_token: String,
    /// Board all cards are created on.
    pub board_id: String,
    /// Optional Todoist project filter; also scopes the collaborator
    /// listing, which Todoist only exposes per project.
    pub project_id: Option<String>,
    /// Title of the frame whose cards mark tasks complete.
    pub done_frame: String,
    /// Path to the SQLite cache.
    pub db_path: PathBuf,
}

impl SyncConfig {
    /// Load from the process environment.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (injectable for tests).
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            todoist_token: required(&lookup, "TODOIST_API_TOKEN")?,
            miro_token: required(&lookup, "MIRO_ACCESS_TOKEN")?,
            board_id: required(&lookup, "MIRO_BOARD_ID")?,
            project_id: optional(&lookup, "TEAM_PROJECT_ID"),
            done_frame: optional(&lookup, "MIRO_DONE_FRAME")
                .unwrap_or_else(|| DEFAULT_DONE_FRAME.to_string()),
            db_path: optional(&lookup, "BOARD_SYNC_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
        })
    }
}

/// Configuration for the one-time OAuth code exchange.
#[derive(Debug, Clone)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub port: u16,
}

impl OauthConfig {
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            client_id: required(&lookup, "MIRO_CLIENT_ID")?,
            client_secret: required(&lookup, "MIRO_CLIENT_SECRET")?,
            port: OAUTH_PORT,
        })
    }

    /// Redirect URI the listener serves; must be registered on the app.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }
}

fn required<F>(lookup: &F, var: &str) -> SyncResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(SyncError::missing_env(var)),
    }
}

fn optional<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        vars(&[
            ("TODOIST_API_TOKEN", "td-token"),
            ("MIRO_ACCESS_TOKEN", "miro-token"),
            ("MIRO_BOARD_ID", "board-1"),
            ("TEAM_PROJECT_ID", "proj-9"),
        ])
    }

    #[test]
    fn loads_full_sync_config() {
        let env = full_env();
        let config = SyncConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.todoist_token, "td-token");
        assert_eq!(config.board_id, "board-1");
        assert_eq!(config.project_id.as_deref(), Some("proj-9"));
        assert_eq!(config.done_frame, DEFAULT_DONE_FRAME);
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
    }

    #[test]
    fn missing_required_var_fails_fast() {
        let mut env = full_env();
        env.remove("MIRO_BOARD_ID");
        let err = SyncConfig::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("MIRO_BOARD_ID"));
    }

    #[test]
    fn blank_required_var_counts_as_missing() {
        let mut env = full_env();
        env.insert("TODOIST_API_TOKEN".into(), "   ".into());
        assert!(SyncConfig::from_lookup(|k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn project_filter_is_optional() {
        let mut env = full_env();
        env.remove("TEAM_PROJECT_ID");
        let config = SyncConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert!(config.project_id.is_none());
    }

    #[test]
    fn done_frame_override_is_honored() {
        let mut env = full_env();
        env.insert("MIRO_DONE_FRAME".into(), "Shipped".into());
        let config = SyncConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.done_frame, "Shipped");
    }

    #[test]
    fn oauth_config_requires_client_credentials() {
        let env = vars(&[("MIRO_CLIENT_ID", "cid")]);
        assert!(OauthConfig::from_lookup(|k| env.get(k).cloned()).is_err());

        let env = vars(&[("MIRO_CLIENT_ID", "cid"), ("MIRO_CLIENT_SECRET", "cs")]);
        let config = OauthConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.redirect_uri(), "http://localhost:9876/callback");
    }
}
