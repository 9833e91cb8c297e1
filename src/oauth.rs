//! One-time OAuth code exchange for the board access token.
//!
//! Serves a single redirect-callback route on a fixed local port,
//! exchanges the authorization code at Miro's token endpoint, and renders
//! the access token for manual copy into configuration. Stateless across
//! runs and not part of the recurring sync.

use crate::config::OauthConfig;
use crate::error::{SyncError, SyncResult};
use anyhow::Result;
use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const AUTHORIZE_URL: &str = "https://miro.com/oauth/authorize";
const TOKEN_URL: &str = "https://api.miro.com/v1/oauth/token";

struct OauthState {
    config: OauthConfig,
    http: reqwest::Client,
    token_url: String,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Authorization URL the operator opens to start the flow.
pub fn authorize_url(config: &OauthConfig) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}",
        AUTHORIZE_URL,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.redirect_uri()),
    )
}

/// Run the redirect listener until interrupted.
pub async fn run(config: OauthConfig) -> Result<()> {
    let port = config.port;
    info!("Open this URL to authorize the app:");
    info!("  {}", authorize_url(&config));

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let state = Arc::new(OauthState {
        config,
        http,
        token_url: TOKEN_URL.to_string(),
    });

    let app = Router::new()
        .route("/callback", get(callback))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("OAuth listener on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn callback(
    State(state): State<Arc<OauthState>>,
    Query(query): Query<CallbackQuery>,
) -> Html<String> {
    if let Some(err) = query.error {
        error!(error = %err, "authorization was denied");
        return Html(format!("<h1>Authorization failed</h1><p>{}</p>", err));
    }
    let Some(code) = query.code else {
        return Html(
            "<h1>Missing code</h1><p>The redirect did not carry a <code>?code</code> parameter.</p>"
                .to_string(),
        );
    };
    match exchange_code(&state, &code).await {
        Ok(token) => {
            info!("access token obtained, copy it into MIRO_ACCESS_TOKEN");
            Html(format!(
                "<h1>Access token</h1>\
                 <p>Set <code>MIRO_ACCESS_TOKEN</code> to:</p>\
                 <pre>{}</pre>\
                 <p>You can close this window and stop the listener.</p>",
                token.access_token
            ))
        }
        Err(err) => {
            error!(%err, "token exchange failed");
            Html(format!("<h1>Token exchange failed</h1><p>{}</p>", err))
        }
    }
}

async fn exchange_code(state: &OauthState, code: &str) -> SyncResult<TokenResponse> {
    let resp = state
        .http
        .post(&state.token_url)
        .query(&[
            ("grant_type", "authorization_code"),
            ("client_id", state.config.client_id.as_str()),
            ("client_secret", state.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", &state.config.redirect_uri()),
        ])
        .send()
        .await
        .map_err(|e| SyncError::transport("miro", e))?;
    crate::api::check_status("miro", resp)
        .await?
        .json()
        .await
        .map_err(|e| SyncError::transport("miro", e))
}
