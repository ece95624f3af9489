//! Web shell: a small chat UI plus JSON endpoints over the agent and the
//! token manager. The OAuth redirect lands here too, so the browser consent
//! flow completes without copy-pasting when the gateway is running.

use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::{Query, State},
        http::StatusCode,
        response::{Html, IntoResponse, Json, Redirect},
        routing::{get, post},
    },
    serde::Deserialize,
    tokio::sync::Mutex,
    tower_http::cors::{Any, CorsLayer},
    tracing::{info, warn},
};

use {
    crmlink_agents::{
        GeminiProvider, LlmProvider, ToolRegistry,
        mcp_tools::register_mcp_tools,
        refine_prompt,
        runner::{DEFAULT_SYSTEM_PROMPT, run_agent_loop},
    },
    crmlink_config::Settings,
    crmlink_mcp::McpClient,
    crmlink_oauth::TokenManager,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    provider: Arc<dyn LlmProvider>,
    /// Absent when OAuth credentials are not configured; the agent then runs
    /// without bearer authentication.
    manager: Option<Arc<Mutex<TokenManager>>>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        provider: Arc<dyn LlmProvider>,
        manager: Option<TokenManager>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            provider,
            manager: manager.map(|m| Arc::new(Mutex::new(m))),
        }
    }
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/auth/status", get(auth_status_handler))
        .route("/api/chat", post(chat_handler))
        .route("/oauth/callback", get(oauth_callback_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn start_gateway(settings: Settings, bind: &str, port: u16) -> anyhow::Result<()> {
    settings.validate()?;

    let api_key = settings
        .google_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GOOGLE_API_KEY is required"))?;
    let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(api_key));
    let manager = settings.oauth_config().map(TokenManager::new);

    let oauth_configured = manager.is_some();
    let state = AppState::new(settings, provider, manager);
    let app = build_app(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        oauth = oauth_configured,
        "crmlink gateway listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn auth_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let Some(manager) = &state.manager else {
        return Json(serde_json::json!({
            "configured": false,
            "authenticated": false,
        }));
    };

    let mut manager = manager.lock().await;
    match manager.is_authenticated().await {
        Ok(true) => Json(serde_json::json!({
            "configured": true,
            "authenticated": true,
        })),
        Ok(false) => Json(serde_json::json!({
            "configured": true,
            "authenticated": false,
            "auth_url": manager.authorization_url(),
        })),
        Err(e) => Json(serde_json::json!({
            "configured": true,
            "authenticated": false,
            "error": e.to_string(),
        })),
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

/// OAuth redirect target: exchanges the `code` query parameter and bounces
/// back to the chat page.
async fn oauth_callback_handler(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, (StatusCode, String)> {
    let Some(manager) = &state.manager else {
        return Err((
            StatusCode::BAD_REQUEST,
            "OAuth is not configured; set ZOHO_CLIENT_ID and ZOHO_CLIENT_SECRET".into(),
        ));
    };

    if let Some(error) = query.error {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("authorization server reported: {error}"),
        ));
    }
    let Some(code) = query.code else {
        return Err((
            StatusCode::BAD_REQUEST,
            "missing 'code' query parameter".into(),
        ));
    };

    let mut manager = manager.lock().await;
    match manager.exchange_code(&code).await {
        Ok(record) => {
            info!(
                expires_in = record.expires_in,
                has_refresh_token = record.refresh_token.is_some(),
                "authorization code exchanged"
            );
            Ok(Redirect::to("/"))
        },
        Err(e) => Err((
            StatusCode::BAD_GATEWAY,
            format!("failed to exchange authorization code: {e}"),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    if request.message.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "empty message".into()));
    }

    let Some(mcp_url) = state.settings.mcp_url.clone() else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "ZOHO_MCP_URL is not set".into()));
    };

    // Connect per request so each conversation sees a current bearer token.
    let bearer = bearer_token(&state).await;
    let mut client = McpClient::connect("zoho_crm", &mcp_url, bearer)
        .await
        .map_err(internal)?;
    client.list_tools().await.map_err(internal)?;
    let client = Arc::new(client);

    let mut tools = ToolRegistry::new();
    register_mcp_tools(&mut tools, &client);

    let refined = refine_prompt(state.provider.as_ref(), &request.message)
        .await
        .map_err(internal)?;

    let result = run_agent_loop(
        Arc::clone(&state.provider),
        &tools,
        DEFAULT_SYSTEM_PROMPT,
        &refined,
        None,
    )
    .await
    .map_err(internal)?;

    Ok(Json(serde_json::json!({
        "reply": result.text,
        "refined_prompt": refined,
        "iterations": result.iterations,
        "tool_calls": result.tool_calls_made,
    })))
}

/// A current access token, or `None` to proceed without bearer auth,
/// matching the CLI's behavior when OAuth is unconfigured or unavailable.
async fn bearer_token(state: &AppState) -> Option<String> {
    let manager = state.manager.as_ref()?;
    match manager.lock().await.access_token().await {
        Ok(token) => Some(token),
        Err(e) => {
            warn!(error = %e, "could not get access token, continuing without bearer auth");
            None
        },
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
