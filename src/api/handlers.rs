//! REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::types::{
    AccountResponse, AccountsResponse, ClientVersionRequest, ConfigResponse, ErrorResponse,
    RefreshResponse, SetActiveRequest, SubmitCodeRequest,
};
use crate::cache::ConfigCache;
use crate::error::{BrokerError, FetchError};
use crate::multifactor::ChallengeView;
use crate::registry::SessionRegistry;
use crate::security::ApiKeyStore;
use crate::session::{AccountId, ChallengeId, Credentials, Region};

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub configs: Arc<ConfigCache>,
    pub keys: Arc<ApiKeyStore>,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>, configs: Arc<ConfigCache>) -> Self {
        Self {
            registry,
            configs,
            keys: Arc::new(ApiKeyStore::default()),
        }
    }

    pub fn with_keys(mut self, keys: Arc<ApiKeyStore>) -> Self {
        self.keys = keys;
        self
    }
}

fn broker_error(err: BrokerError) -> ApiError {
    let (status, body) = ErrorResponse::from_broker(&err);
    if err.is_cancellation() {
        tracing::debug!("request ended by cancelled multifactor prompt");
    } else if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
    } else {
        tracing::debug!(error = %err, "request rejected");
    }
    (status, Json(body))
}

fn parse_account_id(raw: &str) -> ApiResult<AccountId> {
    AccountId::new(raw).map_err(broker_error)
}

fn parse_region(raw: &str) -> ApiResult<Region> {
    Region::new(raw).map_err(broker_error)
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "account-broker",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Stored and active accounts.
pub async fn list_accounts(State(state): State<AppState>) -> Json<AccountsResponse> {
    let registry = &state.registry;
    Json(AccountsResponse {
        stored: registry.stored_accounts(),
        active: registry.active_id(),
        requires_action: registry.requires_action(),
        load_error: registry.load_error(),
        client_version: registry.client_version(),
    })
}

/// Log in and activate a new account.
///
/// Stays pending while a multifactor prompt waits for an answer.
pub async fn add_account(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    if credentials.username.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("username must not be empty")),
        ));
    }

    let record = state
        .registry
        .add_account(credentials)
        .await
        .map_err(broker_error)?;
    let body = AccountResponse::from_record(&record).map_err(broker_error)?;

    Ok((StatusCode::CREATED, Json(body)))
}

/// Forget all stored accounts.
pub async fn clear_accounts(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.registry.clear().await.map_err(broker_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Make an account active.
pub async fn set_active(
    State(state): State<AppState>,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<Json<AccountsResponse>> {
    state
        .registry
        .set_active(&req.account_id)
        .await
        .map_err(broker_error)?;
    Ok(list_accounts(State(state)).await)
}

/// Toggle whether an account is active.
pub async fn toggle_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AccountsResponse>> {
    let id = parse_account_id(&id)?;
    state
        .registry
        .toggle_active(&id)
        .await
        .map_err(broker_error)?;
    Ok(list_accounts(State(state)).await)
}

/// Change the client version sent with remote requests.
pub async fn set_client_version(
    State(state): State<AppState>,
    Json(req): Json<ClientVersionRequest>,
) -> ApiResult<StatusCode> {
    if req.version.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("version must not be empty")),
        ));
    }
    state
        .registry
        .set_client_version(req.version)
        .await
        .map_err(broker_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// The pending multifactor prompt.
pub async fn current_prompt(State(state): State<AppState>) -> ApiResult<Json<ChallengeView>> {
    state
        .registry
        .prompts()
        .current()
        .map(|challenge| Json(challenge.view()))
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::not_found("Multifactor prompt")),
            )
        })
}

/// Answer the pending multifactor prompt.
pub async fn submit_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitCodeRequest>,
) -> ApiResult<StatusCode> {
    let id: ChallengeId = id.parse().map_err(broker_error)?;
    state
        .registry
        .prompts()
        .submit(id, req.code)
        .map_err(broker_error)?;
    Ok(StatusCode::ACCEPTED)
}

/// Dismiss the pending multifactor prompt.
pub async fn cancel_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id: ChallengeId = id.parse().map_err(broker_error)?;
    state.registry.prompts().cancel(id).map_err(broker_error)?;
    Ok(StatusCode::ACCEPTED)
}

/// Cached config for a region.
pub async fn get_config(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> ApiResult<Json<ConfigResponse>> {
    let region = parse_region(&region)?;
    let entry = state
        .configs
        .entry(&region)
        .ok_or_else(|| broker_error(FetchError::NoConfig(region.clone()).into()))?;
    Ok(Json(ConfigResponse::new(region, entry)))
}

/// Refresh a region's config through the active account.
pub async fn refresh_config(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> ApiResult<Json<RefreshResponse>> {
    let region = parse_region(&region)?;
    let record = state
        .registry
        .active()
        .ok_or_else(|| broker_error(BrokerError::NoActiveAccount))?;

    let client = record.client();
    let outcome = state.configs.auto_update(&region, client.as_ref()).await;
    let last_update = state.configs.entry(&region).map(|entry| entry.last_update);

    Ok(Json(RefreshResponse {
        region,
        outcome,
        last_update,
    }))
}
