use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use tracing::error;

use super::add_http_route;
use crate::error::Error;
use crate::mfa::{Authenticator, Provisioning};
use crate::store::{Account, ValidationAttempt};

type AppState = State<Arc<Authenticator>>;

/// HTTP surface over an [`Authenticator`]. Callers are expected to be authenticated upstream.
pub fn router(auth: Arc<Authenticator>) -> Router {
    let app = Router::new();
    let app = add_http_route(app, "/token/validate/{identity}/{token}", get(validate_token));
    let app = add_http_route(app, "/token/activate/{identity}/{token}", get(activate_token));
    let app = add_http_route(app, "/token/qrcode/{identity}", get(qr_code));
    let app = add_http_route(app, "/token/provision/{identity}", get(provision));
    let app = add_http_route(app, "/accounts", get(accounts));
    let app = add_http_route(app, "/accounts/{identity}", get(account));
    let app = add_http_route(app, "/accounts/{identity}/enable/{status}", get(enable_account));
    let app = add_http_route(app, "/audit", get(audit));
    let app = add_http_route(app, "/audit/{limit}", get(audit_with_limit));
    app.with_state(auth)
}

fn internal_error(err: Error) -> StatusCode {
    error!(error.kind = err.kind(), error.message = %err, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn validate_token(
    State(auth): AppState,
    Path((identity, token)): Path<(String, String)>,
) -> String {
    auth.validate_token(&identity, &token).await.to_string()
}

async fn activate_token(
    State(auth): AppState,
    Path((identity, token)): Path<(String, String)>,
) -> String {
    auth.activate_token(&identity, &token).await.to_string()
}

/// Base64 encoded PNG of the enrollment QR code.
async fn qr_code(
    State(auth): AppState,
    Path(identity): Path<String>,
) -> Result<String, StatusCode> {
    auth.provisioning_qr_code(&identity)
        .await
        .map_err(internal_error)
}

async fn provision(
    State(auth): AppState,
    Path(identity): Path<String>,
) -> Result<Json<Provisioning>, StatusCode> {
    auth.provision(&identity).await.map(Json).map_err(internal_error)
}

async fn accounts(State(auth): AppState) -> Result<Json<Vec<Account>>, StatusCode> {
    auth.accounts(None).await.map(Json).map_err(internal_error)
}

async fn account(
    State(auth): AppState,
    Path(identity): Path<String>,
) -> Result<Json<Account>, StatusCode> {
    match auth.account(&identity).await.map_err(internal_error)? {
        Some(account) => Ok(Json(account)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn enable_account(
    State(auth): AppState,
    Path((identity, status)): Path<(String, bool)>,
) -> Result<String, StatusCode> {
    let updated = auth
        .set_account_enabled(&identity, status)
        .await
        .map_err(internal_error)?;
    Ok(updated.to_string())
}

async fn audit(State(auth): AppState) -> Result<Json<Vec<ValidationAttempt>>, StatusCode> {
    auth.audit(None).await.map(Json).map_err(internal_error)
}

async fn audit_with_limit(
    State(auth): AppState,
    Path(limit): Path<usize>,
) -> Result<Json<Vec<ValidationAttempt>>, StatusCode> {
    auth.audit(Some(limit)).await.map(Json).map_err(internal_error)
}
