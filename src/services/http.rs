use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::catalog::CatalogRequest;
use super::earnings::EarningRequest;
use super::ledger::LedgerRequest;
use super::users::UserRequest;
use super::wallet::WalletRequest;
use super::ServiceError;
use crate::models::users::User;

mod admin;
mod earnings;
mod users;
mod wallet;

/// Header carrying the id of the calling user. It is trusted as is: the
/// fronting gateway must authenticate the caller and overwrite any value the
/// client sent. Responses never expose other users' ids.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct Channels {
    pub users: mpsc::Sender<UserRequest>,
    pub ledger: mpsc::Sender<LedgerRequest>,
    pub wallet: mpsc::Sender<WalletRequest>,
    pub earnings: mpsc::Sender<EarningRequest>,
    pub catalog: mpsc::Sender<CatalogRequest>,
}

type ApiResult = Result<(StatusCode, Json<Value>), ServiceError>;

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Validation failed"),
            ServiceError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            ServiceError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ServiceError::Internal(_)
            | ServiceError::Repository(_, _)
            | ServiceError::Communication(_, _) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (
            status,
            Json(json!({
                "error": error,
                "details": self.to_string()
            })),
        )
            .into_response()
    }
}

fn reply<T: Serialize>(status: StatusCode, value: T) -> ApiResult {
    let body = serde_json::to_value(value).map_err(|e| ServiceError::Internal(e.to_string()))?;
    Ok((status, Json(body)))
}

/// Sends one request to a service and waits for its reply.
async fn call<R, T>(
    channel: &mpsc::Sender<R>,
    request: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ServiceError::Communication("HTTP".to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication("HTTP".to_string(), e.to_string()))?
}

/// Resolves the caller from `x-user-id`. Unknown and blocked users are
/// unauthorized.
async fn actor(channels: &Channels, headers: &HeaderMap) -> Result<User, ServiceError> {
    let id = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized(format!("Missing {} header.", USER_HEADER)))?
        .to_string();

    let user = call(&channels.users, |response| UserRequest::GetUser { id, response })
        .await
        .map_err(|e| match e {
            ServiceError::NotFound(_) => ServiceError::Unauthorized("Unknown user.".to_string()),
            other => other,
        })?;

    if user.is_blocked {
        return Err(ServiceError::Unauthorized("Account blocked".to_string()));
    }
    Ok(user)
}

async fn admin(channels: &Channels, headers: &HeaderMap) -> Result<User, ServiceError> {
    let user = actor(channels, headers).await?;
    if !user.is_admin() {
        log::warn!("Non-admin {} called an admin route.", user.id);
        return Err(ServiceError::Unauthorized("Admin only.".to_string()));
    }
    Ok(user)
}

pub fn router(channels: Channels) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/auth/register", post(users::register))
        .route("/auth/login", post(users::login))
        .route("/me", get(users::me))
        .route("/me/downline", get(users::downline))
        .route("/me/wallets", get(wallet::wallets))
        .route("/me/stats", get(wallet::stats))
        .route("/me/transactions", get(wallet::history))
        .route("/wallet/deposit", post(wallet::deposit))
        .route("/wallet/withdraw", post(wallet::withdraw))
        .route("/wallet/transfer", post(wallet::transfer))
        .route("/wallet/premium", post(wallet::premium))
        .route("/earnings/tasks/{id}", post(earnings::submit_task_proof))
        .route("/earnings/typing/{id}", post(earnings::complete_typing_job))
        .route("/earnings/quiz/{id}", post(earnings::answer_quiz))
        .route("/earnings/salary/{id}", post(earnings::claim_salary))
        .route("/packages/quiz/{id}", post(earnings::buy_quiz_package))
        .route("/account-sales", post(earnings::submit_account_sale))
        .route("/account-sales/{id}/{step}", post(earnings::negotiate))
        .route("/admin/transactions", get(admin::list_transactions))
        .route("/admin/transactions/{id}/settle", post(admin::settle))
        .route("/admin/users", get(users::list_users))
        .route(
            "/admin/users/{id}",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/admin/dashboard", get(admin::dashboard))
        .route(
            "/admin/settings",
            get(admin::get_settings).put(admin::save_settings),
        )
        .route(
            "/catalog/{kind}",
            get(admin::list_catalog).post(admin::insert_catalog),
        )
        .route("/catalog/{kind}/{id}", delete(admin::delete_catalog))
        .with_state(channels)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(channels: Channels, listen: &str) -> Result<(), anyhow::Error> {
    let app = router(channels);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
