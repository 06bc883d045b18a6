use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use super::{actor, admin, call, reply, ApiResult, Channels};
use crate::models::users::{LoginRequest, RegisterUser, UserPatch};
use crate::services::users::UserRequest;
use crate::services::ServiceError;

pub async fn register(
    State(channels): State<Channels>,
    Json(request): Json<RegisterUser>,
) -> ApiResult {
    let user = call(&channels.users, |response| UserRequest::Register {
        request,
        response,
    })
    .await?;

    reply(StatusCode::CREATED, user)
}

pub async fn login(
    State(channels): State<Channels>,
    Json(request): Json<LoginRequest>,
) -> ApiResult {
    let user = call(&channels.users, |response| UserRequest::Login { request, response }).await?;

    reply(StatusCode::OK, user)
}

pub async fn me(State(channels): State<Channels>, headers: HeaderMap) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    reply(StatusCode::OK, user)
}

pub async fn downline(State(channels): State<Channels>, headers: HeaderMap) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let downline = call(&channels.users, |response| UserRequest::Downline {
        id: user.id,
        response,
    })
    .await?;

    reply(StatusCode::OK, downline)
}

pub async fn list_users(State(channels): State<Channels>, headers: HeaderMap) -> ApiResult {
    admin(&channels, &headers).await?;
    let users = call(&channels.users, |response| UserRequest::ListUsers { response }).await?;

    reply(StatusCode::OK, users)
}

pub async fn update_user(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> ApiResult {
    admin(&channels, &headers).await?;
    let user = call(&channels.users, |response| UserRequest::UpdateUser {
        id,
        patch,
        response,
    })
    .await?;

    reply(StatusCode::OK, user)
}

pub async fn delete_user(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    let caller = admin(&channels, &headers).await?;
    if caller.id == id {
        return Err(ServiceError::Conflict(
            "Admins cannot delete their own account.".to_string(),
        ));
    }

    call(&channels.users, |response| UserRequest::DeleteUser { id, response }).await?;

    Ok(StatusCode::NO_CONTENT)
}
