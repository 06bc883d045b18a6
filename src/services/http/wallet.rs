use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use super::{actor, call, reply, ApiResult, Channels};
use crate::models::transactions::{
    DepositRequest, PremiumRequest, TransferRequest, WithdrawRequest,
};
use crate::services::wallet::WalletRequest;

pub async fn deposit(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Json(request): Json<DepositRequest>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let pending = call(&channels.wallet, |response| WalletRequest::Deposit {
        user_id: user.id,
        request,
        response,
    })
    .await?;

    reply(StatusCode::CREATED, pending)
}

pub async fn withdraw(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Json(request): Json<WithdrawRequest>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transaction = call(&channels.wallet, |response| WalletRequest::Withdraw {
        user_id: user.id,
        request,
        response,
    })
    .await?;

    reply(StatusCode::CREATED, transaction)
}

pub async fn transfer(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Json(request): Json<TransferRequest>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transaction = call(&channels.wallet, |response| WalletRequest::Transfer {
        user_id: user.id,
        request,
        response,
    })
    .await?;

    reply(StatusCode::CREATED, transaction)
}

pub async fn premium(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Json(request): Json<PremiumRequest>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let pending = call(&channels.wallet, |response| WalletRequest::Premium {
        user_id: user.id,
        request,
        response,
    })
    .await?;

    reply(StatusCode::CREATED, pending)
}

pub async fn wallets(State(channels): State<Channels>, headers: HeaderMap) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let wallets = call(&channels.wallet, |response| WalletRequest::Wallets {
        user_id: user.id,
        response,
    })
    .await?;

    reply(StatusCode::OK, wallets)
}

pub async fn stats(State(channels): State<Channels>, headers: HeaderMap) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let stats = call(&channels.wallet, |response| WalletRequest::Stats {
        user_id: user.id,
        response,
    })
    .await?;

    reply(StatusCode::OK, stats)
}

pub async fn history(State(channels): State<Channels>, headers: HeaderMap) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transactions = call(&channels.wallet, |response| WalletRequest::History {
        user_id: user.id,
        response,
    })
    .await?;

    reply(StatusCode::OK, transactions)
}
