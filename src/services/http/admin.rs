use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;

use super::{actor, admin, call, reply, ApiResult, Channels};
use crate::models::catalog::{CatalogKind, NewCatalogItem};
use crate::models::platform::PlatformSettings;
use crate::models::transactions::{SettleRequest, TransactionFilter};
use crate::services::catalog::CatalogRequest;
use crate::services::ledger::LedgerRequest;
use crate::services::ServiceError;

fn catalog_kind(segment: &str) -> Result<CatalogKind, ServiceError> {
    segment.parse().map_err(ServiceError::NotFound)
}

pub async fn list_transactions(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult {
    admin(&channels, &headers).await?;
    let transactions = call(&channels.ledger, |response| {
        LedgerRequest::ListTransactions { filter, response }
    })
    .await?;

    reply(StatusCode::OK, transactions)
}

pub async fn settle(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(transaction_id): Path<String>,
    Json(request): Json<SettleRequest>,
) -> ApiResult {
    let caller = admin(&channels, &headers).await?;
    log::info!(
        "Admin {} settling {} as {:?}.",
        caller.id,
        transaction_id,
        request.decision
    );

    let transaction = call(&channels.ledger, |response| LedgerRequest::Settle {
        transaction_id,
        decision: request.decision,
        response,
    })
    .await?;

    reply(StatusCode::OK, transaction)
}

pub async fn dashboard(State(channels): State<Channels>, headers: HeaderMap) -> ApiResult {
    admin(&channels, &headers).await?;
    let dashboard = call(&channels.ledger, |response| LedgerRequest::Dashboard { response }).await?;

    reply(StatusCode::OK, dashboard)
}

/// Settings are readable by every user; the app shows rates and limits.
pub async fn get_settings(State(channels): State<Channels>, headers: HeaderMap) -> ApiResult {
    actor(&channels, &headers).await?;
    let settings = call(&channels.catalog, |response| CatalogRequest::GetSettings {
        response,
    })
    .await?;

    reply(StatusCode::OK, settings)
}

pub async fn save_settings(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Json(settings): Json<PlatformSettings>,
) -> ApiResult {
    admin(&channels, &headers).await?;
    let settings = call(&channels.catalog, |response| CatalogRequest::SaveSettings {
        settings,
        response,
    })
    .await?;

    reply(StatusCode::OK, settings)
}

pub async fn list_catalog(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(kind): Path<String>,
) -> ApiResult {
    actor(&channels, &headers).await?;
    let kind = catalog_kind(&kind)?;
    let items = call(&channels.catalog, |response| CatalogRequest::List { kind, response }).await?;

    reply(StatusCode::OK, items)
}

pub async fn insert_catalog(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult {
    admin(&channels, &headers).await?;
    let kind = catalog_kind(&kind)?;
    let item = NewCatalogItem::from_json(kind, body)
        .map_err(|e| ServiceError::Validation(e.to_string()))?;

    let inserted = call(&channels.catalog, |response| CatalogRequest::Insert {
        item,
        response,
    })
    .await?;

    reply(StatusCode::CREATED, inserted)
}

pub async fn delete_catalog(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ServiceError> {
    admin(&channels, &headers).await?;
    let kind = catalog_kind(&kind)?;

    call(&channels.catalog, |response| CatalogRequest::Delete {
        kind,
        id,
        response,
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
