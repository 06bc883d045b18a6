use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use super::{actor, call, reply, ApiResult, Channels};
use crate::models::earnings::{
    AccountSaleRequest, GmailDetails, NegotiationStep, QuizAnswer, TypingSubmission,
};
use crate::services::earnings::EarningRequest;
use crate::services::ServiceError;

pub async fn submit_task_proof(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transaction = call(&channels.earnings, |response| {
        EarningRequest::SubmitTaskProof {
            user_id: user.id,
            task_id,
            response,
        }
    })
    .await?;

    reply(StatusCode::CREATED, transaction)
}

pub async fn complete_typing_job(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(job_id): Path<String>,
    Json(submission): Json<TypingSubmission>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transaction = call(&channels.earnings, |response| {
        EarningRequest::CompleteTypingJob {
            user_id: user.id,
            job_id,
            submission,
            response,
        }
    })
    .await?;

    reply(StatusCode::CREATED, transaction)
}

pub async fn answer_quiz(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(question_id): Path<String>,
    Json(answer): Json<QuizAnswer>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transaction = call(&channels.earnings, |response| EarningRequest::AnswerQuiz {
        user_id: user.id,
        question_id,
        answer,
        response,
    })
    .await?;

    reply(StatusCode::CREATED, transaction)
}

pub async fn claim_salary(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(plan_id): Path<String>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transaction = call(&channels.earnings, |response| EarningRequest::ClaimSalary {
        user_id: user.id,
        plan_id,
        response,
    })
    .await?;

    reply(StatusCode::CREATED, transaction)
}

pub async fn buy_quiz_package(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path(package_id): Path<String>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transaction = call(&channels.earnings, |response| {
        EarningRequest::BuyQuizPackage {
            user_id: user.id,
            package_id,
            response,
        }
    })
    .await?;

    reply(StatusCode::CREATED, transaction)
}

pub async fn submit_account_sale(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Json(request): Json<AccountSaleRequest>,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let transaction = call(&channels.earnings, |response| {
        EarningRequest::SubmitAccountSale {
            user_id: user.id,
            request,
            response,
        }
    })
    .await?;

    reply(StatusCode::CREATED, transaction)
}

/// Advances a Gmail request. Steps without fields accept an empty body.
pub async fn negotiate(
    State(channels): State<Channels>,
    headers: HeaderMap,
    Path((transaction_id, step)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult {
    let user = actor(&channels, &headers).await?;
    let step: NegotiationStep = step.parse().map_err(ServiceError::Validation)?;
    let details: GmailDetails = if body.is_empty() {
        GmailDetails::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServiceError::Validation(e.to_string()))?
    };

    let transaction = call(&channels.earnings, |response| EarningRequest::Negotiate {
        actor_id: user.id,
        transaction_id,
        step,
        details,
        response,
    })
    .await?;

    reply(StatusCode::OK, transaction)
}
