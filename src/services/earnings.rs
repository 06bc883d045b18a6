use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use super::locks::UserLocks;
use super::{RequestHandler, Service, ServiceError};
use crate::models::catalog::{QuizPackage, TypingJobCategory};
use crate::models::earnings::{
    AccountSaleRequest, GmailDetails, NegotiationStep, QuizAnswer, TypingSubmission,
};
use crate::models::transactions::{
    Category, NewTransaction, Transaction, TransactionFilter, TransactionStatus, TransactionType,
};
use crate::models::users::{AccountType, BalanceField, User};
use crate::repositories::Repositories;

const SERVICE: &str = "Earning";

pub enum EarningRequest {
    SubmitTaskProof {
        user_id: String,
        task_id: String,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    SubmitAccountSale {
        user_id: String,
        request: AccountSaleRequest,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    Negotiate {
        actor_id: String,
        transaction_id: String,
        step: NegotiationStep,
        details: GmailDetails,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    CompleteTypingJob {
        user_id: String,
        job_id: String,
        submission: TypingSubmission,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    BuyQuizPackage {
        user_id: String,
        package_id: String,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    AnswerQuiz {
        user_id: String,
        question_id: String,
        answer: QuizAnswer,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    ClaimSalary {
        user_id: String,
        plan_id: String,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn package_details(package: &QuizPackage) -> String {
    format!("Active Package: {}", package.name)
}

fn package_expiry(package: &QuizPackage, purchased_at: DateTime<Utc>) -> DateTime<Utc> {
    purchased_at + Duration::days(i64::from(package.duration_days))
}

fn not_found(what: &str, id: &str) -> ServiceError {
    ServiceError::NotFound(format!("{} not found: {}.", what, id))
}

fn premium_required() -> ServiceError {
    ServiceError::Unauthorized("A premium account is required.".to_string())
}

#[derive(Clone)]
pub struct EarningRequestHandler {
    repositories: Repositories,
    locks: UserLocks,
}

impl EarningRequestHandler {
    pub fn new(repositories: Repositories) -> Self {
        EarningRequestHandler {
            repositories,
            locks: UserLocks::new(),
        }
    }

    async fn active_user(&self, user_id: &str) -> Result<User, ServiceError> {
        let user = self
            .repositories
            .users
            .get_user_by_id(user_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| not_found("User", user_id))?;

        if user.is_blocked {
            return Err(ServiceError::Unauthorized("Account blocked".to_string()));
        }
        Ok(user)
    }

    async fn transactions(&self, filter: TransactionFilter) -> Result<Vec<Transaction>, ServiceError> {
        self.repositories
            .transactions
            .list_transactions(&filter)
            .await
            .map_err(ServiceError::repository(SERVICE))
    }

    async fn insert(&self, transaction: NewTransaction) -> Result<Transaction, ServiceError> {
        self.repositories
            .transactions
            .insert_transaction(transaction)
            .await
            .map_err(ServiceError::repository(SERVICE))
    }

    /// Fails with `Conflict` if the user already has a `category` entry with
    /// exactly these `details`.
    async fn ensure_first(
        &self,
        user: &User,
        category: Category,
        details: &str,
    ) -> Result<(), ServiceError> {
        let previous = self
            .transactions(TransactionFilter::for_user(&user.id).category(category))
            .await?;

        let repeated = previous
            .iter()
            .any(|t| t.has_details(details) && t.status != TransactionStatus::Rejected);
        if repeated {
            return Err(ServiceError::Conflict(format!("Already submitted: {}.", details)));
        }
        Ok(())
    }

    pub async fn submit_task_proof(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> Result<Transaction, ServiceError> {
        let _guard = self.locks.lock(user_id).await;
        let user = self.active_user(user_id).await?;
        if !user.is_premium() {
            return Err(premium_required());
        }

        let settings = self
            .repositories
            .settings
            .load()
            .await
            .map_err(ServiceError::repository(SERVICE))?;
        if !settings.task_enabled {
            return Err(ServiceError::Validation("Tasks are disabled.".to_string()));
        }

        let task = self
            .repositories
            .catalog
            .get_task(task_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| not_found("Task", task_id))?;

        let details = format!("Task: {}", task.title);
        self.ensure_first(&user, Category::Task, &details).await?;

        let transaction = self
            .insert(
                NewTransaction::new(
                    &user.id,
                    TransactionType::Earning,
                    Category::Task,
                    task.reward_in_cents,
                    TransactionStatus::Pending,
                )
                .details(details),
            )
            .await?;

        log::info!("Task proof {} submitted by {}.", transaction.id, user.id);
        Ok(transaction)
    }

    pub async fn submit_account_sale(
        &self,
        user_id: &str,
        request: AccountSaleRequest,
    ) -> Result<Transaction, ServiceError> {
        let user = self.active_user(user_id).await?;
        let settings = self
            .repositories
            .settings
            .load()
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        let pending = match request {
            AccountSaleRequest::GmailRequest => NewTransaction::new(
                &user.id,
                TransactionType::Earning,
                Category::GmailRequest,
                settings.social_rates.gmail_in_cents,
                TransactionStatus::PendingCreds,
            )
            .details(json!({ "stage": "requested" }).to_string()),
            AccountSaleRequest::Sale {
                platform,
                credentials,
            } => {
                if !user.is_premium() {
                    return Err(premium_required());
                }

                let required = platform.credential_fields();
                let given: Vec<&str> = credentials.iter().map(|c| c.trim()).collect();
                if given.len() < 2 || given[..2].iter().any(|c| c.is_empty()) {
                    return Err(ServiceError::Validation(
                        "Account and password are required.".to_string(),
                    ));
                }
                if given.len() > required {
                    return Err(ServiceError::Validation(format!(
                        "Expected at most {} credential fields.",
                        required
                    )));
                }

                let mut fields = vec![platform.sale_tag()];
                fields.extend(given.iter().copied());
                fields.resize(required + 1, "");

                NewTransaction::new(
                    &user.id,
                    TransactionType::Earning,
                    Category::Sell,
                    settings.social_rates.rate(platform),
                    TransactionStatus::Pending,
                )
                .details(fields.join("|"))
            }
        };

        let transaction = self.insert(pending).await?;
        log::info!(
            "Account sale {} ({}) submitted by {}.",
            transaction.id,
            transaction.category.as_str(),
            user.id
        );
        Ok(transaction)
    }

    /// Advances a Gmail request one step. Admin steps merge the handed-over
    /// fields into the request's JSON details.
    pub async fn negotiate(
        &self,
        actor_id: &str,
        transaction_id: &str,
        step: NegotiationStep,
        details: GmailDetails,
    ) -> Result<Transaction, ServiceError> {
        let actor = self.active_user(actor_id).await?;

        let transaction = self
            .repositories
            .transactions
            .get_transaction(transaction_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| not_found("Transaction", transaction_id))?;

        if transaction.category != Category::GmailRequest {
            return Err(ServiceError::Validation(format!(
                "Transaction {} is not a Gmail request.",
                transaction_id
            )));
        }
        if step.is_admin_step() && !actor.is_admin() {
            return Err(ServiceError::Unauthorized("Admin only.".to_string()));
        }
        if !step.is_admin_step() && transaction.user_id != actor.id {
            return Err(ServiceError::Unauthorized(
                "Not the owner of this request.".to_string(),
            ));
        }

        let (from, to) = step.transition();
        if transaction.status != from {
            return Err(ServiceError::Conflict(format!(
                "Request {} is {}, expected {}.",
                transaction_id,
                transaction.status.as_str(),
                from.as_str()
            )));
        }

        let missing = details.missing_for(step);
        if !missing.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Missing fields: {}.",
                missing.join(", ")
            )));
        }

        let merged = if step.is_admin_step() {
            let mut current = transaction
                .details
                .as_deref()
                .and_then(|d| serde_json::from_str::<Value>(d).ok())
                .filter(Value::is_object)
                .unwrap_or_else(|| json!({}));
            let update = serde_json::to_value(&details)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;

            if let (Some(current), Value::Object(update)) = (current.as_object_mut(), update) {
                current.extend(update);
            }
            Some(current.to_string())
        } else {
            None
        };

        let updated = self
            .repositories
            .transactions
            .transition_status(transaction_id, &[from], to, merged.as_deref())
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| {
                ServiceError::Conflict(format!(
                    "Request {} changed concurrently.",
                    transaction_id
                ))
            })?;

        log::info!(
            "Gmail request {} moved {} -> {} by {}.",
            transaction_id,
            from.as_str(),
            to.as_str(),
            actor.id
        );
        Ok(updated)
    }

    pub async fn complete_typing_job(
        &self,
        user_id: &str,
        job_id: &str,
        submission: &TypingSubmission,
    ) -> Result<Transaction, ServiceError> {
        let _guard = self.locks.lock(user_id).await;
        let user = self.active_user(user_id).await?;

        let job = self
            .repositories
            .catalog
            .get_typing_job(job_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| not_found("Typing job", job_id))?;

        if normalize_text(&submission.typed_text) != normalize_text(&job.text) {
            return Err(ServiceError::Validation(
                "Typed text does not match.".to_string(),
            ));
        }

        match job.category {
            TypingJobCategory::Premium if !user.is_premium() => return Err(premium_required()),
            TypingJobCategory::Referral if user.referral_job_quota <= 0 => {
                return Err(ServiceError::Validation(
                    "Referral job quota exhausted.".to_string(),
                ));
            }
            _ => {}
        }

        let details = format!("Typing ID: {}", job.id);
        self.ensure_first(&user, Category::Typing, &details).await?;

        if job.category == TypingJobCategory::Referral {
            self.repositories
                .users
                .increment_referral_quota(&user.id, -1)
                .await
                .map_err(ServiceError::repository(SERVICE))?;
        }

        let transaction = self
            .insert(
                NewTransaction::new(
                    &user.id,
                    TransactionType::Earning,
                    Category::Typing,
                    job.reward_in_cents,
                    TransactionStatus::Approved,
                )
                .details(details),
            )
            .await?;

        log::info!("Typing job {} completed by {}.", job.id, user.id);
        Ok(transaction)
    }

    /// The user's most recent quiz package and its purchase time, if it has
    /// not expired at `now`.
    async fn active_package(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<Option<(QuizPackage, DateTime<Utc>)>, ServiceError> {
        let purchases = self
            .transactions(
                TransactionFilter::for_user(&user.id)
                    .transaction_type(TransactionType::Purchase)
                    .category(Category::QuizPackage)
                    .status(TransactionStatus::Approved),
            )
            .await?;

        let Some(latest) = purchases.first() else {
            return Ok(None);
        };

        let packages = self
            .repositories
            .catalog
            .list_quiz_packages()
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        let active = packages
            .into_iter()
            .find(|p| latest.has_details(&package_details(p)))
            .filter(|p| package_expiry(p, latest.created_at) > now)
            .map(|p| (p, latest.created_at));

        Ok(active)
    }

    pub async fn buy_quiz_package(
        &self,
        user_id: &str,
        package_id: &str,
    ) -> Result<Transaction, ServiceError> {
        let _guard = self.locks.lock(user_id).await;
        let user = self.active_user(user_id).await?;

        let package = self
            .repositories
            .catalog
            .get_quiz_package(package_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| not_found("Quiz package", package_id))?;

        if let Some((active, _)) = self.active_package(&user, Utc::now()).await? {
            return Err(ServiceError::Conflict(format!(
                "Package {} is still active.",
                active.name
            )));
        }

        let debited = self
            .repositories
            .users
            .try_debit(&user.id, BalanceField::Premium, package.price_in_cents)
            .await
            .map_err(ServiceError::repository(SERVICE))?;
        if debited.is_none() {
            return Err(ServiceError::Validation(
                "Insufficient deposit balance.".to_string(),
            ));
        }

        let purchase = NewTransaction::new(
            &user.id,
            TransactionType::Purchase,
            Category::QuizPackage,
            package.price_in_cents,
            TransactionStatus::Approved,
        )
        .details(package_details(&package));

        match self.insert(purchase).await {
            Ok(transaction) => {
                log::info!("Quiz package {} bought by {}.", package.id, user.id);
                Ok(transaction)
            }
            Err(e) => {
                if let Err(refund) = self
                    .repositories
                    .users
                    .increment_balance(&user.id, BalanceField::Premium, package.price_in_cents)
                    .await
                {
                    log::error!(
                        "Could not return {} cents to {} after failed package purchase: {}",
                        package.price_in_cents,
                        user.id,
                        refund
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn answer_quiz(
        &self,
        user_id: &str,
        question_id: &str,
        answer: &QuizAnswer,
    ) -> Result<Transaction, ServiceError> {
        let _guard = self.locks.lock(user_id).await;
        let user = self.active_user(user_id).await?;
        let now = Utc::now();

        let question = self
            .repositories
            .catalog
            .get_quiz_question(question_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| not_found("Quiz question", question_id))?;

        let (package, _) = self
            .active_package(&user, now)
            .await?
            .ok_or_else(|| ServiceError::Validation("No active quiz package.".to_string()))?;
        if package.id != question.package_id {
            return Err(ServiceError::Validation(
                "Question is not part of the active package.".to_string(),
            ));
        }

        let details = format!("Quiz ID: {}", question.id);
        let answered = self
            .transactions(
                TransactionFilter::for_user(&user.id)
                    .transaction_type(TransactionType::Earning)
                    .category(Category::Quiz),
            )
            .await?;

        if answered.iter().any(|t| t.has_details(&details)) {
            return Err(ServiceError::Conflict(format!(
                "Question {} already answered.",
                question.id
            )));
        }

        let today = now.date_naive();
        let answered_today = answered
            .iter()
            .filter(|t| t.created_at.date_naive() == today)
            .count();
        if answered_today >= usize::try_from(package.daily_limit).unwrap_or(0) {
            return Err(ServiceError::Validation(format!(
                "Daily limit of {} answers reached.",
                package.daily_limit
            )));
        }

        if !question.is_correct(&answer.answer) {
            return Err(ServiceError::Validation("Wrong answer.".to_string()));
        }

        let transaction = self
            .insert(
                NewTransaction::new(
                    &user.id,
                    TransactionType::Earning,
                    Category::Quiz,
                    question.reward_in_cents,
                    TransactionStatus::Approved,
                )
                .details(details),
            )
            .await?;

        log::info!("Quiz {} answered by {}.", question.id, user.id);
        Ok(transaction)
    }

    pub async fn claim_salary(
        &self,
        user_id: &str,
        plan_id: &str,
    ) -> Result<Transaction, ServiceError> {
        let _guard = self.locks.lock(user_id).await;
        let user = self.active_user(user_id).await?;

        let plan = self
            .repositories
            .catalog
            .get_salary_plan(plan_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| not_found("Salary plan", plan_id))?;

        let details = format!("Salary: {}", plan.title);
        self.ensure_first(&user, Category::Salary, &details).await?;

        let premium_referrals = self
            .repositories
            .users
            .list_downline(&user.ref_code)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .iter()
            .filter(|u| u.account_type == AccountType::Premium)
            .count();
        if premium_referrals < usize::try_from(plan.target_refers).unwrap_or(0) {
            return Err(ServiceError::Validation(format!(
                "{} premium referrals required, {} found.",
                plan.target_refers, premium_referrals
            )));
        }

        let packages = self
            .transactions(
                TransactionFilter::for_user(&user.id).transaction_type(TransactionType::Purchase),
            )
            .await?
            .iter()
            .filter(|t| {
                t.is_approved()
                    && matches!(t.category, Category::QuizPackage | Category::TypingPackage)
            })
            .count();
        if packages < usize::try_from(plan.required_packages).unwrap_or(0) {
            return Err(ServiceError::Validation(format!(
                "{} packages required, {} owned.",
                plan.required_packages, packages
            )));
        }

        let transaction = self
            .insert(
                NewTransaction::new(
                    &user.id,
                    TransactionType::Earning,
                    Category::Salary,
                    plan.reward_in_cents,
                    TransactionStatus::Approved,
                )
                .details(details),
            )
            .await?;

        log::info!("Salary {} claimed by {}.", plan.id, user.id);
        Ok(transaction)
    }
}

#[async_trait]
impl RequestHandler<EarningRequest> for EarningRequestHandler {
    async fn handle_request(&self, request: EarningRequest) {
        match request {
            EarningRequest::SubmitTaskProof {
                user_id,
                task_id,
                response,
            } => {
                let result = self.submit_task_proof(&user_id, &task_id).await;
                let _ = response.send(result);
            }
            EarningRequest::SubmitAccountSale {
                user_id,
                request,
                response,
            } => {
                let result = self.submit_account_sale(&user_id, request).await;
                let _ = response.send(result);
            }
            EarningRequest::Negotiate {
                actor_id,
                transaction_id,
                step,
                details,
                response,
            } => {
                let result = self
                    .negotiate(&actor_id, &transaction_id, step, details)
                    .await;
                let _ = response.send(result);
            }
            EarningRequest::CompleteTypingJob {
                user_id,
                job_id,
                submission,
                response,
            } => {
                let result = self
                    .complete_typing_job(&user_id, &job_id, &submission)
                    .await;
                let _ = response.send(result);
            }
            EarningRequest::BuyQuizPackage {
                user_id,
                package_id,
                response,
            } => {
                let result = self.buy_quiz_package(&user_id, &package_id).await;
                let _ = response.send(result);
            }
            EarningRequest::AnswerQuiz {
                user_id,
                question_id,
                answer,
                response,
            } => {
                let result = self.answer_quiz(&user_id, &question_id, &answer).await;
                let _ = response.send(result);
            }
            EarningRequest::ClaimSalary {
                user_id,
                plan_id,
                response,
            } => {
                let result = self.claim_salary(&user_id, &plan_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct EarningService;

impl EarningService {
    pub fn new() -> Self {
        EarningService {}
    }
}

#[async_trait]
impl Service<EarningRequest, EarningRequestHandler> for EarningService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{
        NewQuizPackage, NewQuizQuestion, NewSalaryPlan, NewTask, NewTypingJob, QuizQuestion,
        TaskKind,
    };
    use crate::models::platform::SocialPlatform;
    use crate::models::transactions::Decision;
    use crate::services::ledger::LedgerRequestHandler;
    use crate::services::testing::{seed_admin, seed_user, Fixture};
    use crate::services::wallet::sub_wallets;

    async fn premium_user(fx: &Fixture, name: &str) -> User {
        let user = seed_user(fx, name, None).await;
        fx.make_premium(&user.id).await;
        fx.user(&user.id).await
    }

    async fn package_with_question(
        fx: &Fixture,
        daily_limit: i32,
        questions: usize,
    ) -> (QuizPackage, Vec<QuizQuestion>) {
        let package = fx
            .repositories
            .catalog
            .insert_quiz_package(NewQuizPackage {
                name: "Starter".to_string(),
                description: String::new(),
                price_in_cents: 10_000,
                duration_days: 30,
                daily_limit,
                profit_in_cents: 0,
            })
            .await
            .unwrap();

        let mut inserted = Vec::new();
        for n in 0..questions {
            inserted.push(
                fx.repositories
                    .catalog
                    .insert_quiz_question(NewQuizQuestion {
                        package_id: package.id.clone(),
                        question: format!("{} + 1?", n),
                        answer: format!("{}", n + 1),
                        reward_in_cents: 200,
                        wait_secs: 5,
                        ad_link: String::new(),
                    })
                    .await
                    .unwrap(),
            );
        }

        (package, inserted)
    }

    fn answer(text: &str) -> QuizAnswer {
        QuizAnswer {
            answer: text.to_string(),
        }
    }

    #[tokio::test]
    async fn task_proof_is_premium_and_single() {
        let fx = Fixture::new();
        let task = fx
            .repositories
            .catalog
            .insert_task(NewTask {
                title: "Follow page".to_string(),
                description: String::new(),
                reward_in_cents: 300,
                link: String::new(),
                image: String::new(),
                kind: TaskKind::Premium,
            })
            .await
            .unwrap();
        let free = seed_user(&fx, "free", None).await;
        let premium = premium_user(&fx, "premium").await;
        let earnings = EarningRequestHandler::new(fx.repositories.clone());

        assert!(matches!(
            earnings.submit_task_proof(&free.id, &task.id).await,
            Err(ServiceError::Unauthorized(_))
        ));

        let proof = earnings.submit_task_proof(&premium.id, &task.id).await.unwrap();
        assert_eq!(proof.status, TransactionStatus::Pending);
        assert!(proof.has_details("Task: Follow page"));

        assert!(matches!(
            earnings.submit_task_proof(&premium.id, &task.id).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn account_sale_records_platform_line() {
        let fx = Fixture::new();
        let user = premium_user(&fx, "seller").await;
        let earnings = EarningRequestHandler::new(fx.repositories.clone());

        let sale = earnings
            .submit_account_sale(
                &user.id,
                AccountSaleRequest::Sale {
                    platform: SocialPlatform::Instagram,
                    credentials: vec!["insta_user".to_string(), "pw".to_string()],
                },
            )
            .await
            .unwrap();

        assert_eq!(sale.category, Category::Sell);
        assert_eq!(sale.amount_in_cents, 500);
        assert!(sale.has_details("Insta|insta_user|pw||"));
    }

    #[tokio::test]
    async fn free_user_may_only_request_gmail_work() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "free", None).await;
        let earnings = EarningRequestHandler::new(fx.repositories.clone());

        let sale = earnings
            .submit_account_sale(
                &user.id,
                AccountSaleRequest::Sale {
                    platform: SocialPlatform::Gmail,
                    credentials: vec!["a@gmail.com".to_string(), "pw".to_string()],
                },
            )
            .await;
        assert!(matches!(sale, Err(ServiceError::Unauthorized(_))));

        let request = earnings
            .submit_account_sale(&user.id, AccountSaleRequest::GmailRequest)
            .await
            .unwrap();
        assert_eq!(request.status, TransactionStatus::PendingCreds);
        assert_eq!(request.amount_in_cents, 1_000);
    }

    #[tokio::test]
    async fn gmail_negotiation_runs_to_payment() {
        let fx = Fixture::new();
        let admin = seed_admin(&fx).await;
        let user = seed_user(&fx, "worker", None).await;
        let earnings = EarningRequestHandler::new(fx.repositories.clone());
        let request = earnings
            .submit_account_sale(&user.id, AccountSaleRequest::GmailRequest)
            .await
            .unwrap();

        // user cannot skip ahead
        assert!(matches!(
            earnings
                .negotiate(&user.id, &request.id, NegotiationStep::RequestRecovery, GmailDetails::default())
                .await,
            Err(ServiceError::Conflict(_))
        ));
        // only admins hand over credentials
        assert!(matches!(
            earnings
                .negotiate(&user.id, &request.id, NegotiationStep::SendCredentials, GmailDetails::default())
                .await,
            Err(ServiceError::Unauthorized(_))
        ));

        let credentials = GmailDetails {
            first_name: Some("Rahim".to_string()),
            last_name: Some("Uddin".to_string()),
            admin_email: Some("rahim@gmail.com".to_string()),
            admin_pass: Some("pass123".to_string()),
            admin_recovery: None,
        };
        let working = earnings
            .negotiate(&admin.id, &request.id, NegotiationStep::SendCredentials, credentials)
            .await
            .unwrap();
        assert_eq!(working.status, TransactionStatus::Working);

        earnings
            .negotiate(&user.id, &request.id, NegotiationStep::RequestRecovery, GmailDetails::default())
            .await
            .unwrap();
        let recovery = GmailDetails {
            admin_recovery: Some("backup@gmail.com".to_string()),
            ..Default::default()
        };
        earnings
            .negotiate(&admin.id, &request.id, NegotiationStep::SendRecovery, recovery)
            .await
            .unwrap();
        let review = earnings
            .negotiate(&user.id, &request.id, NegotiationStep::MarkDone, GmailDetails::default())
            .await
            .unwrap();
        assert_eq!(review.status, TransactionStatus::Review);

        let details: Value = serde_json::from_str(review.details.as_deref().unwrap()).unwrap();
        assert_eq!(details["stage"], "requested");
        assert_eq!(details["firstName"], "Rahim");
        assert_eq!(details["adminRecovery"], "backup@gmail.com");

        LedgerRequestHandler::new(fx.repositories.clone())
            .settle(&request.id, Decision::Approved)
            .await
            .unwrap();
        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 1_000);
    }

    #[tokio::test]
    async fn typing_job_consumes_referral_quota() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "typist", None).await;
        let earnings = EarningRequestHandler::new(fx.repositories.clone());
        let mut jobs = Vec::new();
        for text in ["one two", "three four", "five six"] {
            jobs.push(
                fx.repositories
                    .catalog
                    .insert_typing_job(NewTypingJob {
                        text: text.to_string(),
                        reward_in_cents: 100,
                        link: String::new(),
                        wait_time_secs: 10,
                        category: TypingJobCategory::Referral,
                    })
                    .await
                    .unwrap(),
            );
        }
        let typed = |text: &str| TypingSubmission {
            typed_text: text.to_string(),
        };

        assert!(matches!(
            earnings.complete_typing_job(&user.id, &jobs[0].id, &typed("one three")).await,
            Err(ServiceError::Validation(_))
        ));

        let done = earnings
            .complete_typing_job(&user.id, &jobs[0].id, &typed("  One   TWO "))
            .await
            .unwrap();
        assert!(done.is_approved());
        assert!(matches!(
            earnings.complete_typing_job(&user.id, &jobs[0].id, &typed("one two")).await,
            Err(ServiceError::Conflict(_))
        ));

        earnings
            .complete_typing_job(&user.id, &jobs[1].id, &typed("three four"))
            .await
            .unwrap();
        assert_eq!(fx.user(&user.id).await.referral_job_quota, 0);
        assert!(matches!(
            earnings.complete_typing_job(&user.id, &jobs[2].id, &typed("five six")).await,
            Err(ServiceError::Validation(_))
        ));

        // instant earnings stay in the sub-wallet until transferred
        let log = fx.transactions(TransactionFilter::for_user(&user.id)).await;
        assert_eq!(sub_wallets(&log).typing, 200);
        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 0);
    }

    #[tokio::test]
    async fn premium_typing_job_needs_premium() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "typist", None).await;
        let job = fx
            .repositories
            .catalog
            .insert_typing_job(NewTypingJob {
                text: "hello".to_string(),
                reward_in_cents: 100,
                link: String::new(),
                wait_time_secs: 10,
                category: TypingJobCategory::Premium,
            })
            .await
            .unwrap();

        let result = EarningRequestHandler::new(fx.repositories.clone())
            .complete_typing_job(
                &user.id,
                &job.id,
                &TypingSubmission {
                    typed_text: "hello".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn buying_package_spends_deposit_balance_once() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "quizzer", None).await;
        let (package, _) = package_with_question(&fx, 10, 0).await;
        let earnings = EarningRequestHandler::new(fx.repositories.clone());

        assert!(matches!(
            earnings.buy_quiz_package(&user.id, &package.id).await,
            Err(ServiceError::Validation(_))
        ));

        fx.credit(&user.id, BalanceField::Premium, 25_000).await;
        let purchase = earnings.buy_quiz_package(&user.id, &package.id).await.unwrap();
        assert!(purchase.has_details("Active Package: Starter"));
        assert_eq!(fx.user(&user.id).await.balance_premium_in_cents, 15_000);

        assert!(matches!(
            earnings.buy_quiz_package(&user.id, &package.id).await,
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(fx.user(&user.id).await.balance_premium_in_cents, 15_000);
    }

    #[tokio::test]
    async fn quiz_answers_respect_package_and_daily_limit() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "quizzer", None).await;
        let (package, questions) = package_with_question(&fx, 2, 3).await;
        let earnings = EarningRequestHandler::new(fx.repositories.clone());

        assert!(matches!(
            earnings.answer_quiz(&user.id, &questions[0].id, &answer("1")).await,
            Err(ServiceError::Validation(_))
        ));

        fx.credit(&user.id, BalanceField::Premium, 10_000).await;
        earnings.buy_quiz_package(&user.id, &package.id).await.unwrap();

        assert!(matches!(
            earnings.answer_quiz(&user.id, &questions[0].id, &answer("7")).await,
            Err(ServiceError::Validation(_))
        ));
        let correct = earnings
            .answer_quiz(&user.id, &questions[0].id, &answer(" 1 "))
            .await
            .unwrap();
        assert_eq!(correct.amount_in_cents, 200);
        assert!(matches!(
            earnings.answer_quiz(&user.id, &questions[0].id, &answer("1")).await,
            Err(ServiceError::Conflict(_))
        ));

        earnings
            .answer_quiz(&user.id, &questions[1].id, &answer("2"))
            .await
            .unwrap();
        assert!(matches!(
            earnings.answer_quiz(&user.id, &questions[2].id, &answer("3")).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn package_expires_after_duration() {
        let package = QuizPackage {
            id: "p".to_string(),
            name: "Starter".to_string(),
            description: String::new(),
            price_in_cents: 0,
            duration_days: 30,
            daily_limit: 10,
            profit_in_cents: 0,
            created_at: Utc::now(),
        };
        let bought = Utc::now() - Duration::days(31);

        assert!(package_expiry(&package, bought) < Utc::now());
        assert!(package_expiry(&package, Utc::now()) > Utc::now());
    }

    #[tokio::test]
    async fn salary_needs_premium_referrals_and_is_claimed_once() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "leader", None).await;
        let plan = fx
            .repositories
            .catalog
            .insert_salary_plan(NewSalaryPlan {
                title: "Bronze".to_string(),
                description: String::new(),
                target_refers: 2,
                reward_in_cents: 100_000,
                required_packages: 0,
            })
            .await
            .unwrap();
        let earnings = EarningRequestHandler::new(fx.repositories.clone());

        let first = seed_user(&fx, "r1", Some(&user.ref_code)).await;
        let second = seed_user(&fx, "r2", Some(&user.ref_code)).await;
        fx.make_premium(&first.id).await;

        assert!(matches!(
            earnings.claim_salary(&user.id, &plan.id).await,
            Err(ServiceError::Validation(_))
        ));

        fx.make_premium(&second.id).await;
        let salary = earnings.claim_salary(&user.id, &plan.id).await.unwrap();
        assert!(salary.has_details("Salary: Bronze"));
        assert!(matches!(
            earnings.claim_salary(&user.id, &plan.id).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_package_purchases_charge_once() {
        let fx = Fixture::interleaving();
        let user = seed_user(&fx, "quizzer", None).await;
        let (package, _) = package_with_question(&fx, 10, 0).await;
        fx.credit(&user.id, BalanceField::Premium, 25_000).await;
        let earnings = EarningRequestHandler::new(fx.repositories.clone());

        let (a, b) = tokio::join!(
            earnings.buy_quiz_package(&user.id, &package.id),
            earnings.buy_quiz_package(&user.id, &package.id)
        );

        assert!(a.is_ok() != b.is_ok());
        assert!(matches!(a.and(b), Err(ServiceError::Conflict(_))));
        assert_eq!(fx.user(&user.id).await.balance_premium_in_cents, 15_000);
    }
}
