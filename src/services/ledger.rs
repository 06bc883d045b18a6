use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::oneshot;

use super::{referrals, RequestHandler, Service, ServiceError};
use crate::models::transactions::{
    Category, Decision, NewTransaction, Transaction, TransactionFilter, TransactionStatus,
    TransactionType,
};
use crate::models::users::{AccountType, BalanceField, User};
use crate::repositories::Repositories;

const SERVICE: &str = "Ledger";

pub enum LedgerRequest {
    Settle {
        transaction_id: String,
        decision: Decision,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    ListTransactions {
        filter: TransactionFilter,
        response: oneshot::Sender<Result<Vec<Transaction>, ServiceError>>,
    },
    Dashboard {
        response: oneshot::Sender<Result<Dashboard, ServiceError>>,
    },
}

/// Platform-wide totals for the admin console.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_users: usize,
    pub premium_users: usize,
    pub free_users: usize,
    pub total_main_balance_in_cents: i64,
    pub approved_deposits_in_cents: i64,
    pub approved_withdrawals_in_cents: i64,
    pub pending_withdrawals: usize,
    pub pending_task_proofs: usize,
}

#[derive(Clone)]
pub struct LedgerRequestHandler {
    repositories: Repositories,
}

impl LedgerRequestHandler {
    pub fn new(repositories: Repositories) -> Self {
        LedgerRequestHandler { repositories }
    }

    /// Resolves an open transaction and applies its balance effect once.
    ///
    /// The status change is a compare-and-set against the open states, so a
    /// second call for the same id fails with `Conflict` and changes nothing.
    pub async fn settle(
        &self,
        transaction_id: &str,
        decision: Decision,
    ) -> Result<Transaction, ServiceError> {
        let target = TransactionStatus::from(decision);

        let current = self
            .repositories
            .transactions
            .get_transaction(transaction_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Transaction not found: {}.", transaction_id))
            })?;

        if !current.status.can_transition_to(target) {
            return Err(ServiceError::Conflict(format!(
                "Transaction {} is already {}.",
                transaction_id,
                current.status.as_str()
            )));
        }

        let settled = self
            .repositories
            .transactions
            .transition_status(transaction_id, &TransactionStatus::OPEN, target, None)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| {
                ServiceError::Conflict(format!(
                    "Transaction {} was settled concurrently.",
                    transaction_id
                ))
            })?;

        log::info!(
            "Settled {} transaction {} as {}.",
            settled.transaction_type.as_str(),
            settled.id,
            target.as_str()
        );

        match decision {
            Decision::Approved => self.apply_approval(&settled).await?,
            Decision::Rejected => self.apply_rejection(&settled).await?,
        }

        Ok(settled)
    }

    async fn apply_approval(&self, transaction: &Transaction) -> Result<(), ServiceError> {
        let users = &self.repositories.users;
        let amount = transaction.amount_in_cents;

        let updated = match transaction.transaction_type {
            TransactionType::Deposit => users
                .increment_balance(&transaction.user_id, BalanceField::Premium, amount)
                .await
                .map_err(ServiceError::repository(SERVICE))?,
            TransactionType::Earning => users
                .increment_balance(&transaction.user_id, BalanceField::Free, amount)
                .await
                .map_err(ServiceError::repository(SERVICE))?,
            TransactionType::Purchase => {
                let purchaser = users
                    .set_account_type(&transaction.user_id, AccountType::Premium)
                    .await
                    .map_err(ServiceError::repository(SERVICE))?;

                if let Some(purchaser) = &purchaser {
                    self.pay_referral_bonuses(purchaser).await?;
                }

                purchaser
            }
            TransactionType::Withdraw | TransactionType::Transfer | TransactionType::Bonus => {
                return Ok(());
            }
        };

        if updated.is_none() {
            log::warn!(
                "Owner {} of approved transaction {} no longer exists.",
                transaction.user_id,
                transaction.id
            );
        }

        Ok(())
    }

    async fn apply_rejection(&self, transaction: &Transaction) -> Result<(), ServiceError> {
        if transaction.transaction_type != TransactionType::Withdraw {
            return Ok(());
        }

        let refunded = self
            .repositories
            .users
            .increment_balance(
                &transaction.user_id,
                BalanceField::Free,
                transaction.amount_in_cents,
            )
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        match refunded {
            Some(user) => log::info!(
                "Refunded {} cents to {} for rejected withdrawal {}.",
                transaction.amount_in_cents,
                user.id,
                transaction.id
            ),
            None => log::warn!(
                "Could not refund rejected withdrawal {}: user {} no longer exists.",
                transaction.id,
                transaction.user_id
            ),
        }

        Ok(())
    }

    async fn pay_referral_bonuses(&self, purchaser: &User) -> Result<(), ServiceError> {
        let settings = self
            .repositories
            .settings
            .load()
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        let upline = referrals::resolve_upline(self.repositories.users.as_ref(), purchaser)
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        for (index, referrer) in upline.iter().enumerate() {
            let level = index + 1;
            let Some(commission) = settings.referral_commission(level) else {
                break;
            };

            self.repositories
                .users
                .increment_balance(&referrer.id, BalanceField::Free, commission)
                .await
                .map_err(ServiceError::repository(SERVICE))?;

            self.repositories
                .transactions
                .insert_transaction(
                    NewTransaction::new(
                        &referrer.id,
                        TransactionType::Bonus,
                        Category::Referral,
                        commission,
                        TransactionStatus::Approved,
                    )
                    .details(format!("Ref Bonus L{} from {}", level, purchaser.full_name)),
                )
                .await
                .map_err(ServiceError::repository(SERVICE))?;

            log::info!(
                "Credited L{} referral bonus of {} cents to {} for purchase by {}.",
                level,
                commission,
                referrer.id,
                purchaser.id
            );
        }

        Ok(())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ServiceError> {
        self.repositories
            .transactions
            .list_transactions(filter)
            .await
            .map_err(ServiceError::repository(SERVICE))
    }

    async fn dashboard(&self) -> Result<Dashboard, ServiceError> {
        let users = self
            .repositories
            .users
            .list_users()
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        let premium_users = users.iter().filter(|u| u.is_premium()).count();
        let mut dashboard = Dashboard {
            total_users: users.len(),
            premium_users,
            free_users: users.len() - premium_users,
            total_main_balance_in_cents: users.iter().map(|u| u.balance_free_in_cents).sum(),
            ..Default::default()
        };

        let approved = self
            .list_transactions(&TransactionFilter::default().status(TransactionStatus::Approved))
            .await?;
        for transaction in &approved {
            match transaction.transaction_type {
                TransactionType::Deposit => {
                    dashboard.approved_deposits_in_cents += transaction.amount_in_cents
                }
                TransactionType::Withdraw => {
                    dashboard.approved_withdrawals_in_cents += transaction.amount_in_cents
                }
                _ => {}
            }
        }

        let pending = self
            .list_transactions(&TransactionFilter::default().status(TransactionStatus::Pending))
            .await?;
        dashboard.pending_withdrawals = pending
            .iter()
            .filter(|t| t.transaction_type == TransactionType::Withdraw)
            .count();
        dashboard.pending_task_proofs = pending
            .iter()
            .filter(|t| t.transaction_type == TransactionType::Earning && t.category == Category::Task)
            .count();

        Ok(dashboard)
    }
}

#[async_trait]
impl RequestHandler<LedgerRequest> for LedgerRequestHandler {
    async fn handle_request(&self, request: LedgerRequest) {
        match request {
            LedgerRequest::Settle {
                transaction_id,
                decision,
                response,
            } => {
                let result = self.settle(&transaction_id, decision).await;
                let _ = response.send(result);
            }
            LedgerRequest::ListTransactions { filter, response } => {
                let result = self.list_transactions(&filter).await;
                let _ = response.send(result);
            }
            LedgerRequest::Dashboard { response } => {
                let result = self.dashboard().await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        LedgerService {}
    }
}

#[async_trait]
impl Service<LedgerRequest, LedgerRequestHandler> for LedgerService {}
