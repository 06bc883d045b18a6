use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::oneshot;

use super::locks::UserLocks;
use super::{RequestHandler, Service, ServiceError};
use crate::models::platform::PlatformSettings;
use crate::models::transactions::{
    Category, DepositRequest, NewTransaction, PremiumRequest, Transaction, TransactionFilter,
    TransactionStatus, TransactionType, TransferRequest, WithdrawRequest,
};
use crate::models::users::{BalanceField, User, UserStats};
use crate::repositories::Repositories;

const SERVICE: &str = "Wallet";

pub enum WalletRequest {
    Deposit {
        user_id: String,
        request: DepositRequest,
        response: oneshot::Sender<Result<PendingPayment, ServiceError>>,
    },
    Withdraw {
        user_id: String,
        request: WithdrawRequest,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    Transfer {
        user_id: String,
        request: TransferRequest,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    Premium {
        user_id: String,
        request: PremiumRequest,
        response: oneshot::Sender<Result<PendingPayment, ServiceError>>,
    },
    Wallets {
        user_id: String,
        response: oneshot::Sender<Result<Wallets, ServiceError>>,
    },
    Stats {
        user_id: String,
        response: oneshot::Sender<Result<UserStats, ServiceError>>,
    },
    History {
        user_id: String,
        response: oneshot::Sender<Result<Vec<Transaction>, ServiceError>>,
    },
}

/// A pending payment and the number the user should send money to.
#[derive(Clone, Debug, Serialize)]
pub struct PendingPayment {
    pub transaction: Transaction,
    pub pay_to: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SubWallets {
    pub task: i64,
    pub typing: i64,
    pub quiz: i64,
    pub sell: i64,
    pub salary: i64,
}

impl SubWallets {
    pub fn get(&self, wallet: Category) -> Option<i64> {
        match wallet {
            Category::Task => Some(self.task),
            Category::Typing => Some(self.typing),
            Category::Quiz => Some(self.quiz),
            Category::Sell => Some(self.sell),
            Category::Salary => Some(self.salary),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Wallets {
    pub balance_free_in_cents: i64,
    pub balance_premium_in_cents: i64,
    pub sub_wallets: SubWallets,
}

/// Approved earnings of `wallet` minus approved transfers out of it, floored
/// at zero.
pub fn sub_wallet_balance(transactions: &[Transaction], wallet: Category) -> i64 {
    let (earned, moved) = transactions
        .iter()
        .filter(|t| t.is_approved())
        .fold((0i64, 0i64), |(earned, moved), t| {
            match t.transaction_type {
                TransactionType::Earning if t.category == wallet => {
                    (earned + t.amount_in_cents, moved)
                }
                TransactionType::Transfer if t.source_wallet == Some(wallet) => {
                    (earned, moved + t.amount_in_cents)
                }
                _ => (earned, moved),
            }
        });

    (earned - moved).max(0)
}

pub fn sub_wallets(transactions: &[Transaction]) -> SubWallets {
    SubWallets {
        task: sub_wallet_balance(transactions, Category::Task),
        typing: sub_wallet_balance(transactions, Category::Typing),
        quiz: sub_wallet_balance(transactions, Category::Quiz),
        sell: sub_wallet_balance(transactions, Category::Sell),
        salary: sub_wallet_balance(transactions, Category::Salary),
    }
}

fn sum_where(transactions: &[Transaction], predicate: impl Fn(&Transaction) -> bool) -> i64 {
    transactions
        .iter()
        .filter(|&t| predicate(t))
        .map(|t| t.amount_in_cents)
        .sum()
}

fn user_stats(transactions: &[Transaction]) -> UserStats {
    let withdrawals = |t: &Transaction| t.transaction_type == TransactionType::Withdraw;

    UserStats {
        total_earned_in_cents: sum_where(transactions, |t| {
            t.transaction_type == TransactionType::Earning && t.is_approved()
        }),
        total_withdraw_in_cents: sum_where(transactions, |t| {
            withdrawals(t) && t.status != TransactionStatus::Rejected
        }),
        pending_withdraw_in_cents: sum_where(transactions, |t| {
            withdrawals(t) && t.status == TransactionStatus::Pending
        }),
    }
}

fn deposit_number<'a>(settings: &'a PlatformSettings, method: &str) -> &'a str {
    if method.eq_ignore_ascii_case("bkash") {
        &settings.bkash
    } else {
        &settings.nagad
    }
}

fn require(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{} is required.", field)));
    }
    Ok(())
}

#[derive(Clone)]
pub struct WalletRequestHandler {
    repositories: Repositories,
    locks: UserLocks,
}

impl WalletRequestHandler {
    pub fn new(repositories: Repositories) -> Self {
        WalletRequestHandler {
            repositories,
            locks: UserLocks::new(),
        }
    }

    async fn user(&self, user_id: &str) -> Result<User, ServiceError> {
        self.repositories
            .users
            .get_user_by_id(user_id)
            .await
            .map_err(ServiceError::repository(SERVICE))?
            .ok_or_else(|| ServiceError::NotFound(format!("User not found: {}.", user_id)))
    }

    async fn active_user(&self, user_id: &str) -> Result<User, ServiceError> {
        let user = self.user(user_id).await?;
        if user.is_blocked {
            return Err(ServiceError::Unauthorized("Account blocked".to_string()));
        }
        Ok(user)
    }

    async fn settings(&self) -> Result<PlatformSettings, ServiceError> {
        self.repositories
            .settings
            .load()
            .await
            .map_err(ServiceError::repository(SERVICE))
    }

    async fn history(&self, user_id: &str) -> Result<Vec<Transaction>, ServiceError> {
        self.repositories
            .transactions
            .list_transactions(&TransactionFilter::for_user(user_id))
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

    pub async fn request_deposit(
        &self,
        user_id: &str,
        request: &DepositRequest,
    ) -> Result<PendingPayment, ServiceError> {
        require("Method", &request.method)?;
        require("Sender number", &request.sender_number)?;
        require("Transaction id", &request.trx_id)?;

        let user = self.active_user(user_id).await?;
        let settings = self.settings().await?;

        if request.amount_in_cents < settings.min_deposit_in_cents {
            return Err(ServiceError::Validation(format!(
                "Minimum deposit is {} cents.",
                settings.min_deposit_in_cents
            )));
        }

        let transaction = self
            .insert(
                NewTransaction::new(
                    &user.id,
                    TransactionType::Deposit,
                    Category::Main,
                    request.amount_in_cents,
                    TransactionStatus::Pending,
                )
                .payment(&request.method, &request.sender_number, Some(&request.trx_id)),
            )
            .await?;

        log::info!(
            "Deposit {} of {} cents requested by {}.",
            transaction.id,
            transaction.amount_in_cents,
            user.id
        );

        Ok(PendingPayment {
            transaction,
            pay_to: deposit_number(&settings, &request.method).to_string(),
        })
    }

    /// Admits a withdrawal and moves the amount out of the main balance until
    /// the request is settled.
    pub async fn request_withdraw(
        &self,
        user_id: &str,
        request: &WithdrawRequest,
    ) -> Result<Transaction, ServiceError> {
        let amount = request.amount_in_cents;
        if amount <= 0 {
            return Err(ServiceError::Validation(
                "Amount must be positive.".to_string(),
            ));
        }
        require("Method", &request.method)?;
        require("Receive number", &request.receive_number)?;

        let _guard = self.locks.lock(user_id).await;
        let user = self.active_user(user_id).await?;
        let settings = self.settings().await?;

        if user.is_premium() {
            if amount < settings.min_withdraw_in_cents {
                log::debug!("Withdrawal by {} below minimum: {}.", user.id, amount);
                return Err(ServiceError::Validation(format!(
                    "Minimum withdrawal is {} cents.",
                    settings.min_withdraw_in_cents
                )));
            }
        } else {
            let previous = self
                .repositories
                .transactions
                .list_transactions(
                    &TransactionFilter::for_user(&user.id)
                        .transaction_type(TransactionType::Withdraw),
                )
                .await
                .map_err(ServiceError::repository(SERVICE))?
                .iter()
                .filter(|t| t.status != TransactionStatus::Rejected)
                .count();

            if previous >= settings.free_withdraw_limit as usize {
                log::debug!("Free user {} reached the withdrawal limit.", user.id);
                return Err(ServiceError::Validation(format!(
                    "Free accounts can withdraw {} time(s). Upgrade to premium to withdraw more.",
                    settings.free_withdraw_limit
                )));
            }
            if amount > settings.free_withdraw_max_in_cents {
                log::debug!("Free user {} over the per-request cap: {}.", user.id, amount);
                return Err(ServiceError::Validation(format!(
                    "Free accounts can withdraw at most {} cents.",
                    settings.free_withdraw_max_in_cents
                )));
            }
        }

        let debited = self
            .repositories
            .users
            .try_debit(&user.id, BalanceField::Free, amount)
            .await
            .map_err(ServiceError::repository(SERVICE))?;
        if debited.is_none() {
            log::debug!("Withdrawal by {} exceeds balance: {}.", user.id, amount);
            return Err(ServiceError::Validation("Insufficient balance.".to_string()));
        }

        let pending = NewTransaction::new(
            &user.id,
            TransactionType::Withdraw,
            Category::Main,
            amount,
            TransactionStatus::Pending,
        )
        .payment(&request.method, &request.receive_number, None);

        match self.insert(pending).await {
            Ok(transaction) => {
                log::info!(
                    "Withdrawal {} of {} cents escrowed for {}.",
                    transaction.id,
                    amount,
                    user.id
                );
                Ok(transaction)
            }
            Err(e) => {
                if let Err(refund) = self
                    .repositories
                    .users
                    .increment_balance(&user.id, BalanceField::Free, amount)
                    .await
                {
                    log::error!(
                        "Could not return {} cents to {} after failed withdrawal: {}",
                        amount,
                        user.id,
                        refund
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn transfer(
        &self,
        user_id: &str,
        request: &TransferRequest,
    ) -> Result<Transaction, ServiceError> {
        let wallet = request.source_wallet;
        if !wallet.is_sub_wallet() {
            return Err(ServiceError::Validation(format!(
                "{} is not a sub-wallet.",
                wallet.as_str()
            )));
        }

        let _guard = self.locks.lock(user_id).await;
        let user = self.active_user(user_id).await?;
        let settings = self.settings().await?;

        if request.amount_in_cents < settings.min_transfer_in_cents {
            return Err(ServiceError::Validation(format!(
                "Minimum transfer is {} cents.",
                settings.min_transfer_in_cents
            )));
        }

        let available = sub_wallets(&self.history(&user.id).await?)
            .get(wallet)
            .unwrap_or(0);
        if request.amount_in_cents > available {
            return Err(ServiceError::Validation(format!(
                "Insufficient {} balance.",
                wallet.as_str()
            )));
        }

        let transaction = self
            .insert(
                NewTransaction::new(
                    &user.id,
                    TransactionType::Transfer,
                    Category::Main,
                    request.amount_in_cents,
                    TransactionStatus::Approved,
                )
                .source_wallet(wallet),
            )
            .await?;

        self.repositories
            .users
            .increment_balance(&user.id, BalanceField::Free, request.amount_in_cents)
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        log::info!(
            "Moved {} cents from {} wallet to main for {}.",
            request.amount_in_cents,
            wallet.as_str(),
            user.id
        );
        Ok(transaction)
    }

    pub async fn request_premium(
        &self,
        user_id: &str,
        request: &PremiumRequest,
    ) -> Result<PendingPayment, ServiceError> {
        require("Method", &request.method)?;
        require("Sender number", &request.sender_number)?;
        require("Transaction id", &request.trx_id)?;

        let _guard = self.locks.lock(user_id).await;
        let user = self.active_user(user_id).await?;
        let settings = self.settings().await?;

        if !settings.premium_enabled {
            return Err(ServiceError::Validation(
                "Premium upgrades are disabled.".to_string(),
            ));
        }
        if user.is_premium() {
            return Err(ServiceError::Conflict("Account is already premium.".to_string()));
        }

        let open_request = self
            .repositories
            .transactions
            .list_transactions(
                &TransactionFilter::for_user(&user.id)
                    .transaction_type(TransactionType::Purchase)
                    .category(Category::Main)
                    .status(TransactionStatus::Pending),
            )
            .await
            .map_err(ServiceError::repository(SERVICE))?;
        if !open_request.is_empty() {
            return Err(ServiceError::Conflict(
                "A premium request is already pending.".to_string(),
            ));
        }

        let transaction = self
            .insert(
                NewTransaction::new(
                    &user.id,
                    TransactionType::Purchase,
                    Category::Main,
                    settings.premium_cost_in_cents,
                    TransactionStatus::Pending,
                )
                .payment(&request.method, &request.sender_number, Some(&request.trx_id))
                .details("Premium upgrade"),
            )
            .await?;

        log::info!("Premium upgrade {} requested by {}.", transaction.id, user.id);

        Ok(PendingPayment {
            transaction,
            pay_to: settings.premium_payment_number(&request.method).to_string(),
        })
    }

    pub async fn wallets(&self, user_id: &str) -> Result<Wallets, ServiceError> {
        let user = self.user(user_id).await?;
        let history = self.history(&user.id).await?;

        Ok(Wallets {
            balance_free_in_cents: user.balance_free_in_cents,
            balance_premium_in_cents: user.balance_premium_in_cents,
            sub_wallets: sub_wallets(&history),
        })
    }

    pub async fn stats(&self, user_id: &str) -> Result<UserStats, ServiceError> {
        let user = self.user(user_id).await?;
        Ok(user_stats(&self.history(&user.id).await?))
    }
}

#[async_trait]
impl RequestHandler<WalletRequest> for WalletRequestHandler {
    async fn handle_request(&self, request: WalletRequest) {
        match request {
            WalletRequest::Deposit {
                user_id,
                request,
                response,
            } => {
                let result = self.request_deposit(&user_id, &request).await;
                let _ = response.send(result);
            }
            WalletRequest::Withdraw {
                user_id,
                request,
                response,
            } => {
                let result = self.request_withdraw(&user_id, &request).await;
                let _ = response.send(result);
            }
            WalletRequest::Transfer {
                user_id,
                request,
                response,
            } => {
                let result = self.transfer(&user_id, &request).await;
                let _ = response.send(result);
            }
            WalletRequest::Premium {
                user_id,
                request,
                response,
            } => {
                let result = self.request_premium(&user_id, &request).await;
                let _ = response.send(result);
            }
            WalletRequest::Wallets { user_id, response } => {
                let result = self.wallets(&user_id).await;
                let _ = response.send(result);
            }
            WalletRequest::Stats { user_id, response } => {
                let result = self.stats(&user_id).await;
                let _ = response.send(result);
            }
            WalletRequest::History { user_id, response } => {
                let result = match self.user(&user_id).await {
                    Ok(user) => self.history(&user.id).await,
                    Err(e) => Err(e),
                };
                let _ = response.send(result);
            }
        }
    }
}

pub struct WalletService;

impl WalletService {
    pub fn new() -> Self {
        WalletService {}
    }
}

#[async_trait]
impl Service<WalletRequest, WalletRequestHandler> for WalletService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transactions::Decision;
    use crate::services::ledger::LedgerRequestHandler;
    use crate::services::testing::{seed_user, Fixture};
    use chrono::Utc;
    use rstest::rstest;

    fn withdraw(amount_in_cents: i64) -> WithdrawRequest {
        WithdrawRequest {
            amount_in_cents,
            method: "bkash".to_string(),
            receive_number: "01711111111".to_string(),
        }
    }

    fn row(
        transaction_type: TransactionType,
        category: Category,
        amount_in_cents: i64,
        status: TransactionStatus,
        source_wallet: Option<Category>,
    ) -> Transaction {
        Transaction {
            id: String::new(),
            user_id: "u".to_string(),
            transaction_type,
            category,
            amount_in_cents,
            status,
            method: None,
            sender_number: None,
            trx_id: None,
            source_wallet,
            details: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sub_wallet_nets_approved_rows_only() {
        use TransactionStatus::*;
        use TransactionType::*;

        let log = vec![
            row(Earning, Category::Task, 500, Approved, None),
            row(Earning, Category::Task, 300, Pending, None),
            row(Earning, Category::Task, 200, Rejected, None),
            row(Earning, Category::Quiz, 700, Approved, None),
            row(Transfer, Category::Main, 100, Approved, Some(Category::Task)),
            row(Transfer, Category::Main, 50, Approved, Some(Category::Quiz)),
        ];

        let wallets = sub_wallets(&log);
        assert_eq!(wallets.task, 400);
        assert_eq!(wallets.quiz, 650);
        assert_eq!(wallets.typing, 0);
        assert_eq!(wallets.get(Category::Task), Some(400));
        assert_eq!(wallets.get(Category::Main), None);
    }

    #[test]
    fn sub_wallet_never_negative() {
        let log = vec![row(
            TransactionType::Transfer,
            Category::Main,
            900,
            TransactionStatus::Approved,
            Some(Category::Sell),
        )];

        assert_eq!(sub_wallet_balance(&log, Category::Sell), 0);
    }

    #[test]
    fn stats_sum_by_status() {
        use TransactionStatus::*;
        use TransactionType::*;

        let log = vec![
            row(Earning, Category::Task, 500, Approved, None),
            row(Earning, Category::Task, 100, Pending, None),
            row(Withdraw, Category::Main, 2_000, Approved, None),
            row(Withdraw, Category::Main, 1_000, Pending, None),
            row(Withdraw, Category::Main, 700, Rejected, None),
        ];

        let stats = user_stats(&log);
        assert_eq!(stats.total_earned_in_cents, 500);
        assert_eq!(stats.total_withdraw_in_cents, 3_000);
        assert_eq!(stats.pending_withdraw_in_cents, 1_000);
    }

    #[tokio::test]
    async fn free_user_gets_one_withdrawal() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        fx.credit(&user.id, BalanceField::Free, 10_000).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());

        let pending = wallet.request_withdraw(&user.id, &withdraw(2_000)).await.unwrap();

        assert_eq!(pending.status, TransactionStatus::Pending);
        assert_eq!(pending.amount_in_cents, 2_000);
        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 8_000);

        for amount in [1, 500, 2_000] {
            let again = wallet.request_withdraw(&user.id, &withdraw(amount)).await;
            assert!(matches!(again, Err(ServiceError::Validation(_))));
        }
        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 8_000);
    }

    #[tokio::test]
    async fn rejected_withdrawal_restores_balance_and_quota() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        fx.credit(&user.id, BalanceField::Free, 10_000).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());
        let ledger = LedgerRequestHandler::new(fx.repositories.clone());

        let pending = wallet.request_withdraw(&user.id, &withdraw(2_000)).await.unwrap();
        ledger.settle(&pending.id, Decision::Rejected).await.unwrap();

        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 10_000);
        // a rejected request does not count against the free limit
        assert!(wallet.request_withdraw(&user.id, &withdraw(1_000)).await.is_ok());
    }

    #[tokio::test]
    async fn approved_withdrawal_keeps_escrow() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        fx.credit(&user.id, BalanceField::Free, 10_000).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());
        let ledger = LedgerRequestHandler::new(fx.repositories.clone());

        let pending = wallet.request_withdraw(&user.id, &withdraw(2_000)).await.unwrap();
        ledger.settle(&pending.id, Decision::Approved).await.unwrap();

        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 8_000);
        assert_eq!(wallet.stats(&user.id).await.unwrap().total_withdraw_in_cents, 2_000);
    }

    #[rstest]
    #[case(false, 2_001)]
    #[case(false, 0)]
    #[case(true, 9_999)]
    #[case(true, 60_000)]
    #[tokio::test]
    async fn withdrawal_admission_rejects(#[case] premium: bool, #[case] amount: i64) {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        fx.credit(&user.id, BalanceField::Free, 50_000).await;
        if premium {
            fx.make_premium(&user.id).await;
        }
        let wallet = WalletRequestHandler::new(fx.repositories.clone());

        let result = wallet.request_withdraw(&user.id, &withdraw(amount)).await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 50_000);
        assert!(fx
            .transactions(TransactionFilter::for_user(&user.id))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn premium_user_withdraws_repeatedly() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        fx.make_premium(&user.id).await;
        fx.credit(&user.id, BalanceField::Free, 30_000).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());

        wallet.request_withdraw(&user.id, &withdraw(10_000)).await.unwrap();
        wallet.request_withdraw(&user.id, &withdraw(10_000)).await.unwrap();

        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 10_000);
    }

    #[tokio::test]
    async fn transfer_moves_sub_wallet_into_main() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        fx.insert(&user.id, TransactionType::Earning, Category::Typing, 8_000, TransactionStatus::Approved)
            .await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());

        let request = TransferRequest {
            source_wallet: Category::Typing,
            amount_in_cents: 5_000,
        };
        let transfer = wallet.transfer(&user.id, &request).await.unwrap();

        assert_eq!(transfer.source_wallet, Some(Category::Typing));
        assert_eq!(transfer.category, Category::Main);
        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 5_000);
        let wallets = wallet.wallets(&user.id).await.unwrap();
        assert_eq!(wallets.sub_wallets.typing, 3_000);

        let overdraw = wallet.transfer(&user.id, &request).await;
        assert!(matches!(overdraw, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn transfer_requires_sub_wallet() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());

        let result = wallet
            .transfer(
                &user.id,
                &TransferRequest {
                    source_wallet: Category::Main,
                    amount_in_cents: 5_000,
                },
            )
            .await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn deposit_below_minimum_is_rejected() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());
        let mut request = DepositRequest {
            amount_in_cents: 4_999,
            method: "Bkash".to_string(),
            sender_number: "01711111111".to_string(),
            trx_id: "TRX1".to_string(),
        };

        assert!(matches!(
            wallet.request_deposit(&user.id, &request).await,
            Err(ServiceError::Validation(_))
        ));

        request.amount_in_cents = 5_000;
        let payment = wallet.request_deposit(&user.id, &request).await.unwrap();
        assert_eq!(payment.pay_to, "01700000000");
        assert_eq!(payment.transaction.trx_id.as_deref(), Some("TRX1"));
        assert_eq!(payment.transaction.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn premium_request_is_single_and_priced_from_settings() {
        let fx = Fixture::new();
        let user = seed_user(&fx, "user", None).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());
        let request = PremiumRequest {
            method: "nagad".to_string(),
            sender_number: "01711111111".to_string(),
            trx_id: "TRX2".to_string(),
        };

        let payment = wallet.request_premium(&user.id, &request).await.unwrap();
        assert_eq!(payment.transaction.amount_in_cents, 50_000);
        assert_eq!(payment.pay_to, "01800000000");

        assert!(matches!(
            wallet.request_premium(&user.id, &request).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_transfers_cannot_overdraw_sub_wallet() {
        let fx = Fixture::interleaving();
        let user = seed_user(&fx, "user", None).await;
        fx.insert(&user.id, TransactionType::Earning, Category::Typing, 8_000, TransactionStatus::Approved)
            .await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());
        let request = TransferRequest {
            source_wallet: Category::Typing,
            amount_in_cents: 5_000,
        };

        let (a, b) = tokio::join!(
            wallet.transfer(&user.id, &request),
            wallet.transfer(&user.id, &request)
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 5_000);
        assert_eq!(wallet.wallets(&user.id).await.unwrap().sub_wallets.typing, 3_000);
    }

    #[tokio::test]
    async fn concurrent_free_withdrawals_admit_one() {
        let fx = Fixture::interleaving();
        let user = seed_user(&fx, "user", None).await;
        fx.credit(&user.id, BalanceField::Free, 10_000).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());

        let (req_a, req_b) = (withdraw(2_000), withdraw(2_000));
        let (a, b) = tokio::join!(
            wallet.request_withdraw(&user.id, &req_a),
            wallet.request_withdraw(&user.id, &req_b)
        );

        assert!(a.is_ok() != b.is_ok());
        assert!(matches!(a.and(b), Err(ServiceError::Validation(_))));
        assert_eq!(fx.user(&user.id).await.balance_free_in_cents, 8_000);
        let withdrawals = fx
            .transactions(
                TransactionFilter::for_user(&user.id).transaction_type(TransactionType::Withdraw),
            )
            .await;
        assert_eq!(withdrawals.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_premium_requests_open_one_purchase() {
        let fx = Fixture::interleaving();
        let user = seed_user(&fx, "user", None).await;
        let wallet = WalletRequestHandler::new(fx.repositories.clone());
        let request = PremiumRequest {
            method: "bkash".to_string(),
            sender_number: "01711111111".to_string(),
            trx_id: "TRX3".to_string(),
        };

        let (a, b) = tokio::join!(
            wallet.request_premium(&user.id, &request),
            wallet.request_premium(&user.id, &request)
        );

        assert!(a.is_ok() != b.is_ok());
        let purchases = fx
            .transactions(
                TransactionFilter::for_user(&user.id).transaction_type(TransactionType::Purchase),
            )
            .await;
        assert_eq!(purchases.len(), 1);
    }
}
