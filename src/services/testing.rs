//! Shared fixtures for service tests, backed by the in-memory store.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::platform::PlatformSettings;
use crate::models::transactions::{
    Category, NewTransaction, Transaction, TransactionFilter, TransactionStatus, TransactionType,
};
use crate::models::users::{AccountType, BalanceField, NewUser, Role, User, UserPatch};
use crate::repositories::memory::MemoryStore;
use crate::repositories::{Repositories, TransactionStore, UserStore};

static NEXT_USER: AtomicU32 = AtomicU32::new(0);

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub repositories: Repositories,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let repositories = Repositories::from_memory(store.clone());

        Fixture {
            store,
            repositories,
        }
    }

    /// Like `new`, but user and ledger reads yield to the scheduler after
    /// they return, so requests joined on one task interleave between their
    /// checks and their writes.
    pub fn interleaving() -> Self {
        let store = Arc::new(MemoryStore::new());
        let yielding = Arc::new(YieldingStore(store.clone()));
        let repositories = Repositories {
            users: yielding.clone(),
            transactions: yielding,
            settings: store.clone(),
            catalog: store.clone(),
        };

        Fixture {
            store,
            repositories,
        }
    }

    pub fn set_upline(&self, user_id: &str, upline_ref_code: &str) {
        self.store.set_upline(user_id, upline_ref_code);
    }

    pub async fn user(&self, user_id: &str) -> User {
        self.repositories
            .users
            .get_user_by_id(user_id)
            .await
            .unwrap()
            .expect("user exists")
    }

    pub async fn credit(&self, user_id: &str, field: BalanceField, amount_in_cents: i64) {
        self.repositories
            .users
            .increment_balance(user_id, field, amount_in_cents)
            .await
            .unwrap();
    }

    pub async fn make_premium(&self, user_id: &str) {
        self.repositories
            .users
            .set_account_type(user_id, AccountType::Premium)
            .await
            .unwrap();
    }

    pub async fn save_settings(&self, settings: &PlatformSettings) {
        self.repositories.settings.save(settings).await.unwrap();
    }

    pub async fn insert(
        &self,
        user_id: &str,
        transaction_type: TransactionType,
        category: Category,
        amount_in_cents: i64,
        status: TransactionStatus,
    ) -> Transaction {
        self.repositories
            .transactions
            .insert_transaction(NewTransaction::new(
                user_id,
                transaction_type,
                category,
                amount_in_cents,
                status,
            ))
            .await
            .unwrap()
    }

    pub async fn transactions(&self, filter: TransactionFilter) -> Vec<Transaction> {
        self.repositories
            .transactions
            .list_transactions(&filter)
            .await
            .unwrap()
    }
}

/// Inserts a free user named `full_name` with a fresh phone and ref code.
pub async fn seed_user(fx: &Fixture, full_name: &str, upline_ref_code: Option<&str>) -> User {
    let n = NEXT_USER.fetch_add(1, Ordering::SeqCst);

    fx.repositories
        .users
        .insert_user(NewUser {
            full_name: full_name.to_string(),
            phone: format!("0190{:07}", n),
            email: format!("{}@example.com", full_name),
            password_hash: String::new(),
            ref_code: format!("{:06}", 300_000 + n),
            upline_ref_code: upline_ref_code.map(str::to_string),
            role: Role::User,
            account_type: AccountType::Free,
            referral_job_quota: 2,
        })
        .await
        .unwrap()
}

pub async fn seed_admin(fx: &Fixture) -> User {
    let admin = seed_user(fx, "admin", None).await;
    fx.store.set_role(&admin.id, Role::Admin);
    fx.user(&admin.id).await
}

struct YieldingStore(Arc<MemoryStore>);

#[async_trait]
impl UserStore for YieldingStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, anyhow::Error> {
        self.0.insert_user(user).await
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error> {
        let user = self.0.get_user_by_id(id).await;
        tokio::task::yield_now().await;
        user
    }

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>, anyhow::Error> {
        let user = self.0.get_user_by_phone(phone).await;
        tokio::task::yield_now().await;
        user
    }

    async fn get_user_by_ref_code(&self, ref_code: &str) -> Result<Option<User>, anyhow::Error> {
        self.0.get_user_by_ref_code(ref_code).await
    }

    async fn list_users(&self) -> Result<Vec<User>, anyhow::Error> {
        self.0.list_users().await
    }

    async fn list_downline(&self, ref_code: &str) -> Result<Vec<User>, anyhow::Error> {
        self.0.list_downline(ref_code).await
    }

    async fn update_user(
        &self,
        id: &str,
        patch: &UserPatch,
    ) -> Result<Option<User>, anyhow::Error> {
        self.0.update_user(id, patch).await
    }

    async fn set_account_type(
        &self,
        id: &str,
        account_type: AccountType,
    ) -> Result<Option<User>, anyhow::Error> {
        self.0.set_account_type(id, account_type).await
    }

    async fn increment_balance(
        &self,
        id: &str,
        field: BalanceField,
        delta: i64,
    ) -> Result<Option<User>, anyhow::Error> {
        self.0.increment_balance(id, field, delta).await
    }

    async fn try_debit(
        &self,
        id: &str,
        field: BalanceField,
        amount: i64,
    ) -> Result<Option<User>, anyhow::Error> {
        self.0.try_debit(id, field, amount).await
    }

    async fn increment_referral_quota(
        &self,
        id: &str,
        delta: i32,
    ) -> Result<Option<User>, anyhow::Error> {
        self.0.increment_referral_quota(id, delta).await
    }

    async fn delete_user(&self, id: &str) -> Result<bool, anyhow::Error> {
        self.0.delete_user(id).await
    }
}

#[async_trait]
impl TransactionStore for YieldingStore {
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, anyhow::Error> {
        self.0.insert_transaction(transaction).await
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, anyhow::Error> {
        let transaction = self.0.get_transaction(id).await;
        tokio::task::yield_now().await;
        transaction
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, anyhow::Error> {
        let transactions = self.0.list_transactions(filter).await;
        tokio::task::yield_now().await;
        transactions
    }

    async fn transition_status(
        &self,
        id: &str,
        from: &[TransactionStatus],
        to: TransactionStatus,
        details: Option<&str>,
    ) -> Result<Option<Transaction>, anyhow::Error> {
        self.0.transition_status(id, from, to, details).await
    }
}
