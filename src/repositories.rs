use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::catalog::{
    CatalogKind, NewQuizPackage, NewQuizQuestion, NewSalaryPlan, NewTask, NewTypingJob,
    QuizPackage, QuizQuestion, SalaryPlan, Task, TypingJob,
};
use crate::models::platform::PlatformSettings;
use crate::models::transactions::{
    NewTransaction, Transaction, TransactionFilter, TransactionStatus,
};
use crate::models::users::{AccountType, BalanceField, NewUser, User, UserPatch};

pub mod catalog;
pub mod memory;
pub mod settings;
pub mod transactions;
pub mod users;

/// A write rejected because a unique column (phone, ref code) already holds
/// the value.
#[derive(Debug, thiserror::Error)]
#[error("duplicate key value violates unique constraint \"{0}\"")]
pub struct UniqueViolation(pub String);

/// True when a store error is a unique-key violation, from Postgres or from
/// the in-memory store.
pub fn is_unique_violation(error: &anyhow::Error) -> bool {
    if error.downcast_ref::<UniqueViolation>().is_some() {
        return true;
    }

    matches!(
        error.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User, anyhow::Error>;

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error>;

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>, anyhow::Error>;

    async fn get_user_by_ref_code(&self, ref_code: &str) -> Result<Option<User>, anyhow::Error>;

    async fn list_users(&self) -> Result<Vec<User>, anyhow::Error>;

    /// Users whose upline code is `ref_code`.
    async fn list_downline(&self, ref_code: &str) -> Result<Vec<User>, anyhow::Error>;

    async fn update_user(&self, id: &str, patch: &UserPatch)
        -> Result<Option<User>, anyhow::Error>;

    async fn set_account_type(
        &self,
        id: &str,
        account_type: AccountType,
    ) -> Result<Option<User>, anyhow::Error>;

    /// Atomically adds `delta` to a balance. Returns `None` if the user is gone.
    async fn increment_balance(
        &self,
        id: &str,
        field: BalanceField,
        delta: i64,
    ) -> Result<Option<User>, anyhow::Error>;

    /// Atomically subtracts `amount` only if the balance covers it.
    /// Returns `None` when the user is gone or the balance is short.
    async fn try_debit(
        &self,
        id: &str,
        field: BalanceField,
        amount: i64,
    ) -> Result<Option<User>, anyhow::Error>;

    /// Adds `delta` to the referral job quota, floored at zero.
    async fn increment_referral_quota(
        &self,
        id: &str,
        delta: i32,
    ) -> Result<Option<User>, anyhow::Error>;

    async fn delete_user(&self, id: &str) -> Result<bool, anyhow::Error>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, anyhow::Error>;

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, anyhow::Error>;

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, anyhow::Error>;

    /// Compare-and-set on the status column: moves the row to `to` only if its
    /// current status is one of `from`, optionally replacing `details`.
    /// Returns `None` when the row is missing or was not in an accepted state.
    async fn transition_status(
        &self,
        id: &str,
        from: &[TransactionStatus],
        to: TransactionStatus,
        details: Option<&str>,
    ) -> Result<Option<Transaction>, anyhow::Error>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current settings, or the defaults when nothing was saved yet.
    async fn load(&self) -> Result<PlatformSettings, anyhow::Error>;

    async fn save(&self, settings: &PlatformSettings) -> Result<(), anyhow::Error>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_task(&self, task: NewTask) -> Result<Task, anyhow::Error>;
    async fn list_tasks(&self) -> Result<Vec<Task>, anyhow::Error>;
    async fn get_task(&self, id: &str) -> Result<Option<Task>, anyhow::Error>;

    async fn insert_typing_job(&self, job: NewTypingJob) -> Result<TypingJob, anyhow::Error>;
    async fn list_typing_jobs(&self) -> Result<Vec<TypingJob>, anyhow::Error>;
    async fn get_typing_job(&self, id: &str) -> Result<Option<TypingJob>, anyhow::Error>;

    async fn insert_quiz_package(
        &self,
        package: NewQuizPackage,
    ) -> Result<QuizPackage, anyhow::Error>;
    async fn list_quiz_packages(&self) -> Result<Vec<QuizPackage>, anyhow::Error>;
    async fn get_quiz_package(&self, id: &str) -> Result<Option<QuizPackage>, anyhow::Error>;

    async fn insert_quiz_question(
        &self,
        question: NewQuizQuestion,
    ) -> Result<QuizQuestion, anyhow::Error>;
    async fn list_quiz_questions(
        &self,
        package_id: Option<&str>,
    ) -> Result<Vec<QuizQuestion>, anyhow::Error>;
    async fn get_quiz_question(&self, id: &str) -> Result<Option<QuizQuestion>, anyhow::Error>;

    async fn insert_salary_plan(&self, plan: NewSalaryPlan) -> Result<SalaryPlan, anyhow::Error>;
    async fn list_salary_plans(&self) -> Result<Vec<SalaryPlan>, anyhow::Error>;
    async fn get_salary_plan(&self, id: &str) -> Result<Option<SalaryPlan>, anyhow::Error>;

    /// Deletes one row. Deleting a quiz package also drops its questions.
    async fn delete_item(&self, kind: CatalogKind, id: &str) -> Result<bool, anyhow::Error>;
}

/// Handles to every table, shared by the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub catalog: Arc<dyn CatalogStore>,
}

impl Repositories {
    pub fn postgres(conn: PgPool) -> Self {
        Repositories {
            users: Arc::new(users::UserRepository::new(conn.clone())),
            transactions: Arc::new(transactions::TransactionRepository::new(conn.clone())),
            settings: Arc::new(settings::SettingsRepository::new(conn.clone())),
            catalog: Arc::new(catalog::CatalogRepository::new(conn)),
        }
    }

    pub fn memory() -> Self {
        Self::from_memory(Arc::new(memory::MemoryStore::new()))
    }

    pub fn from_memory(store: Arc<memory::MemoryStore>) -> Self {
        Repositories {
            users: store.clone(),
            transactions: store.clone(),
            settings: store.clone(),
            catalog: store,
        }
    }
}
