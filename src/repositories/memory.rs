//! Process-local store with the same contract as the Postgres repositories.
//!
//! Used for `store.backend = "memory"` and by the service tests. Every
//! mutation of a single row happens under that row's map entry lock, which
//! gives the same per-row atomicity the SQL statements have.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{CatalogStore, SettingsStore, TransactionStore, UniqueViolation, UserStore};
use crate::models::catalog::{
    CatalogKind, NewQuizPackage, NewQuizQuestion, NewSalaryPlan, NewTask, NewTypingJob,
    QuizPackage, QuizQuestion, SalaryPlan, Task, TypingJob,
};
use crate::models::platform::PlatformSettings;
use crate::models::transactions::{
    NewTransaction, Transaction, TransactionFilter, TransactionStatus,
};
use crate::models::users::{AccountType, BalanceField, NewUser, User, UserPatch};

pub struct MemoryStore {
    users: DashMap<String, User>,
    transactions: DashMap<String, (u64, Transaction)>,
    settings: RwLock<Option<PlatformSettings>>,
    tasks: DashMap<String, Task>,
    typing_jobs: DashMap<String, TypingJob>,
    quiz_packages: DashMap<String, QuizPackage>,
    quiz_questions: DashMap<String, QuizQuestion>,
    salary_plans: DashMap<String, SalaryPlan>,
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            users: DashMap::new(),
            transactions: DashMap::new(),
            settings: RwLock::new(None),
            tasks: DashMap::new(),
            typing_jobs: DashMap::new(),
            quiz_packages: DashMap::new(),
            quiz_questions: DashMap::new(),
            salary_plans: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    fn new_id() -> String {
        Uuid::new_v4().hyphenated().to_string()
    }

    fn find_user(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }

    /// Rewires a referral link directly, bypassing registration checks.
    #[cfg(test)]
    pub fn set_upline(&self, id: &str, upline_ref_code: &str) {
        if let Some(mut user) = self.users.get_mut(id) {
            user.upline_ref_code = Some(upline_ref_code.to_string());
        }
    }

    #[cfg(test)]
    pub fn set_role(&self, id: &str, role: crate::models::users::Role) {
        if let Some(mut user) = self.users.get_mut(id) {
            user.role = role;
        }
    }

    fn update_user_with(&self, id: &str, apply: impl FnOnce(&mut User)) -> Option<User> {
        self.users.get_mut(id).map(|mut entry| {
            apply(entry.value_mut());
            entry.updated_at = Utc::now();
            entry.clone()
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, anyhow::Error> {
        if self.find_user(|u| u.phone == user.phone).is_some() {
            return Err(UniqueViolation("users_phone_key".to_string()).into());
        }
        if self.find_user(|u| u.ref_code == user.ref_code).is_some() {
            return Err(UniqueViolation("users_ref_code_key".to_string()).into());
        }

        let now = Utc::now();
        let user = User {
            id: Self::new_id(),
            full_name: user.full_name,
            phone: user.phone,
            email: user.email,
            password_hash: user.password_hash,
            ref_code: user.ref_code,
            upline_ref_code: user.upline_ref_code,
            role: user.role,
            account_type: user.account_type,
            balance_free_in_cents: 0,
            balance_premium_in_cents: 0,
            is_blocked: false,
            referral_job_quota: user.referral_job_quota,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.users.get(id).map(|entry| entry.value().clone()))
    }

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.find_user(|u| u.phone == phone))
    }

    async fn get_user_by_ref_code(&self, ref_code: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.find_user(|u| u.ref_code == ref_code))
    }

    async fn list_users(&self) -> Result<Vec<User>, anyhow::Error> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn list_downline(&self, ref_code: &str) -> Result<Vec<User>, anyhow::Error> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|e| e.upline_ref_code.as_deref() == Some(ref_code))
            .map(|e| e.value().clone())
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user(
        &self,
        id: &str,
        patch: &UserPatch,
    ) -> Result<Option<User>, anyhow::Error> {
        Ok(self.update_user_with(id, |user| {
            if let Some(full_name) = &patch.full_name {
                user.full_name = full_name.clone();
            }
            if let Some(email) = &patch.email {
                user.email = email.clone();
            }
            if let Some(phone) = &patch.phone {
                user.phone = phone.clone();
            }
            if let Some(balance) = patch.balance_free_in_cents {
                user.balance_free_in_cents = balance;
            }
            if let Some(balance) = patch.balance_premium_in_cents {
                user.balance_premium_in_cents = balance;
            }
            if let Some(account_type) = patch.account_type {
                user.account_type = account_type;
            }
            if let Some(is_blocked) = patch.is_blocked {
                user.is_blocked = is_blocked;
            }
            if let Some(quota) = patch.referral_job_quota {
                user.referral_job_quota = quota;
            }
        }))
    }

    async fn set_account_type(
        &self,
        id: &str,
        account_type: AccountType,
    ) -> Result<Option<User>, anyhow::Error> {
        Ok(self.update_user_with(id, |user| user.account_type = account_type))
    }

    async fn increment_balance(
        &self,
        id: &str,
        field: BalanceField,
        delta: i64,
    ) -> Result<Option<User>, anyhow::Error> {
        let Some(mut entry) = self.users.get_mut(id) else {
            return Ok(None);
        };

        let balance = match field {
            BalanceField::Free => &mut entry.balance_free_in_cents,
            BalanceField::Premium => &mut entry.balance_premium_in_cents,
        };
        *balance = balance
            .checked_add(delta)
            .ok_or_else(|| anyhow::anyhow!("bigint out of range updating {}", field.column()))?;
        entry.updated_at = Utc::now();

        Ok(Some(entry.clone()))
    }

    async fn try_debit(
        &self,
        id: &str,
        field: BalanceField,
        amount: i64,
    ) -> Result<Option<User>, anyhow::Error> {
        let Some(mut entry) = self.users.get_mut(id) else {
            return Ok(None);
        };

        if entry.balance(field) < amount {
            return Ok(None);
        }

        match field {
            BalanceField::Free => entry.balance_free_in_cents -= amount,
            BalanceField::Premium => entry.balance_premium_in_cents -= amount,
        }
        entry.updated_at = Utc::now();

        Ok(Some(entry.clone()))
    }

    async fn increment_referral_quota(
        &self,
        id: &str,
        delta: i32,
    ) -> Result<Option<User>, anyhow::Error> {
        Ok(self.update_user_with(id, |user| {
            user.referral_job_quota = (user.referral_job_quota + delta).max(0)
        }))
    }

    async fn delete_user(&self, id: &str) -> Result<bool, anyhow::Error> {
        Ok(self.users.remove(id).is_some())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, anyhow::Error> {
        let now = Utc::now();
        let transaction = Transaction {
            id: Self::new_id(),
            user_id: transaction.user_id,
            transaction_type: transaction.transaction_type,
            category: transaction.category,
            amount_in_cents: transaction.amount_in_cents,
            status: transaction.status,
            method: transaction.method,
            sender_number: transaction.sender_number,
            trx_id: transaction.trx_id,
            source_wallet: transaction.source_wallet,
            details: transaction.details,
            created_at: now,
            updated_at: now,
        };

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.transactions
            .insert(transaction.id.clone(), (sequence, transaction.clone()));

        Ok(transaction)
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, anyhow::Error> {
        Ok(self.transactions.get(id).map(|entry| entry.1.clone()))
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, anyhow::Error> {
        let mut rows: Vec<(u64, Transaction)> = self
            .transactions
            .iter()
            .filter(|entry| filter.matches(&entry.1))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(rows.into_iter().map(|(_, transaction)| transaction).collect())
    }

    async fn transition_status(
        &self,
        id: &str,
        from: &[TransactionStatus],
        to: TransactionStatus,
        details: Option<&str>,
    ) -> Result<Option<Transaction>, anyhow::Error> {
        let Some(mut entry) = self.transactions.get_mut(id) else {
            return Ok(None);
        };

        let transaction = &mut entry.1;
        if !from.contains(&transaction.status) {
            return Ok(None);
        }

        transaction.status = to;
        if let Some(details) = details {
            transaction.details = Some(details.to_string());
        }
        transaction.updated_at = Utc::now();

        Ok(Some(transaction.clone()))
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<PlatformSettings, anyhow::Error> {
        let settings = self
            .settings
            .read()
            .map_err(|e| anyhow::anyhow!("settings lock poisoned: {}", e))?;

        Ok(settings.clone().unwrap_or_default())
    }

    async fn save(&self, settings: &PlatformSettings) -> Result<(), anyhow::Error> {
        let mut stored = self
            .settings
            .write()
            .map_err(|e| anyhow::anyhow!("settings lock poisoned: {}", e))?;
        *stored = Some(settings.clone());

        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_task(&self, task: NewTask) -> Result<Task, anyhow::Error> {
        let task = Task {
            id: Self::new_id(),
            title: task.title,
            description: task.description,
            reward_in_cents: task.reward_in_cents,
            link: task.link,
            image: task.image,
            kind: task.kind,
            created_at: Utc::now(),
        };
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, anyhow::Error> {
        let mut tasks: Vec<Task> = self.tasks.iter().map(|e| e.value().clone()).collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, anyhow::Error> {
        Ok(self.tasks.get(id).map(|e| e.value().clone()))
    }

    async fn insert_typing_job(&self, job: NewTypingJob) -> Result<TypingJob, anyhow::Error> {
        let job = TypingJob {
            id: Self::new_id(),
            text: job.text,
            reward_in_cents: job.reward_in_cents,
            link: job.link,
            wait_time_secs: job.wait_time_secs,
            category: job.category,
            created_at: Utc::now(),
        };
        self.typing_jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    async fn list_typing_jobs(&self) -> Result<Vec<TypingJob>, anyhow::Error> {
        let mut jobs: Vec<TypingJob> = self.typing_jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn get_typing_job(&self, id: &str) -> Result<Option<TypingJob>, anyhow::Error> {
        Ok(self.typing_jobs.get(id).map(|e| e.value().clone()))
    }

    async fn insert_quiz_package(
        &self,
        package: NewQuizPackage,
    ) -> Result<QuizPackage, anyhow::Error> {
        let package = QuizPackage {
            id: Self::new_id(),
            name: package.name,
            description: package.description,
            price_in_cents: package.price_in_cents,
            duration_days: package.duration_days,
            daily_limit: package.daily_limit,
            profit_in_cents: package.profit_in_cents,
            created_at: Utc::now(),
        };
        self.quiz_packages.insert(package.id.clone(), package.clone());
        Ok(package)
    }

    async fn list_quiz_packages(&self) -> Result<Vec<QuizPackage>, anyhow::Error> {
        let mut packages: Vec<QuizPackage> =
            self.quiz_packages.iter().map(|e| e.value().clone()).collect();
        packages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(packages)
    }

    async fn get_quiz_package(&self, id: &str) -> Result<Option<QuizPackage>, anyhow::Error> {
        Ok(self.quiz_packages.get(id).map(|e| e.value().clone()))
    }

    async fn insert_quiz_question(
        &self,
        question: NewQuizQuestion,
    ) -> Result<QuizQuestion, anyhow::Error> {
        if !self.quiz_packages.contains_key(&question.package_id) {
            anyhow::bail!("insert on quiz_list violates foreign key \"quiz_list_package_id_fkey\"");
        }

        let question = QuizQuestion {
            id: Self::new_id(),
            package_id: question.package_id,
            question: question.question,
            answer: question.answer,
            reward_in_cents: question.reward_in_cents,
            wait_secs: question.wait_secs,
            ad_link: question.ad_link,
            created_at: Utc::now(),
        };
        self.quiz_questions
            .insert(question.id.clone(), question.clone());
        Ok(question)
    }

    async fn list_quiz_questions(
        &self,
        package_id: Option<&str>,
    ) -> Result<Vec<QuizQuestion>, anyhow::Error> {
        let mut questions: Vec<QuizQuestion> = self
            .quiz_questions
            .iter()
            .filter(|e| package_id.map_or(true, |id| e.package_id == id))
            .map(|e| e.value().clone())
            .collect();
        questions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(questions)
    }

    async fn get_quiz_question(&self, id: &str) -> Result<Option<QuizQuestion>, anyhow::Error> {
        Ok(self.quiz_questions.get(id).map(|e| e.value().clone()))
    }

    async fn insert_salary_plan(&self, plan: NewSalaryPlan) -> Result<SalaryPlan, anyhow::Error> {
        let plan = SalaryPlan {
            id: Self::new_id(),
            title: plan.title,
            description: plan.description,
            target_refers: plan.target_refers,
            reward_in_cents: plan.reward_in_cents,
            required_packages: plan.required_packages,
            created_at: Utc::now(),
        };
        self.salary_plans.insert(plan.id.clone(), plan.clone());
        Ok(plan)
    }

    async fn list_salary_plans(&self) -> Result<Vec<SalaryPlan>, anyhow::Error> {
        let mut plans: Vec<SalaryPlan> =
            self.salary_plans.iter().map(|e| e.value().clone()).collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }

    async fn get_salary_plan(&self, id: &str) -> Result<Option<SalaryPlan>, anyhow::Error> {
        Ok(self.salary_plans.get(id).map(|e| e.value().clone()))
    }

    async fn delete_item(&self, kind: CatalogKind, id: &str) -> Result<bool, anyhow::Error> {
        let removed = match kind {
            CatalogKind::Tasks => self.tasks.remove(id).is_some(),
            CatalogKind::TypingJobs => self.typing_jobs.remove(id).is_some(),
            CatalogKind::QuizPackages => {
                self.quiz_questions.retain(|_, q| q.package_id != id);
                self.quiz_packages.remove(id).is_some()
            }
            CatalogKind::QuizQuestions => self.quiz_questions.remove(id).is_some(),
            CatalogKind::SalaryPlans => self.salary_plans.remove(id).is_some(),
        };

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transactions::{Category, TransactionType};
    use crate::models::users::Role;

    fn new_user(phone: &str, ref_code: &str) -> NewUser {
        NewUser {
            full_name: "Test".to_string(),
            phone: phone.to_string(),
            email: String::new(),
            password_hash: String::new(),
            ref_code: ref_code.to_string(),
            upline_ref_code: None,
            role: Role::User,
            account_type: AccountType::Free,
            referral_job_quota: 2,
        }
    }

    #[tokio::test]
    async fn try_debit_refuses_overdraft() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("01700000001", "100001")).await.unwrap();
        store
            .increment_balance(&user.id, BalanceField::Free, 500)
            .await
            .unwrap();

        let short = store.try_debit(&user.id, BalanceField::Free, 501).await.unwrap();
        assert!(short.is_none());

        let debited = store
            .try_debit(&user.id, BalanceField::Free, 500)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(debited.balance_free_in_cents, 0);
    }

    #[tokio::test]
    async fn rejects_duplicate_phone() {
        let store = MemoryStore::new();
        store.insert_user(new_user("01700000001", "100001")).await.unwrap();

        let result = store.insert_user(new_user("01700000001", "100002")).await;
        assert!(result.is_err_and(|e| crate::repositories::is_unique_violation(&e)));
    }

    #[tokio::test]
    async fn balance_overflow_is_an_error() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("01700000001", "100001")).await.unwrap();
        store
            .increment_balance(&user.id, BalanceField::Premium, i64::MAX)
            .await
            .unwrap();

        let result = store
            .increment_balance(&user.id, BalanceField::Premium, 1)
            .await;

        assert!(result.is_err());
        let stored = store.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.balance_premium_in_cents, i64::MAX);
    }

    #[tokio::test]
    async fn transition_only_from_accepted_states() {
        let store = MemoryStore::new();
        let transaction = store
            .insert_transaction(NewTransaction::new(
                "u1",
                TransactionType::Deposit,
                Category::Main,
                100,
                TransactionStatus::Pending,
            ))
            .await
            .unwrap();

        let first = store
            .transition_status(
                &transaction.id,
                &TransactionStatus::OPEN,
                TransactionStatus::Approved,
                None,
            )
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .transition_status(
                &transaction.id,
                &TransactionStatus::OPEN,
                TransactionStatus::Rejected,
                None,
            )
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn lists_newest_first() {
        let store = MemoryStore::new();
        for amount in [1, 2, 3] {
            store
                .insert_transaction(NewTransaction::new(
                    "u1",
                    TransactionType::Earning,
                    Category::Quiz,
                    amount,
                    TransactionStatus::Approved,
                ))
                .await
                .unwrap();
        }

        let amounts: Vec<i64> = store
            .list_transactions(&TransactionFilter::for_user("u1"))
            .await
            .unwrap()
            .iter()
            .map(|t| t.amount_in_cents)
            .collect();
        assert_eq!(amounts, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn deleting_package_drops_its_questions() {
        let store = MemoryStore::new();
        let package = store
            .insert_quiz_package(NewQuizPackage {
                name: "Starter".to_string(),
                description: String::new(),
                price_in_cents: 1000,
                duration_days: 30,
                daily_limit: 10,
                profit_in_cents: 0,
            })
            .await
            .unwrap();
        store
            .insert_quiz_question(NewQuizQuestion {
                package_id: package.id.clone(),
                question: "2 + 2?".to_string(),
                answer: "4".to_string(),
                reward_in_cents: 50,
                wait_secs: 5,
                ad_link: String::new(),
            })
            .await
            .unwrap();

        assert!(store
            .delete_item(CatalogKind::QuizPackages, &package.id)
            .await
            .unwrap());
        assert!(store.list_quiz_questions(None).await.unwrap().is_empty());
    }
}
