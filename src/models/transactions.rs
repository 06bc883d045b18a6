use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Earning,
    Transfer,
    Bonus,
    Purchase,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::Earning => "earning",
            TransactionType::Transfer => "transfer",
            TransactionType::Bonus => "bonus",
            TransactionType::Purchase => "purchase",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Task,
    Typing,
    Sell,
    Quiz,
    Salary,
    Main,
    Referral,
    TypingPackage,
    QuizPackage,
    GmailRequest,
}

impl Category {
    /// Categories that own a derived sub-wallet.
    pub const SUB_WALLETS: [Category; 5] = [
        Category::Task,
        Category::Typing,
        Category::Quiz,
        Category::Sell,
        Category::Salary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Task => "task",
            Category::Typing => "typing",
            Category::Sell => "sell",
            Category::Quiz => "quiz",
            Category::Salary => "salary",
            Category::Main => "main",
            Category::Referral => "referral",
            Category::TypingPackage => "typing_package",
            Category::QuizPackage => "quiz_package",
            Category::GmailRequest => "gmail_request",
        }
    }

    pub fn is_sub_wallet(&self) -> bool {
        Self::SUB_WALLETS.contains(self)
    }
}

/// Settlement state of a ledger entry.
///
/// `Pending` and the account-sale negotiation states are open; `Approved` and
/// `Rejected` are terminal and accept no further transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    PendingCreds,
    Working,
    PendingRecovery,
    Finalizing,
    Review,
}

impl TransactionStatus {
    pub const OPEN: [TransactionStatus; 6] = [
        TransactionStatus::Pending,
        TransactionStatus::PendingCreds,
        TransactionStatus::Working,
        TransactionStatus::PendingRecovery,
        TransactionStatus::Finalizing,
        TransactionStatus::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Rejected => "rejected",
            TransactionStatus::PendingCreds => "pending_creds",
            TransactionStatus::Working => "working",
            TransactionStatus::PendingRecovery => "pending_recovery",
            TransactionStatus::Finalizing => "finalizing",
            TransactionStatus::Review => "review",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Approved | TransactionStatus::Rejected
        )
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;

        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Approved) | (_, Rejected) => true,
            (PendingCreds, Working)
            | (Working, PendingRecovery)
            | (PendingRecovery, Finalizing)
            | (Finalizing, Review) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for TransactionStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => TransactionStatus::Approved,
            Decision::Rejected => TransactionStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub category: Category,
    pub amount_in_cents: i64,
    pub status: TransactionStatus,
    pub method: Option<String>,
    pub sender_number: Option<String>,
    pub trx_id: Option<String>,
    pub source_wallet: Option<Category>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_approved(&self) -> bool {
        self.status == TransactionStatus::Approved
    }

    pub fn has_details(&self, details: &str) -> bool {
        self.details.as_deref() == Some(details)
    }
}

#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub user_id: String,
    pub transaction_type: TransactionType,
    pub category: Category,
    pub amount_in_cents: i64,
    pub status: TransactionStatus,
    pub method: Option<String>,
    pub sender_number: Option<String>,
    pub trx_id: Option<String>,
    pub source_wallet: Option<Category>,
    pub details: Option<String>,
}

impl NewTransaction {
    pub fn new(
        user_id: &str,
        transaction_type: TransactionType,
        category: Category,
        amount_in_cents: i64,
        status: TransactionStatus,
    ) -> Self {
        NewTransaction {
            user_id: user_id.to_string(),
            transaction_type,
            category,
            amount_in_cents,
            status,
            method: None,
            sender_number: None,
            trx_id: None,
            source_wallet: None,
            details: None,
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn payment(mut self, method: &str, sender_number: &str, trx_id: Option<&str>) -> Self {
        self.method = Some(method.to_string());
        self.sender_number = Some(sender_number.to_string());
        self.trx_id = trx_id.map(str::to_string);
        self
    }

    pub fn source_wallet(mut self, source_wallet: Category) -> Self {
        self.source_wallet = Some(source_wallet);
        self
    }
}

/// Equality filters for ledger queries. Results are always newest first.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TransactionFilter {
    pub user_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<TransactionType>,
    pub category: Option<Category>,
}

impl TransactionFilter {
    pub fn for_user(user_id: &str) -> Self {
        TransactionFilter {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        }
    }

    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.user_id
            .as_deref()
            .map_or(true, |id| transaction.user_id == id)
            && self.status.map_or(true, |s| transaction.status == s)
            && self
                .transaction_type
                .map_or(true, |t| transaction.transaction_type == t)
            && self.category.map_or(true, |c| transaction.category == c)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct DepositRequest {
    pub amount_in_cents: i64,
    pub method: String,
    pub sender_number: String,
    pub trx_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WithdrawRequest {
    pub amount_in_cents: i64,
    pub method: String,
    pub receive_number: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransferRequest {
    pub source_wallet: Category,
    pub amount_in_cents: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PremiumRequest {
    pub method: String,
    pub sender_number: String,
    pub trx_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SettleRequest {
    pub decision: Decision,
}
