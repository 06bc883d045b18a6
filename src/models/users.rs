use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Free,
    Premium,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Free => "free",
            AccountType::Premium => "premium",
        }
    }
}

/// Which stored balance an atomic increment targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceField {
    /// Main, withdrawable balance.
    Free,
    /// Deposit balance, spent on premium status and packages.
    Premium,
}

impl BalanceField {
    pub fn column(&self) -> &'static str {
        match self {
            BalanceField::Free => "balance_free_in_cents",
            BalanceField::Premium => "balance_premium_in_cents",
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub ref_code: String,
    pub upline_ref_code: Option<String>,
    pub role: Role,
    pub account_type: AccountType,
    pub balance_free_in_cents: i64,
    pub balance_premium_in_cents: i64,
    pub is_blocked: bool,
    pub referral_job_quota: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_premium(&self) -> bool {
        self.account_type == AccountType::Premium
    }

    pub fn balance(&self, field: BalanceField) -> i64 {
        match field {
            BalanceField::Free => self.balance_free_in_cents,
            BalanceField::Premium => self.balance_premium_in_cents,
        }
    }
}

/// What a referrer sees of a direct referral. Ids stay out: `x-user-id` is
/// the caller's only credential.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Referral {
    pub full_name: String,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

impl From<User> for Referral {
    fn from(user: User) -> Self {
        Referral {
            full_name: user.full_name,
            account_type: user.account_type,
            created_at: user.created_at,
        }
    }
}

/// Row handed to the store when an account is created.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub ref_code: String,
    pub upline_ref_code: Option<String>,
    pub role: Role,
    pub account_type: AccountType,
    pub referral_job_quota: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegisterUser {
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    pub ref_code: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

/// Admin edit of an account. Absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub balance_free_in_cents: Option<i64>,
    pub balance_premium_in_cents: Option<i64>,
    pub account_type: Option<AccountType>,
    pub is_blocked: Option<bool>,
    pub referral_job_quota: Option<i32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserStats {
    pub total_earned_in_cents: i64,
    pub total_withdraw_in_cents: i64,
    pub pending_withdraw_in_cents: i64,
}
