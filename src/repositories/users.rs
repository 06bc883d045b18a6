use crate::models::users::{self, AccountType, BalanceField, NewUser, UserPatch};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::UserStore;

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn insert_user(&self, user: NewUser) -> Result<users::User, anyhow::Error> {
        let user_id = Uuid::new_v4().hyphenated().to_string();

        let user = sqlx::query_as::<_, users::User>(
            r#"
                INSERT INTO users
                (id, full_name, phone, email, password_hash, ref_code, upline_ref_code,
                 role, account_type, referral_job_quota)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(user.full_name)
        .bind(user.phone)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.ref_code)
        .bind(user.upline_ref_code)
        .bind(user.role)
        .bind(user.account_type)
        .bind(user.referral_job_quota)
        .fetch_one(&self.conn)
        .await?;

        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: &str) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn get_user_by_phone(&self, phone: &str) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>("SELECT * FROM users WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn get_user_by_ref_code(
        &self,
        ref_code: &str,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>("SELECT * FROM users WHERE ref_code = $1")
            .bind(ref_code)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<users::User>, anyhow::Error> {
        let users =
            sqlx::query_as::<_, users::User>("SELECT * FROM users ORDER BY created_at DESC")
                .fetch_all(&self.conn)
                .await?;

        Ok(users)
    }

    async fn list_downline(&self, ref_code: &str) -> Result<Vec<users::User>, anyhow::Error> {
        let users = sqlx::query_as::<_, users::User>(
            "SELECT * FROM users WHERE upline_ref_code = $1 ORDER BY created_at DESC",
        )
        .bind(ref_code)
        .fetch_all(&self.conn)
        .await?;

        Ok(users)
    }

    async fn update_user(
        &self,
        user_id: &str,
        patch: &UserPatch,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(
            r#"
                UPDATE users SET
                    full_name = COALESCE($2, full_name),
                    email = COALESCE($3, email),
                    phone = COALESCE($4, phone),
                    balance_free_in_cents = COALESCE($5, balance_free_in_cents),
                    balance_premium_in_cents = COALESCE($6, balance_premium_in_cents),
                    account_type = COALESCE($7, account_type),
                    is_blocked = COALESCE($8, is_blocked),
                    referral_job_quota = COALESCE($9, referral_job_quota),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&patch.full_name)
        .bind(&patch.email)
        .bind(&patch.phone)
        .bind(patch.balance_free_in_cents)
        .bind(patch.balance_premium_in_cents)
        .bind(patch.account_type.map(|a| a.as_str()))
        .bind(patch.is_blocked)
        .bind(patch.referral_job_quota)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn set_account_type(
        &self,
        user_id: &str,
        account_type: AccountType,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(
            "UPDATE users SET account_type = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
        )
        .bind(account_type)
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn increment_balance(
        &self,
        user_id: &str,
        field: BalanceField,
        delta: i64,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let column = field.column();
        let query = format!(
            "UPDATE users SET {column} = {column} + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *"
        );

        let user = sqlx::query_as::<_, users::User>(&query)
            .bind(delta)
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn try_debit(
        &self,
        user_id: &str,
        field: BalanceField,
        amount: i64,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let column = field.column();
        let query = format!(
            "UPDATE users SET {column} = {column} - $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND {column} >= $1 RETURNING *"
        );

        let user = sqlx::query_as::<_, users::User>(&query)
            .bind(amount)
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    async fn increment_referral_quota(
        &self,
        user_id: &str,
        delta: i32,
    ) -> Result<Option<users::User>, anyhow::Error> {
        let user = sqlx::query_as::<_, users::User>(
            r#"
                UPDATE users
                SET referral_job_quota = GREATEST(0, referral_job_quota + $1),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $2
                RETURNING *
            "#,
        )
        .bind(delta)
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
