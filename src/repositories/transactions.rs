use crate::models::transactions::{self, NewTransaction, TransactionFilter, TransactionStatus};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::TransactionStore;

#[derive(Clone)]
pub struct TransactionRepository {
    conn: PgPool,
}

impl TransactionRepository {
    pub fn new(conn: PgPool) -> Self {
        TransactionRepository { conn }
    }
}

#[async_trait]
impl TransactionStore for TransactionRepository {
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<transactions::Transaction, anyhow::Error> {
        let transaction_id = Uuid::new_v4().hyphenated().to_string();

        let transaction = sqlx::query_as::<_, transactions::Transaction>(
            r#"INSERT INTO transactions
            (id, user_id, transaction_type, category, amount_in_cents, status,
             method, sender_number, trx_id, source_wallet, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(transaction_id)
        .bind(transaction.user_id)
        .bind(transaction.transaction_type)
        .bind(transaction.category)
        .bind(transaction.amount_in_cents)
        .bind(transaction.status)
        .bind(transaction.method)
        .bind(transaction.sender_number)
        .bind(transaction.trx_id)
        .bind(transaction.source_wallet)
        .bind(transaction.details)
        .fetch_one(&self.conn)
        .await?;

        Ok(transaction)
    }

    async fn get_transaction(
        &self,
        id: &str,
    ) -> Result<Option<transactions::Transaction>, anyhow::Error> {
        let transaction = sqlx::query_as::<_, transactions::Transaction>(
            "SELECT * FROM transactions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(transaction)
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<transactions::Transaction>, anyhow::Error> {
        let transactions = sqlx::query_as::<_, transactions::Transaction>(
            r#"SELECT * FROM transactions
            WHERE ($1::text IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR transaction_type = $3)
              AND ($4::text IS NULL OR category = $4)
            ORDER BY created_at DESC"#,
        )
        .bind(filter.user_id.as_deref())
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.transaction_type.map(|t| t.as_str()))
        .bind(filter.category.map(|c| c.as_str()))
        .fetch_all(&self.conn)
        .await?;

        Ok(transactions)
    }

    async fn transition_status(
        &self,
        id: &str,
        from: &[TransactionStatus],
        to: TransactionStatus,
        details: Option<&str>,
    ) -> Result<Option<transactions::Transaction>, anyhow::Error> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let transaction = sqlx::query_as::<_, transactions::Transaction>(
            r#"UPDATE transactions
            SET status = $1, details = COALESCE($2, details), updated_at = CURRENT_TIMESTAMP
            WHERE id = $3 AND status = ANY($4)
            RETURNING *"#,
        )
        .bind(to)
        .bind(details)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.conn)
        .await?;

        Ok(transaction)
    }
}
