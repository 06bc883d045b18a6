use crate::models::catalog::{
    CatalogKind, NewQuizPackage, NewQuizQuestion, NewSalaryPlan, NewTask, NewTypingJob,
    QuizPackage, QuizQuestion, SalaryPlan, Task, TypingJob,
};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::CatalogStore;

#[derive(Clone)]
pub struct CatalogRepository {
    conn: PgPool,
}

impl CatalogRepository {
    pub fn new(conn: PgPool) -> Self {
        CatalogRepository { conn }
    }

    fn new_id() -> String {
        Uuid::new_v4().hyphenated().to_string()
    }
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    async fn insert_task(&self, task: NewTask) -> Result<Task, anyhow::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, title, description, reward_in_cents, link, image, kind)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *"#,
        )
        .bind(Self::new_id())
        .bind(task.title)
        .bind(task.description)
        .bind(task.reward_in_cents)
        .bind(task.link)
        .bind(task.image)
        .bind(task.kind)
        .fetch_one(&self.conn)
        .await?;

        Ok(task)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, anyhow::Error> {
        let tasks = sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY created_at DESC")
            .fetch_all(&self.conn)
            .await?;

        Ok(tasks)
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, anyhow::Error> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(task)
    }

    async fn insert_typing_job(&self, job: NewTypingJob) -> Result<TypingJob, anyhow::Error> {
        let job = sqlx::query_as::<_, TypingJob>(
            r#"INSERT INTO typing_jobs (id, text, reward_in_cents, link, wait_time_secs, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *"#,
        )
        .bind(Self::new_id())
        .bind(job.text)
        .bind(job.reward_in_cents)
        .bind(job.link)
        .bind(job.wait_time_secs)
        .bind(job.category)
        .fetch_one(&self.conn)
        .await?;

        Ok(job)
    }

    async fn list_typing_jobs(&self) -> Result<Vec<TypingJob>, anyhow::Error> {
        let jobs =
            sqlx::query_as::<_, TypingJob>("SELECT * FROM typing_jobs ORDER BY created_at DESC")
                .fetch_all(&self.conn)
                .await?;

        Ok(jobs)
    }

    async fn get_typing_job(&self, id: &str) -> Result<Option<TypingJob>, anyhow::Error> {
        let job = sqlx::query_as::<_, TypingJob>("SELECT * FROM typing_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(job)
    }

    async fn insert_quiz_package(
        &self,
        package: NewQuizPackage,
    ) -> Result<QuizPackage, anyhow::Error> {
        let package = sqlx::query_as::<_, QuizPackage>(
            r#"INSERT INTO quiz_packages
            (id, name, description, price_in_cents, duration_days, daily_limit, profit_in_cents)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *"#,
        )
        .bind(Self::new_id())
        .bind(package.name)
        .bind(package.description)
        .bind(package.price_in_cents)
        .bind(package.duration_days)
        .bind(package.daily_limit)
        .bind(package.profit_in_cents)
        .fetch_one(&self.conn)
        .await?;

        Ok(package)
    }

    async fn list_quiz_packages(&self) -> Result<Vec<QuizPackage>, anyhow::Error> {
        let packages =
            sqlx::query_as::<_, QuizPackage>("SELECT * FROM quiz_packages ORDER BY created_at DESC")
                .fetch_all(&self.conn)
                .await?;

        Ok(packages)
    }

    async fn get_quiz_package(&self, id: &str) -> Result<Option<QuizPackage>, anyhow::Error> {
        let package = sqlx::query_as::<_, QuizPackage>("SELECT * FROM quiz_packages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(package)
    }

    async fn insert_quiz_question(
        &self,
        question: NewQuizQuestion,
    ) -> Result<QuizQuestion, anyhow::Error> {
        let question = sqlx::query_as::<_, QuizQuestion>(
            r#"INSERT INTO quiz_list
            (id, package_id, question, answer, reward_in_cents, wait_secs, ad_link)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *"#,
        )
        .bind(Self::new_id())
        .bind(question.package_id)
        .bind(question.question)
        .bind(question.answer)
        .bind(question.reward_in_cents)
        .bind(question.wait_secs)
        .bind(question.ad_link)
        .fetch_one(&self.conn)
        .await?;

        Ok(question)
    }

    async fn list_quiz_questions(
        &self,
        package_id: Option<&str>,
    ) -> Result<Vec<QuizQuestion>, anyhow::Error> {
        let questions = sqlx::query_as::<_, QuizQuestion>(
            r#"SELECT * FROM quiz_list
            WHERE ($1::text IS NULL OR package_id = $1)
            ORDER BY created_at"#,
        )
        .bind(package_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(questions)
    }

    async fn get_quiz_question(&self, id: &str) -> Result<Option<QuizQuestion>, anyhow::Error> {
        let question = sqlx::query_as::<_, QuizQuestion>("SELECT * FROM quiz_list WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(question)
    }

    async fn insert_salary_plan(&self, plan: NewSalaryPlan) -> Result<SalaryPlan, anyhow::Error> {
        let plan = sqlx::query_as::<_, SalaryPlan>(
            r#"INSERT INTO salary_plans
            (id, title, description, target_refers, reward_in_cents, required_packages)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *"#,
        )
        .bind(Self::new_id())
        .bind(plan.title)
        .bind(plan.description)
        .bind(plan.target_refers)
        .bind(plan.reward_in_cents)
        .bind(plan.required_packages)
        .fetch_one(&self.conn)
        .await?;

        Ok(plan)
    }

    async fn list_salary_plans(&self) -> Result<Vec<SalaryPlan>, anyhow::Error> {
        let plans =
            sqlx::query_as::<_, SalaryPlan>("SELECT * FROM salary_plans ORDER BY created_at DESC")
                .fetch_all(&self.conn)
                .await?;

        Ok(plans)
    }

    async fn get_salary_plan(&self, id: &str) -> Result<Option<SalaryPlan>, anyhow::Error> {
        let plan = sqlx::query_as::<_, SalaryPlan>("SELECT * FROM salary_plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(plan)
    }

    async fn delete_item(&self, kind: CatalogKind, id: &str) -> Result<bool, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        if kind == CatalogKind::QuizPackages {
            sqlx::query("DELETE FROM quiz_list WHERE package_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let query = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let result = sqlx::query(&query).bind(id).execute(&mut *tx).await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
