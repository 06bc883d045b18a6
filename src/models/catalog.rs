use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Tasks,
    TypingJobs,
    QuizPackages,
    QuizQuestions,
    SalaryPlans,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Tasks => "tasks",
            CatalogKind::TypingJobs => "typing_jobs",
            CatalogKind::QuizPackages => "quiz_packages",
            CatalogKind::QuizQuestions => "quiz_list",
            CatalogKind::SalaryPlans => "salary_plans",
        }
    }
}

impl std::str::FromStr for CatalogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tasks" => Ok(CatalogKind::Tasks),
            "typing_jobs" | "typing-jobs" => Ok(CatalogKind::TypingJobs),
            "quiz_packages" | "quiz-packages" => Ok(CatalogKind::QuizPackages),
            "quiz_questions" | "quiz-questions" | "quiz_list" => Ok(CatalogKind::QuizQuestions),
            "salary_plans" | "salary-plans" => Ok(CatalogKind::SalaryPlans),
            other => Err(format!("Unknown catalog kind: {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Free,
    Premium,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TypingJobCategory {
    Premium,
    Referral,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward_in_cents: i64,
    pub link: String,
    pub image: String,
    pub kind: TaskKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub reward_in_cents: i64,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub image: String,
    pub kind: TaskKind,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct TypingJob {
    pub id: String,
    pub text: String,
    pub reward_in_cents: i64,
    pub link: String,
    pub wait_time_secs: i32,
    pub category: TypingJobCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewTypingJob {
    pub text: String,
    pub reward_in_cents: i64,
    #[serde(default)]
    pub link: String,
    #[serde(default = "default_wait_time")]
    pub wait_time_secs: i32,
    pub category: TypingJobCategory,
}

fn default_wait_time() -> i32 {
    10
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct QuizPackage {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_in_cents: i64,
    pub duration_days: i32,
    pub daily_limit: i32,
    pub profit_in_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewQuizPackage {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_in_cents: i64,
    pub duration_days: i32,
    pub daily_limit: i32,
    #[serde(default)]
    pub profit_in_cents: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct QuizQuestion {
    pub id: String,
    pub package_id: String,
    pub question: String,
    #[serde(skip_serializing)]
    pub answer: String,
    pub reward_in_cents: i64,
    pub wait_secs: i32,
    pub ad_link: String,
    pub created_at: DateTime<Utc>,
}

impl QuizQuestion {
    pub fn is_correct(&self, answer: &str) -> bool {
        self.answer.trim().to_lowercase() == answer.trim().to_lowercase()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewQuizQuestion {
    pub package_id: String,
    pub question: String,
    pub answer: String,
    pub reward_in_cents: i64,
    #[serde(default = "default_quiz_wait")]
    pub wait_secs: i32,
    #[serde(default)]
    pub ad_link: String,
}

fn default_quiz_wait() -> i32 {
    5
}

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct SalaryPlan {
    pub id: String,
    pub title: String,
    pub description: String,
    pub target_refers: i32,
    pub reward_in_cents: i64,
    pub required_packages: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewSalaryPlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub target_refers: i32,
    pub reward_in_cents: i64,
    #[serde(default)]
    pub required_packages: i32,
}

/// An insert request for any catalog table.
#[derive(Clone, Debug)]
pub enum NewCatalogItem {
    Task(NewTask),
    TypingJob(NewTypingJob),
    QuizPackage(NewQuizPackage),
    QuizQuestion(NewQuizQuestion),
    SalaryPlan(NewSalaryPlan),
}

impl NewCatalogItem {
    pub fn from_json(kind: CatalogKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let item = match kind {
            CatalogKind::Tasks => NewCatalogItem::Task(serde_json::from_value(value)?),
            CatalogKind::TypingJobs => NewCatalogItem::TypingJob(serde_json::from_value(value)?),
            CatalogKind::QuizPackages => {
                NewCatalogItem::QuizPackage(serde_json::from_value(value)?)
            }
            CatalogKind::QuizQuestions => {
                NewCatalogItem::QuizQuestion(serde_json::from_value(value)?)
            }
            CatalogKind::SalaryPlans => NewCatalogItem::SalaryPlan(serde_json::from_value(value)?),
        };

        Ok(item)
    }

    /// Reward or price carried by the item; must be non-negative.
    pub fn amount_in_cents(&self) -> i64 {
        match self {
            NewCatalogItem::Task(task) => task.reward_in_cents,
            NewCatalogItem::TypingJob(job) => job.reward_in_cents,
            NewCatalogItem::QuizPackage(package) => package.price_in_cents,
            NewCatalogItem::QuizQuestion(question) => question.reward_in_cents,
            NewCatalogItem::SalaryPlan(plan) => plan.reward_in_cents,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum CatalogItem {
    Task(Task),
    TypingJob(TypingJob),
    QuizPackage(QuizPackage),
    QuizQuestion(QuizQuestion),
    SalaryPlan(SalaryPlan),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_kind_from_path_segment() {
        assert_eq!("typing-jobs".parse::<CatalogKind>(), Ok(CatalogKind::TypingJobs));
        assert_eq!("quiz_list".parse::<CatalogKind>(), Ok(CatalogKind::QuizQuestions));
        assert!("wallets".parse::<CatalogKind>().is_err());
    }

    #[test]
    fn builds_insert_for_kind() {
        let item = NewCatalogItem::from_json(
            CatalogKind::TypingJobs,
            json!({"text": "hello", "reward_in_cents": 50, "category": "referral"}),
        )
        .unwrap();

        match item {
            NewCatalogItem::TypingJob(job) => {
                assert_eq!(job.wait_time_secs, 10);
                assert_eq!(job.category, TypingJobCategory::Referral);
            }
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[test]
    fn quiz_answer_ignores_case_and_padding() {
        let question = QuizQuestion {
            id: "q".to_string(),
            package_id: "p".to_string(),
            question: "Capital of Bangladesh?".to_string(),
            answer: "Dhaka".to_string(),
            reward_in_cents: 50,
            wait_secs: 5,
            ad_link: String::new(),
            created_at: Utc::now(),
        };

        assert!(question.is_correct("  dhaka "));
        assert!(!question.is_correct("chittagong"));
    }
}
