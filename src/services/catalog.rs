use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::catalog::{CatalogItem, CatalogKind, NewCatalogItem};
use crate::models::platform::PlatformSettings;
use crate::repositories::Repositories;

const SERVICE: &str = "Catalog";

pub enum CatalogRequest {
    List {
        kind: CatalogKind,
        response: oneshot::Sender<Result<Vec<CatalogItem>, ServiceError>>,
    },
    Insert {
        item: NewCatalogItem,
        response: oneshot::Sender<Result<CatalogItem, ServiceError>>,
    },
    Delete {
        kind: CatalogKind,
        id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
    GetSettings {
        response: oneshot::Sender<Result<PlatformSettings, ServiceError>>,
    },
    SaveSettings {
        settings: PlatformSettings,
        response: oneshot::Sender<Result<PlatformSettings, ServiceError>>,
    },
}

fn validate_item(item: &NewCatalogItem) -> Result<(), ServiceError> {
    if item.amount_in_cents() < 0 {
        return Err(ServiceError::Validation(
            "Amounts cannot be negative.".to_string(),
        ));
    }

    match item {
        NewCatalogItem::Task(task) if task.title.trim().is_empty() => Err(
            ServiceError::Validation("Task title is required.".to_string()),
        ),
        NewCatalogItem::TypingJob(job) if job.text.trim().is_empty() => Err(
            ServiceError::Validation("Typing text is required.".to_string()),
        ),
        NewCatalogItem::QuizPackage(package)
            if package.duration_days <= 0 || package.daily_limit <= 0 =>
        {
            Err(ServiceError::Validation(
                "Duration and daily limit must be positive.".to_string(),
            ))
        }
        NewCatalogItem::QuizQuestion(question) if question.answer.trim().is_empty() => Err(
            ServiceError::Validation("Quiz answer is required.".to_string()),
        ),
        NewCatalogItem::SalaryPlan(plan)
            if plan.target_refers < 0 || plan.required_packages < 0 =>
        {
            Err(ServiceError::Validation(
                "Salary targets cannot be negative.".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

fn validate_settings(settings: &PlatformSettings) -> Result<(), ServiceError> {
    let amounts = [
        settings.min_withdraw_in_cents,
        settings.max_withdraw_in_cents,
        settings.min_deposit_in_cents,
        settings.free_withdraw_max_in_cents,
        settings.min_transfer_in_cents,
        settings.premium_cost_in_cents,
        settings.ref_com_l1_in_cents,
        settings.ref_com_l2_in_cents,
        settings.ref_com_l3_in_cents,
        settings.social_rates.gmail_in_cents,
        settings.social_rates.facebook_in_cents,
        settings.social_rates.instagram_in_cents,
        settings.social_rates.tiktok_in_cents,
    ];

    if amounts.iter().any(|amount| *amount < 0) {
        return Err(ServiceError::Validation(
            "Amounts cannot be negative.".to_string(),
        ));
    }
    if settings.min_withdraw_in_cents > settings.max_withdraw_in_cents {
        return Err(ServiceError::Validation(
            "Minimum withdrawal exceeds the maximum.".to_string(),
        ));
    }

    Ok(())
}

#[derive(Clone)]
pub struct CatalogRequestHandler {
    repositories: Repositories,
}

impl CatalogRequestHandler {
    pub fn new(repositories: Repositories) -> Self {
        CatalogRequestHandler { repositories }
    }

    pub async fn list(&self, kind: CatalogKind) -> Result<Vec<CatalogItem>, ServiceError> {
        let catalog = &self.repositories.catalog;

        let items: Result<Vec<CatalogItem>, anyhow::Error> = match kind {
            CatalogKind::Tasks => catalog
                .list_tasks()
                .await
                .map(|items| items.into_iter().map(CatalogItem::Task).collect()),
            CatalogKind::TypingJobs => catalog
                .list_typing_jobs()
                .await
                .map(|items| items.into_iter().map(CatalogItem::TypingJob).collect()),
            CatalogKind::QuizPackages => catalog
                .list_quiz_packages()
                .await
                .map(|items| items.into_iter().map(CatalogItem::QuizPackage).collect()),
            CatalogKind::QuizQuestions => catalog
                .list_quiz_questions(None)
                .await
                .map(|items| items.into_iter().map(CatalogItem::QuizQuestion).collect()),
            CatalogKind::SalaryPlans => catalog
                .list_salary_plans()
                .await
                .map(|items| items.into_iter().map(CatalogItem::SalaryPlan).collect()),
        };

        items.map_err(ServiceError::repository(SERVICE))
    }

    pub async fn insert(&self, item: NewCatalogItem) -> Result<CatalogItem, ServiceError> {
        validate_item(&item)?;
        let catalog = &self.repositories.catalog;

        let inserted = match item {
            NewCatalogItem::Task(task) => catalog.insert_task(task).await.map(CatalogItem::Task),
            NewCatalogItem::TypingJob(job) => catalog
                .insert_typing_job(job)
                .await
                .map(CatalogItem::TypingJob),
            NewCatalogItem::QuizPackage(package) => catalog
                .insert_quiz_package(package)
                .await
                .map(CatalogItem::QuizPackage),
            NewCatalogItem::QuizQuestion(question) => {
                let package = catalog
                    .get_quiz_package(&question.package_id)
                    .await
                    .map_err(ServiceError::repository(SERVICE))?;
                if package.is_none() {
                    return Err(ServiceError::NotFound(format!(
                        "Quiz package not found: {}.",
                        question.package_id
                    )));
                }

                catalog
                    .insert_quiz_question(question)
                    .await
                    .map(CatalogItem::QuizQuestion)
            }
            NewCatalogItem::SalaryPlan(plan) => catalog
                .insert_salary_plan(plan)
                .await
                .map(CatalogItem::SalaryPlan),
        };

        inserted.map_err(ServiceError::repository(SERVICE))
    }

    pub async fn delete(&self, kind: CatalogKind, id: &str) -> Result<(), ServiceError> {
        let deleted = self
            .repositories
            .catalog
            .delete_item(kind, id)
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        if !deleted {
            return Err(ServiceError::NotFound(format!(
                "No {} row with id {}.",
                kind.table(),
                id
            )));
        }

        log::info!("Deleted {} row {}.", kind.table(), id);
        Ok(())
    }

    async fn get_settings(&self) -> Result<PlatformSettings, ServiceError> {
        self.repositories
            .settings
            .load()
            .await
            .map_err(ServiceError::repository(SERVICE))
    }

    async fn save_settings(
        &self,
        settings: PlatformSettings,
    ) -> Result<PlatformSettings, ServiceError> {
        validate_settings(&settings)?;

        self.repositories
            .settings
            .save(&settings)
            .await
            .map_err(ServiceError::repository(SERVICE))?;

        log::info!("Platform settings updated.");
        Ok(settings)
    }
}

#[async_trait]
impl RequestHandler<CatalogRequest> for CatalogRequestHandler {
    async fn handle_request(&self, request: CatalogRequest) {
        match request {
            CatalogRequest::List { kind, response } => {
                let result = self.list(kind).await;
                let _ = response.send(result);
            }
            CatalogRequest::Insert { item, response } => {
                let result = self.insert(item).await;
                let _ = response.send(result);
            }
            CatalogRequest::Delete { kind, id, response } => {
                let result = self.delete(kind, &id).await;
                let _ = response.send(result);
            }
            CatalogRequest::GetSettings { response } => {
                let result = self.get_settings().await;
                let _ = response.send(result);
            }
            CatalogRequest::SaveSettings { settings, response } => {
                let result = self.save_settings(settings).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct CatalogService;

impl CatalogService {
    pub fn new() -> Self {
        CatalogService {}
    }
}

#[async_trait]
impl Service<CatalogRequest, CatalogRequestHandler> for CatalogService {}
