use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::repositories::Repositories;
use crate::settings::Settings;

mod catalog;
mod earnings;
mod http;
mod ledger;
mod locks;
mod referrals;
mod users;
mod wallet;

#[cfg(test)]
mod testing;

const CHANNEL_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl ServiceError {
    fn repository(service: &str) -> impl Fn(anyhow::Error) -> ServiceError + '_ {
        move |e| {
            log::error!("{} store call failed: {}", service, e);
            ServiceError::Repository(service.to_string(), e.to_string())
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Spawns every service task and returns the channels that reach them.
pub fn spawn_services(repositories: Repositories) -> http::Channels {
    let (user_tx, mut user_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (ledger_tx, mut ledger_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (wallet_tx, mut wallet_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (earning_tx, mut earning_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (catalog_tx, mut catalog_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut user_service = users::UserService::new();
    let mut ledger_service = ledger::LedgerService::new();
    let mut wallet_service = wallet::WalletService::new();
    let mut earning_service = earnings::EarningService::new();
    let mut catalog_service = catalog::CatalogService::new();

    log::info!("Starting user service.");
    let user_repositories = repositories.clone();
    tokio::spawn(async move {
        user_service
            .run(
                users::UserRequestHandler::new(user_repositories),
                &mut user_rx,
            )
            .await;
    });

    log::info!("Starting ledger service.");
    let ledger_repositories = repositories.clone();
    tokio::spawn(async move {
        ledger_service
            .run(
                ledger::LedgerRequestHandler::new(ledger_repositories),
                &mut ledger_rx,
            )
            .await;
    });

    log::info!("Starting wallet service.");
    let wallet_repositories = repositories.clone();
    tokio::spawn(async move {
        wallet_service
            .run(
                wallet::WalletRequestHandler::new(wallet_repositories),
                &mut wallet_rx,
            )
            .await;
    });

    log::info!("Starting earning service.");
    let earning_repositories = repositories.clone();
    tokio::spawn(async move {
        earning_service
            .run(
                earnings::EarningRequestHandler::new(earning_repositories),
                &mut earning_rx,
            )
            .await;
    });

    log::info!("Starting catalog service.");
    tokio::spawn(async move {
        catalog_service
            .run(
                catalog::CatalogRequestHandler::new(repositories),
                &mut catalog_rx,
            )
            .await;
    });

    http::Channels {
        users: user_tx,
        ledger: ledger_tx,
        wallet: wallet_tx,
        earnings: earning_tx,
        catalog: catalog_tx,
    }
}

pub async fn start_services(
    repositories: Repositories,
    settings: Settings,
) -> Result<(), anyhow::Error> {
    users::UserRequestHandler::new(repositories.clone())
        .ensure_admin(&settings.admin)
        .await
        .map_err(|e| anyhow::anyhow!("Could not seed admin account: {}", e))?;

    let channels = spawn_services(repositories);

    log::info!("Starting HTTP server.");
    http::start_http_server(channels, &settings.http.listen).await
}
