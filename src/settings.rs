use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub listen: String,
}

/// Account created at startup when no user owns `phone` yet.
#[derive(Clone, Debug, Deserialize)]
pub struct Admin {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub password: String,
    pub ref_code: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Option<Postgres>,
    pub store: Store,
    pub http: Http,
    pub admin: Admin,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("EARN").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
