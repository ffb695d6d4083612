//! Store configuration: where the SQLite database file lives.

const DEFAULT_URL: &str = "sqlite://vox.db";
const ENV_VAR: &str = "VOX_DATABASE_URL";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let url = std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self { url }
    }

    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
        }
    }

    pub fn file(path: &str) -> Self {
        Self {
            url: format!("sqlite://{path}"),
        }
    }
}
