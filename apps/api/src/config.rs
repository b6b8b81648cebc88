use anyhow::{bail, Context, Result};

/// Number of recent conversation turns handed to the updater model.
pub const DEFAULT_CONVERSATION_WINDOW: usize = 15;

/// Upload size cap applied to the document creation route.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    /// Server-side model credential. Requests may carry their own key instead.
    pub anthropic_api_key: Option<String>,
    pub conversation_window: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match optional_env("STORAGE_BACKEND").as_deref() {
            None | Some("postgres") => StorageBackend::Postgres {
                database_url: require_env("DATABASE_URL")?,
            },
            Some("memory") => StorageBackend::Memory,
            Some(other) => bail!("STORAGE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        };

        let conversation_window = match optional_env("CONVERSATION_WINDOW") {
            Some(raw) => raw
                .parse::<usize>()
                .context("CONVERSATION_WINDOW must be a positive integer")?,
            None => DEFAULT_CONVERSATION_WINDOW,
        };
        if conversation_window == 0 {
            bail!("CONVERSATION_WINDOW must be at least 1");
        }

        Ok(Config {
            storage,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            conversation_window,
            max_upload_bytes: match optional_env("MAX_UPLOAD_BYTES") {
                Some(raw) => raw
                    .parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads a variable, treating an empty value the same as an unset one.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
impl Config {
    /// In-memory configuration used by handler tests.
    pub fn for_tests() -> Self {
        Config {
            storage: StorageBackend::Memory,
            anthropic_api_key: None,
            conversation_window: DEFAULT_CONVERSATION_WINDOW,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
