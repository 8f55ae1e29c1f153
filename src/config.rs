//! Environment-driven runtime configuration.
//!
//! Every value is optional at the process boundary; absence degrades to
//! the corresponding mocked adapter rather than a startup failure.

use std::env;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SESSION_CAP: usize = 1_000;

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub redis_url: Option<String>,
    pub session_cap: usize,
    pub session_ttl_secs: Option<u64>,
}

impl Config {
    /// Load configuration from the environment, loading a local `.env`
    /// file first if present (mirrors the teacher's `dotenvy` usage).
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            tracing::debug!("no .env file found; reading process environment only");
        }

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let session_cap = env::var("SESSION_CAP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SESSION_CAP);

        let session_ttl_secs = env::var("SESSION_TTL_SECS").ok().and_then(|v| v.parse().ok());

        Self {
            port,
            database_url: non_empty(env::var("DATABASE_URL").ok()),
            anthropic_api_key: non_empty(env::var("ANTHROPIC_API_KEY").ok()),
            openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
            redis_url: non_empty(env::var("REDIS_URL").ok()),
            session_cap,
            session_ttl_secs,
        }
    }

    pub fn has_corpus_backend(&self) -> bool {
        self.database_url.is_some()
    }

    pub fn has_llm_backend(&self) -> bool {
        self.anthropic_api_key.is_some() || self.openai_api_key.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests that
    // touch them so they don't race each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn config_defaults_when_env_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in ["PORT", "DATABASE_URL", "SESSION_CAP", "SESSION_TTL_SECS"] {
            unsafe { env::remove_var(key) };
        }
        let config = Config::from_env();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.session_cap, DEFAULT_SESSION_CAP);
        assert!(config.session_ttl_secs.is_none());
        assert!(!config.has_corpus_backend());
        assert!(!config.has_llm_backend());
    }

    #[test]
    fn config_reads_port_and_database_url() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { env::set_var("PORT", "9100") };
        unsafe { env::set_var("DATABASE_URL", "postgres://localhost/discovery") };
        let config = Config::from_env();
        assert_eq!(config.port, 9100);
        assert!(config.has_corpus_backend());
        unsafe { env::remove_var("PORT") };
        unsafe { env::remove_var("DATABASE_URL") };
    }

    #[test]
    fn empty_string_env_var_treated_as_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe { env::set_var("ANTHROPIC_API_KEY", "") };
        let config = Config::from_env();
        assert!(config.anthropic_api_key.is_none());
        unsafe { env::remove_var("ANTHROPIC_API_KEY") };
    }
}
