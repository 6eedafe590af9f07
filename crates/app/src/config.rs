use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid database url: {raw}")]
    InvalidDbUrl { raw: String },
    #[error("could not prepare database file: {0}")]
    Io(#[from] std::io::Error),
}

/// Server settings. Every flag also reads from the environment.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Exam preparation tracker API")]
pub struct Config {
    /// SQLite database URL or path.
    #[arg(long = "db", env = "PREP_DB_URL", default_value = "sqlite://prep.sqlite3")]
    pub db_url: String,

    /// The address to bind to.
    #[arg(short, long, env = "PREP_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    #[arg(long, env = "PREP_SESSION_TTL_DAYS", default_value_t = 30)]
    pub session_ttl_days: i64,

    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    pub rate_limit_window_secs: i64,

    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value_t = 100)]
    pub rate_limit_max_requests: u32,

    /// Mark the session cookie `Secure`.
    #[arg(long, env = "PREP_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Load exam master data before serving.
    #[arg(long, env = "PREP_SEED")]
    pub seed: bool,

    /// Create this admin account on start if it does not exist.
    #[arg(long, env = "PREP_ADMIN_EMAIL", requires = "admin_password")]
    pub admin_email: Option<String>,

    #[arg(long, env = "PREP_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

impl Config {
    /// The database URL in absolute `sqlite://` form.
    #[must_use]
    pub fn database_url(&self) -> String {
        normalize_sqlite_url(&self.db_url)
    }
}

/// Turn `sqlite:relative.db` or a bare path into an absolute `sqlite://` URL.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file and its parent directory when missing.
///
/// # Errors
///
/// Returns `ConfigError::InvalidDbUrl` for URLs without a path and
/// `ConfigError::Io` if the file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), ConfigError> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError::InvalidDbUrl {
            raw: db_url.to_owned(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ConfigError::InvalidDbUrl {
            raw: db_url.to_owned(),
        });
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let config = Config::try_parse_from(["prep-server"]).unwrap();
        assert_eq!(config.bind.port(), 3000);
        assert_eq!(config.session_ttl_days, 30);
        assert_eq!(config.rate_limit_window_secs, 900);
        assert_eq!(config.rate_limit_max_requests, 100);
        assert!(!config.seed);
    }

    #[test]
    fn admin_email_requires_password() {
        let err = Config::try_parse_from(["prep-server", "--admin-email", "a@b.c"]);
        assert!(err.is_err());
    }

    #[test]
    fn urls_become_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/a.db"), "sqlite:///tmp/a.db");
        assert_eq!(normalize_sqlite_url("sqlite:/tmp/a.db"), "sqlite:///tmp/a.db");

        let relative = normalize_sqlite_url("data/prep.db");
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("data/prep.db"));
    }

    #[test]
    fn prepare_rejects_non_file_urls() {
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
        assert!(matches!(
            prepare_sqlite_file("postgres://db"),
            Err(ConfigError::InvalidDbUrl { .. })
        ));
        assert!(prepare_sqlite_file("sqlite://").is_err());
    }
}
