use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    /// Posts per page on every front listing.
    pub front_posts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub pagination: PaginationConfig,
    // Populated from the .env file
    pub database_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

/// The cookie key must be 64 bytes, written as 128 hex characters.
fn validate_session_key(key: &str) -> Result<(), config::ConfigError> {
    if key.len() != 128 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(config::ConfigError::Message(
            "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
        ));
    }
    Ok(())
}

fn validate_database_path(path: &str) -> Result<(), config::ConfigError> {
    if Path::new(path).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The 'DATABASE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            path
        )));
    }
    Ok(())
}

fn parse_per_page(raw: &str) -> Result<u32, config::ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(config::ConfigError::Message(format!(
            "FATAL: 'FRONT_POSTS_PER_PAGE' must be a positive integer, got '{}'.",
            raw
        ))),
    }
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = required_var("DATABASE_PATH")?;
        validate_database_path(&database_path)?;

        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        validate_session_key(&session_secret_key)?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .ok()
            .and_then(|v| v.trim().parse::<bool>().ok())
            .unwrap_or(false);

        let mut builder = config::Config::builder()
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?;

        if let Ok(raw) = env::var("FRONT_POSTS_PER_PAGE") {
            builder = builder.set_override("pagination.front_posts", parse_per_page(&raw)? as i64)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Full path to the blog database file inside its own folder.
    pub fn blog_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("blog").join("blog.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_must_be_128_hex_chars() {
        assert!(validate_session_key(&"ab".repeat(64)).is_ok());
        assert!(validate_session_key(&"ab".repeat(63)).is_err());
        assert!(validate_session_key(&"zz".repeat(64)).is_err());
    }

    #[test]
    fn database_path_must_be_absolute() {
        assert!(validate_database_path("/var/lib/blog").is_ok());
        assert!(validate_database_path("data/blog").is_err());
    }

    #[test]
    fn per_page_override_must_be_positive() {
        assert_eq!(parse_per_page(" 15 ").unwrap(), 15);
        assert!(parse_per_page("0").is_err());
        assert!(parse_per_page("ten").is_err());
    }

    #[test]
    fn blog_db_lives_in_its_own_folder() {
        let config = Config {
            web: WebConfig { host: "127.0.0.1".into(), port: 8080 },
            pagination: PaginationConfig { front_posts: 10 },
            database_path: "/srv/data".into(),
            allowed_origins: String::new(),
            log_level: "info".into(),
            session_secret_key: String::new(),
            use_secure_cookies: false,
        };
        assert_eq!(config.blog_db_path(), PathBuf::from("/srv/data/blog/blog.db"));
    }
}
