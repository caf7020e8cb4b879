use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::env;
use config; // Explicitly import the config crate

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// How stored post content is turned into page HTML.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentRendering {
    /// Run stored HTML through the rich-text allow-list.
    Sanitize,
    /// Render stored HTML verbatim. Only safe when every author is an admin.
    Trusted,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // These fields will be populated from the .env file
    pub database_path: String,
    pub media_path: String,
    pub templates_dir: String,
    pub site_url: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    pub content_rendering: ContentRendering,
    pub max_upload_size_mb: u64,
    pub resend_api_key: Option<String>,
    pub notification_email_to: String,
    pub email_from: String,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| config::ConfigError::Message(format!(
        "FATAL: Environment variable '{}' is not set in your .env file.", name
    )))
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path)
            .map_err(|e| config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}", env_path.display(), e
            )))?;

        let database_path = required_var("DATABASE_PATH")?;
        let media_path = required_var("MEDIA_PATH")?;
        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        let site_url = required_var("SITE_URL")?;

        // 128 hex characters, i.e. the 64 bytes actix-session needs for its key.
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string()
            ));
        }

        let parsed_site_url = url::Url::parse(&site_url).map_err(|e| config::ConfigError::Message(format!(
            "FATAL: 'SITE_URL' ('{}') is not a valid absolute URL: {}", site_url, e
        )))?;
        if !matches!(parsed_site_url.scheme(), "http" | "https") {
            return Err(config::ConfigError::Message(
                "FATAL: 'SITE_URL' must use http or https.".to_string()
            ));
        }
        let site_url = site_url.trim_end_matches('/').to_string();

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let templates_dir = env::var("TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string());

        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        let content_rendering = env::var("CONTENT_RENDERING").unwrap_or_else(|_| "sanitize".to_string());
        if content_rendering != "sanitize" && content_rendering != "trusted" {
            return Err(config::ConfigError::Message(format!(
                "FATAL: 'CONTENT_RENDERING' must be 'sanitize' or 'trusted', got '{}'.", content_rendering
            )));
        }

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(20);

        let notification_email_to = env::var("NOTIFICATION_EMAIL_TO")
            .unwrap_or_else(|_| "info@pathstrategyconsulting.com.ng".to_string());
        let email_from = env::var("EMAIL_FROM")
            .unwrap_or_else(|_| "Path Strategy Consulting <onboarding@resend.dev>".to_string());

        if Path::new(&database_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'DATABASE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                database_path
            )));
        }

        if Path::new(&media_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'MEDIA_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                media_path
            )));
        }

        let mut builder = config::Config::builder()
            // Base settings (web host/port) come from the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("templates_dir", templates_dir)?
            .set_override("site_url", site_url)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("content_rendering", content_rendering)?
            .set_override("max_upload_size_mb", max_upload_size_mb as i64)?
            .set_override("notification_email_to", notification_email_to)?
            .set_override("email_from", email_from)?;

        // An empty key is treated the same as a missing one: notifications stay off.
        if let Ok(key) = env::var("RESEND_API_KEY") {
            if !key.trim().is_empty() {
                builder = builder.set_override("resend_api_key", key.trim().to_string())?;
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Returns the full path to the site database file inside its own folder.
    pub fn site_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
            .join("site")
            .join("site.db")
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }

    /// Canonical public URL of a blog post, used for sharing.
    pub fn post_url(&self, slug: &str) -> String {
        format!("{}/blog/{}", self.site_url, slug)
    }
}
