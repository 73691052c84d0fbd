use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub douyin_api_base_url: String,
    pub port: u16,
    pub jobs: JobsConfig,
}

/// Limits and pacing for background ingestion tasks.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// How many comment-fetch tasks may run at once.
    pub comment_task_limit: usize,
    /// How many reply-fetch tasks may run at once.
    pub reply_task_limit: usize,
    /// Pause between successive upstream pages of one task.
    pub page_throttle: Duration,
    /// Concurrent per-parent workers inside one reply-fetch task.
    pub reply_concurrency: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            comment_task_limit: 2,
            reply_task_limit: 1,
            page_throttle: Duration::from_secs(1),
            reply_concurrency: 2,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = JobsConfig::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            douyin_api_base_url: env::var("DOUYIN_API_BASE_URL")
                .unwrap_or_else(|_| "http://douyin_api:5000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jobs: JobsConfig {
                comment_task_limit: parse_env("COMMENT_TASK_LIMIT", defaults.comment_task_limit)?,
                reply_task_limit: parse_env("REPLY_TASK_LIMIT", defaults.reply_task_limit)?,
                page_throttle: Duration::from_millis(parse_env(
                    "PAGE_THROTTLE_MS",
                    defaults.page_throttle.as_millis() as u64,
                )?),
                reply_concurrency: parse_env("REPLY_CONCURRENCY", defaults.reply_concurrency)?,
            },
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}
