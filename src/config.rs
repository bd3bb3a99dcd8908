use std::env;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable runtime settings, read once from the environment (with
/// `.env` support). Everything has a workable default so the scraper runs
/// without configuration; `DATABASE_URL` stays `None` unless provided.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub exports_dir: PathBuf,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub rate_limit_rps: NonZeroU32,
    pub retries: u32,
    pub season_start: u16,
    pub season_end: u16,
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            exports_dir: PathBuf::from("data/exports"),
            user_agent: "nrl-scrape/0.3 (+github)".to_string(),
            request_timeout: Duration::from_secs(12),
            rate_limit_rps: NonZeroU32::MIN,
            retries: 4,
            season_start: 1998,
            season_end: 2025,
            concurrency: 4,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            exports_dir: env::var("EXPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.exports_dir),
            user_agent: env::var("USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout: env_parse("REQ_TIMEOUT_S")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS")
                .and_then(NonZeroU32::new)
                .unwrap_or(defaults.rate_limit_rps),
            retries: env_parse("RETRIES").unwrap_or(defaults.retries),
            season_start: env_parse("SEASON_START").unwrap_or(defaults.season_start),
            season_end: env_parse("SEASON_END").unwrap_or(defaults.season_end),
            concurrency: env_parse("SCRAPE_CONCURRENCY").unwrap_or(defaults.concurrency),
        }
    }

    pub fn season_bounds(&self) -> (u16, u16) {
        (self.season_start, self.season_end)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
