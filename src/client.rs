use std::sync::Arc;

use tracing::instrument;

use crate::aggregate::{self, SeasonOptions};
use crate::config::Settings;
use crate::error::{Result, ScrapeError};
use crate::model::{RangeReport, SeasonOutcome};
use crate::normalize::Normalizer;
use crate::rlp::fetch::{Fetcher, RetryPolicy};

/// The main entry point for scraping Rugby League Project results.
///
/// `RlpClient` wraps a [`reqwest::Client`], the shared rate limiter and the
/// NRL alias tables, and exposes the season and historical-range scrapes.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> nrl_scrape::Result<()> {
/// use nrl_scrape::config::Settings;
/// use nrl_scrape::{RlpClient, SeasonOptions};
///
/// let client = RlpClient::new(&Settings::default())?;
/// let outcome = client.scrape_season(2024, &SeasonOptions::default()).await?;
/// println!("{} matches", outcome.total());
/// # Ok(())
/// # }
/// ```
pub struct RlpClient {
    fetcher: Arc<Fetcher>,
    normalizer: Arc<Normalizer>,
    season_bounds: (u16, u16),
}

impl RlpClient {
    /// Create a client with the standard politeness headers and timeouts.
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .build()
            .map_err(ScrapeError::Client)?;
        Ok(Self::with_client(http, settings))
    }

    /// Create a client using the provided [`reqwest::Client`].
    ///
    /// Use this when you need to configure proxies, extra headers, etc.
    pub fn with_client(http: reqwest::Client, settings: &Settings) -> Self {
        let policy = RetryPolicy::with_attempts(settings.retries);
        Self {
            fetcher: Arc::new(Fetcher::new(http, policy, settings.rate_limit_rps)),
            normalizer: Arc::new(Normalizer::nrl()),
            season_bounds: settings.season_bounds(),
        }
    }

    /// Scrape every round of one season, finals included when requested.
    #[instrument(skip(self, opts))]
    pub async fn scrape_season(&self, year: u16, opts: &SeasonOptions) -> Result<SeasonOutcome> {
        aggregate::scrape_season(
            self.fetcher.clone(),
            &self.normalizer,
            year,
            self.season_bounds,
            opts,
        )
        .await
    }

    /// Scrape a range of seasons sequentially; per-season failures are
    /// recorded in the report rather than aborting the range.
    #[instrument(skip(self, opts))]
    pub async fn scrape_range(
        &self,
        start_year: u16,
        end_year: u16,
        opts: &SeasonOptions,
    ) -> RangeReport {
        aggregate::scrape_range(
            self.fetcher.clone(),
            &self.normalizer,
            start_year,
            end_year,
            self.season_bounds,
            opts,
        )
        .await
    }

    /// The alias tables and miss counters backing this client.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}
