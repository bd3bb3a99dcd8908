//! Season and range orchestration: drives fetch -> parse -> normalize ->
//! identify across every round page, deduplicates on identifier and
//! reports per-season outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};
use crate::identity;
use crate::model::{
    is_finals_label, MatchRecord, RangeReport, RawMatch, RoundFailure, SeasonOutcome, SeasonResult,
    Source,
};
use crate::normalize::{EntityKind, Normalizer};
use crate::rlp::{self, fetch::FetchDocument, parse};

/// Options for one season scrape.
#[derive(Clone, Copy, Debug)]
pub struct SeasonOptions {
    pub include_finals: bool,
    /// Decides whether a round label counts as finals. Label formats drift
    /// upstream, so this is injectable rather than a hard-coded substring
    /// check at every use site.
    pub finals_predicate: fn(&str) -> bool,
    /// Bound on concurrent round fetches. The fetcher's rate ceiling is
    /// the binding constraint; this just caps task fan-out.
    pub concurrency: usize,
}

impl Default for SeasonOptions {
    fn default() -> Self {
        Self {
            include_finals: true,
            finals_predicate: is_finals_label,
            concurrency: 4,
        }
    }
}

/// One page's worth of work within a season.
enum RoundPage {
    Regular(u32),
    Finals(&'static str),
}

impl RoundPage {
    fn url(&self, year: u16) -> String {
        match self {
            RoundPage::Regular(n) => rlp::round_url(year, *n),
            RoundPage::Finals(slug) => rlp::finals_url(year, slug),
        }
    }

    fn label(&self) -> String {
        match self {
            RoundPage::Regular(n) => format!("Round {n}"),
            RoundPage::Finals(slug) => (*slug).to_string(),
        }
    }
}

/// Scrape one season. The season index page is probed first; if it is
/// unreachable after retries the season fails as a whole and no round work
/// survives. Individual round failures are recorded and do not abort the
/// season.
pub(crate) async fn scrape_season(
    fetcher: Arc<dyn FetchDocument>,
    normalizer: &Normalizer,
    year: u16,
    bounds: (u16, u16),
    opts: &SeasonOptions,
) -> Result<SeasonOutcome> {
    let (min, max) = bounds;
    if year < min || year > max {
        return Err(ScrapeError::SeasonOutOfRange { year, min, max });
    }

    fetcher
        .fetch(&rlp::season_url(year))
        .await
        .map_err(|e| ScrapeError::SeasonIndexUnavailable {
            year,
            source: Box::new(e),
        })?;

    let source = fetcher.provenance();
    let mut pages: Vec<RoundPage> = (1..=rlp::max_rounds(year)).map(RoundPage::Regular).collect();
    if opts.include_finals {
        pages.extend(rlp::FINALS_PAGES.iter().copied().map(RoundPage::Finals));
    }

    let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (order, page) in pages.into_iter().enumerate() {
        let fetcher = Arc::clone(&fetcher);
        let semaphore = Arc::clone(&semaphore);
        let url = page.url(year);
        let label = page.label();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let parsed = match fetcher.fetch(&url).await {
                Ok(body) => parse::parse_results_page(&body, year, &url),
                Err(e) => Err(e),
            };
            (order, label, parsed)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => warn!(year, error = %e, "round task failed to complete"),
        }
    }
    // Dedup is last-parsed-wins, so fold in round order regardless of
    // completion order.
    results.sort_by_key(|(order, ..)| *order);

    let mut by_id: HashMap<String, MatchRecord> = HashMap::new();
    let mut failed_rounds = Vec::new();
    let mut identity_collisions = 0u32;

    for (_, label, parsed) in results {
        match parsed {
            Ok(raws) if raws.is_empty() => {
                debug!(year, round = %label, "round parsed to zero matches, skipping");
            }
            Ok(raws) => {
                for raw in raws {
                    if !opts.include_finals && (opts.finals_predicate)(&raw.round_label) {
                        continue;
                    }
                    let record = resolve(raw, normalizer, source);
                    if let Some(previous) = by_id.insert(record.match_id.clone(), record) {
                        identity_collisions += 1;
                        warn!(
                            year,
                            match_id = %previous.match_id,
                            home = %previous.home_team,
                            away = %previous.away_team,
                            "identifier collision within season; keeping last-parsed record"
                        );
                    }
                }
            }
            // An absent page is a round that was never played (future
            // rounds, short pre-2007 seasons, finals before September),
            // not a failure.
            Err(e) if e.is_not_found() => {
                debug!(year, round = %label, "round page absent, treating as zero matches");
            }
            Err(e) => {
                warn!(year, round = %label, error = %e, "round contributed no matches");
                failed_rounds.push(RoundFailure {
                    label,
                    error: e.to_string(),
                });
            }
        }
    }

    let records: Vec<MatchRecord> = by_id
        .into_values()
        .sorted_by(|a, b| (a.date, &a.home_team).cmp(&(b.date, &b.home_team)))
        .collect();

    info!(
        year,
        matches = records.len(),
        failed_rounds = failed_rounds.len(),
        identity_collisions,
        "season scrape complete"
    );

    Ok(SeasonOutcome {
        year,
        records,
        failed_rounds,
        identity_collisions,
    })
}

/// Scrape a range of seasons sequentially. A failed season is recorded and
/// the range carries on; the caller turns failures into an exit code.
pub(crate) async fn scrape_range(
    fetcher: Arc<dyn FetchDocument>,
    normalizer: &Normalizer,
    start_year: u16,
    end_year: u16,
    bounds: (u16, u16),
    opts: &SeasonOptions,
) -> RangeReport {
    let mut report = RangeReport::default();
    for year in start_year..=end_year {
        let outcome = scrape_season(Arc::clone(&fetcher), normalizer, year, bounds, opts).await;
        match &outcome {
            Ok(o) => info!(year, matches = o.total(), "season complete"),
            Err(e) => warn!(year, error = %e, "season failed"),
        }
        report.seasons.push(SeasonResult { year, outcome });
    }
    report
}

/// Normalize the raw fields and assign the identifier. Raw values are
/// carried through untouched.
fn resolve(raw: RawMatch, normalizer: &Normalizer, source: Source) -> MatchRecord {
    let home_team = normalizer.normalize(&raw.home_team_raw, EntityKind::Team);
    let away_team = normalizer.normalize(&raw.away_team_raw, EntityKind::Team);
    let venue = raw
        .venue_raw
        .as_deref()
        .map(|v| normalizer.normalize(v, EntityKind::Venue));
    let referee = raw
        .referee_raw
        .as_deref()
        .map(|r| normalizer.normalize(r, EntityKind::Referee));
    let match_id = identity::match_id(raw.season, raw.date, &home_team, &away_team);

    MatchRecord {
        match_id,
        source,
        source_url: raw.source_url,
        season: raw.season,
        round_label: raw.round_label,
        date: raw.date,
        home_team,
        away_team,
        home_team_raw: raw.home_team_raw,
        away_team_raw: raw.away_team_raw,
        home_score: raw.home_score,
        away_score: raw.away_score,
        venue,
        venue_raw: raw.venue_raw,
        referee,
        referee_raw: raw.referee_raw,
        crowd: raw.crowd,
        home_penalties: raw.home_penalties,
        away_penalties: raw.away_penalties,
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;

    use super::*;

    /// In-memory page store; anything not present is a hard 404, anything
    /// listed as broken is a 500.
    #[derive(Default)]
    struct MockFetcher {
        pages: HashMap<String, String>,
        broken: std::collections::HashSet<String>,
    }

    impl MockFetcher {
        fn with_index(year: u16) -> Self {
            let mut m = Self::default();
            m.pages.insert(
                rlp::season_url(year),
                "<html><body>season index</body></html>".to_string(),
            );
            m
        }

        fn round(mut self, year: u16, round: u32, body: &str) -> Self {
            self.pages.insert(rlp::round_url(year, round), body.to_string());
            self
        }

        fn finals(mut self, year: u16, slug: &str, body: &str) -> Self {
            self.pages.insert(rlp::finals_url(year, slug), body.to_string());
            self
        }

        fn broken_round(mut self, year: u16, round: u32) -> Self {
            self.broken.insert(rlp::round_url(year, round));
            self
        }
    }

    impl FetchDocument for MockFetcher {
        fn fetch<'a>(
            &'a self,
            url: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
            Box::pin(async move {
                if self.broken.contains(url) {
                    return Err(ScrapeError::UnexpectedStatus {
                        url: url.to_string(),
                        status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                    });
                }
                self.pages
                    .get(url)
                    .cloned()
                    .ok_or_else(|| ScrapeError::UnexpectedStatus {
                        url: url.to_string(),
                        status: reqwest::StatusCode::NOT_FOUND,
                    })
            })
        }

        fn provenance(&self) -> Source {
            Source::Mock
        }
    }

    const BOUNDS: (u16, u16) = (1998, 2025);

    fn fixture(home: &str, hs: u32, away: &str, asc: u32, venue: &str, date: &str) -> String {
        format!(
            "<p>{home} {hs} (Tries: A) defeated {away} {asc} (Tries: B) at {venue}. \
             Date: {date}. Referee: Ashley Klein. Crowd: 10,000 View </p>"
        )
    }

    fn page(round_heading: &str, fixtures: &[String]) -> String {
        format!(
            "<html><body><h1>{round_heading}</h1>{}</body></html>",
            fixtures.concat()
        )
    }

    fn opts() -> SeasonOptions {
        SeasonOptions::default()
    }

    #[tokio::test]
    async fn test_season_scrape_normalizes_and_identifies() {
        let fetcher = MockFetcher::with_index(2024)
            .round(
                2024,
                1,
                &page(
                    "NRL 2024 Round 1",
                    &[
                        fixture("Broncos", 24, "Roosters", 18, "Suncorp", "Friday 8th March"),
                        fixture("Storm", 30, "Eels", 12, "AAMI Park", "Saturday 9th March"),
                    ],
                ),
            )
            .round(
                2024,
                2,
                &page(
                    "NRL 2024 Round 2",
                    &[fixture(
                        "Panthers", 20, "Bulldogs", 16, "BlueBet Stadium", "Friday 15th March",
                    )],
                ),
            );
        let normalizer = Normalizer::nrl();

        let outcome = scrape_season(Arc::new(fetcher), &normalizer, 2024, BOUNDS, &opts())
            .await
            .unwrap();

        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.identity_collisions, 0);
        // The other 25 regular rounds and all finals pages 404: absent
        // pages, not failures.
        assert!(outcome.failed_rounds.is_empty());

        let first = &outcome.records[0];
        assert_eq!(first.home_team, "Brisbane Broncos");
        assert_eq!(first.home_team_raw, "Broncos");
        assert_eq!(first.venue.as_deref(), Some("Suncorp Stadium"));
        assert_eq!(first.venue_raw.as_deref(), Some("Suncorp"));
        assert_eq!(first.source, Source::Mock);
        assert_eq!(first.match_id.len(), 32);
        assert_eq!(
            first.match_id,
            identity::match_id(2024, first.date, "Brisbane Broncos", "Sydney Roosters")
        );
    }

    #[tokio::test]
    async fn test_rescrape_is_deterministic() {
        let build = || {
            MockFetcher::with_index(2024).round(
                2024,
                1,
                &page(
                    "NRL 2024 Round 1",
                    &[fixture("Broncos", 24, "Roosters", 18, "Suncorp", "Friday 8th March")],
                ),
            )
        };
        let normalizer = Normalizer::nrl();
        let a = scrape_season(Arc::new(build()), &normalizer, 2024, BOUNDS, &opts())
            .await
            .unwrap();
        let b = scrape_season(Arc::new(build()), &normalizer, 2024, BOUNDS, &opts())
            .await
            .unwrap();
        assert_eq!(a.records, b.records);
    }

    #[tokio::test]
    async fn test_duplicate_identifier_last_parsed_wins() {
        // The same fixture listed in two round pages with a corrected
        // score: one record survives, carrying the later scrape's fields.
        let fetcher = MockFetcher::with_index(2024)
            .round(
                2024,
                1,
                &page(
                    "NRL 2024 Round 1",
                    &[fixture("Broncos", 10, "Roosters", 0, "Suncorp", "Friday 8th March")],
                ),
            )
            .round(
                2024,
                2,
                &page(
                    "NRL 2024 Round 2",
                    &[fixture("Brisbane", 24, "Sydney", 18, "Lang Park", "Friday 8th March")],
                ),
            );
        let normalizer = Normalizer::nrl();

        let outcome = scrape_season(Arc::new(fetcher), &normalizer, 2024, BOUNDS, &opts())
            .await
            .unwrap();

        assert_eq!(outcome.total(), 1);
        assert_eq!(outcome.identity_collisions, 1);
        let record = &outcome.records[0];
        assert_eq!(record.home_score, 24);
        assert_eq!(record.round_label, "Round 2");
        assert_eq!(record.home_team, "Brisbane Broncos");
    }

    #[tokio::test]
    async fn test_finals_pages_fetched_only_when_requested() {
        let grand_final = page(
            "Grand Final",
            &[fixture(
                "Panthers", 14, "Storm", 6, "Accor Stadium", "Sunday 6th October",
            )],
        );
        let build = || {
            MockFetcher::with_index(2024)
                .round(
                    2024,
                    1,
                    &page(
                        "NRL 2024 Round 1",
                        &[fixture("Broncos", 24, "Roosters", 18, "Suncorp", "Friday 8th March")],
                    ),
                )
                .finals(2024, "grand-final", &grand_final)
        };
        let normalizer = Normalizer::nrl();

        let with_finals = scrape_season(Arc::new(build()), &normalizer, 2024, BOUNDS, &opts())
            .await
            .unwrap();
        assert_eq!(with_finals.total(), 2);
        assert_eq!(with_finals.finals_count(), 1);

        let no_finals = SeasonOptions {
            include_finals: false,
            ..opts()
        };
        let regular_only = scrape_season(Arc::new(build()), &normalizer, 2024, BOUNDS, &no_finals)
            .await
            .unwrap();
        assert_eq!(regular_only.total(), 1);
        assert_eq!(regular_only.finals_count(), 0);
        assert!(regular_only.failed_rounds.is_empty());
    }

    #[tokio::test]
    async fn test_absent_round_pages_are_not_failures() {
        // Only round 1 exists; every other page 404s, as in a season where
        // the trailing rounds have not been played yet.
        let fetcher = MockFetcher::with_index(2024).round(
            2024,
            1,
            &page(
                "NRL 2024 Round 1",
                &[fixture("Broncos", 24, "Roosters", 18, "Suncorp", "Friday 8th March")],
            ),
        );
        let normalizer = Normalizer::nrl();

        let outcome = scrape_season(Arc::new(fetcher), &normalizer, 2024, BOUNDS, &opts())
            .await
            .unwrap();

        assert_eq!(outcome.total(), 1);
        assert!(outcome.failed_rounds.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_round_is_recorded_as_failure() {
        let fetcher = MockFetcher::with_index(2024)
            .round(
                2024,
                1,
                &page(
                    "NRL 2024 Round 1",
                    &[fixture("Broncos", 24, "Roosters", 18, "Suncorp", "Friday 8th March")],
                ),
            )
            .broken_round(2024, 2);
        let normalizer = Normalizer::nrl();

        let outcome = scrape_season(Arc::new(fetcher), &normalizer, 2024, BOUNDS, &opts())
            .await
            .unwrap();

        assert_eq!(outcome.total(), 1);
        assert_eq!(outcome.failed_rounds.len(), 1);
        assert_eq!(outcome.failed_rounds[0].label, "Round 2");
        assert!(outcome.failed_rounds[0].error.contains("500"));
    }

    #[tokio::test]
    async fn test_season_out_of_bounds() {
        let normalizer = Normalizer::nrl();
        let err = scrape_season(
            Arc::new(MockFetcher::default()),
            &normalizer,
            1997,
            BOUNDS,
            &opts(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScrapeError::SeasonOutOfRange { year: 1997, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_index_fails_season() {
        let normalizer = Normalizer::nrl();
        let err = scrape_season(
            Arc::new(MockFetcher::default()),
            &normalizer,
            2024,
            BOUNDS,
            &opts(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::SeasonIndexUnavailable { year: 2024, .. }
        ));
    }

    #[tokio::test]
    async fn test_range_survives_failed_season() {
        // 2023 has no index page at all; 2024 works.
        let mut fetcher = MockFetcher::with_index(2024).round(
            2024,
            1,
            &page(
                "NRL 2024 Round 1",
                &[fixture("Broncos", 24, "Roosters", 18, "Suncorp", "Friday 8th March")],
            ),
        );
        fetcher.pages.remove(&rlp::season_url(2023));
        let normalizer = Normalizer::nrl();

        let report = scrape_range(Arc::new(fetcher), &normalizer, 2023, 2024, BOUNDS, &opts()).await;

        assert_eq!(report.failed_years(), vec![2023]);
        assert!(!report.all_succeeded());
        assert_eq!(report.total_records(), 1);
        assert_eq!(report.seasons.len(), 2);
    }
}
