use crate::error::ScrapeError;
use crate::model::MatchRecord;

/// A round page that contributed nothing, with the reason.
#[derive(Debug)]
pub struct RoundFailure {
    pub label: String,
    pub error: String,
}

/// Result of scraping one season: the deduplicated record set plus every
/// round that failed. A failed round is not fatal for the season.
#[derive(Debug)]
pub struct SeasonOutcome {
    pub year: u16,
    /// Deduplicated records, ordered by (date, home team).
    pub records: Vec<MatchRecord>,
    pub failed_rounds: Vec<RoundFailure>,
    /// Distinct raw blocks that mapped to an already-seen identifier.
    /// Either a duplicated fixture listing upstream or an alias-table gap.
    pub identity_collisions: u32,
}

impl SeasonOutcome {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn finals_count(&self) -> usize {
        self.records.iter().filter(|m| m.is_finals()).count()
    }

    pub fn regular_count(&self) -> usize {
        self.total() - self.finals_count()
    }
}

/// Per-season entry in a multi-season range report.
#[derive(Debug)]
pub struct SeasonResult {
    pub year: u16,
    pub outcome: Result<SeasonOutcome, ScrapeError>,
}

/// Outcome of a historical range scrape. One season failing outright does
/// not abort the range; it is recorded here and the caller decides the
/// process exit code.
#[derive(Debug, Default)]
pub struct RangeReport {
    pub seasons: Vec<SeasonResult>,
}

impl RangeReport {
    pub fn records(&self) -> impl Iterator<Item = &MatchRecord> {
        self.seasons
            .iter()
            .filter_map(|s| s.outcome.as_ref().ok())
            .flat_map(|o| o.records.iter())
    }

    pub fn total_records(&self) -> usize {
        self.records().count()
    }

    pub fn failed_years(&self) -> Vec<u16> {
        self.seasons
            .iter()
            .filter(|s| s.outcome.is_err())
            .map(|s| s.year)
            .collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.seasons.iter().all(|s| s.outcome.is_ok())
    }
}
