use chrono::NaiveDate;
use serde::Serialize;

/// Provenance of a match record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Source {
    /// Rugby League Project, the primary results site.
    Rlp,
    /// Fixture documents injected in tests or dry runs.
    Mock,
}

/// Default finals detection: the round label convention on RLP is that
/// every post-regular-season page carries "Final" in its label. Upstream
/// label formats drift, so callers can swap in their own predicate via
/// [`SeasonOptions`](crate::SeasonOptions).
pub fn is_finals_label(label: &str) -> bool {
    label.to_lowercase().contains("final")
}

/// One played fixture, fully normalized and identified.
///
/// The `match_id` is a pure function of season, date and the two canonical
/// team names; scores, venue and round label are deliberately excluded so a
/// later scrape correcting one of them updates the existing row instead of
/// creating a duplicate. Raw `_raw` fields keep the scraped text verbatim
/// for traceability and are never mutated after parse time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub source: Source,
    pub source_url: String,
    pub season: u16,
    pub round_label: String,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_team_raw: String,
    pub away_team_raw: String,
    pub home_score: u32,
    pub away_score: u32,
    pub venue: Option<String>,
    pub venue_raw: Option<String>,
    pub referee: Option<String>,
    pub referee_raw: Option<String>,
    pub crowd: Option<u32>,
    pub home_penalties: Option<u32>,
    pub away_penalties: Option<u32>,
}

impl MatchRecord {
    pub fn is_finals(&self) -> bool {
        is_finals_label(&self.round_label)
    }

    pub fn home_win(&self) -> bool {
        self.home_score > self.away_score
    }

    /// Winning margin; positive means the home side won.
    pub fn margin(&self) -> i64 {
        self.home_score as i64 - self.away_score as i64
    }
}
