use chrono::NaiveDate;
use serde::Serialize;

/// One fixture as extracted from a results page, before normalization and
/// identity assignment. All text fields are verbatim page content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMatch {
    pub season: u16,
    pub round_label: String,
    pub date: NaiveDate,
    pub home_team_raw: String,
    pub away_team_raw: String,
    pub home_score: u32,
    pub away_score: u32,
    pub venue_raw: Option<String>,
    pub referee_raw: Option<String>,
    pub crowd: Option<u32>,
    pub home_penalties: Option<u32>,
    pub away_penalties: Option<u32>,
    pub source_url: String,
}
