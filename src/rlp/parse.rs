use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::Html;
use tracing::debug;

use crate::error::{Result, ScrapeError};
use crate::model::RawMatch;

// Result sentences on RLP read "<home> <score> (scorers) defeated <away>
// <score> (scorers) at <venue>." — older pages drop the scorer
// parentheticals, so both shapes are tried in order.
static RESULT_FULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([A-Za-z][A-Za-z\s-]*?)\s+(\d+)\s+\([^)]*\)\s+(?:defeated|drew with|lost to)\s+([A-Za-z][A-Za-z\s-]*?)\s+(\d+)\s+\([^)]*\)\s+at\s+([^.\n]+)",
    )
    .unwrap()
});

static RESULT_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([A-Za-z][A-Za-z\s-]*?)\s+(\d+)\s+(?:defeated|drew with|lost to)\s+([A-Za-z][A-Za-z\s-]*?)\s+(\d+)\s+at\s+([^.\n]+)",
    )
    .unwrap()
});

// One block per fixture; the page separates them with chevron links and
// "View" anchors.
static BLOCK_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:>|View)\s+").unwrap());

static ROUND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Round\s+(\d+)").unwrap());

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Date:\s*([A-Za-z]+,?\s*\d+[a-z]*\s+[A-Za-z]+)").unwrap()
});

static REFEREE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Referee:\s*([A-Za-z\s.]+?)\s*(?:\.|Crowd)").unwrap());

static CROWD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Crowd:\s*([\d,]+)").unwrap());

static PENALTIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Penalties:\s*[A-Za-z\s]+?(\d+)-(\d+)").unwrap());

static ORDINAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)(?:st|nd|rd|th)").unwrap());

static ROUND_IN_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"round-(\d+)").unwrap());

const FINALS_LABELS: &[&str] = &[
    "Qualifying Final",
    "Elimination Final",
    "Semi Final",
    "Preliminary Final",
    "Grand Final",
];

/// Extract every fixture from one round/finals page.
///
/// Pure function of the page text, season and source URL: re-parsing the
/// same document yields the same sequence. A block that matches the result
/// pattern but lacks a date anchor is an error for the whole round; text
/// that matches no result pattern is not a fixture block and is skipped.
pub(crate) fn parse_results_page(
    html: &str,
    season: u16,
    source_url: &str,
) -> Result<Vec<RawMatch>> {
    let document = Html::parse_document(html);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");

    let mut rows = Vec::new();
    for (block_index, block) in BLOCK_SPLIT.split(&text).enumerate() {
        if let Some(row) = parse_match_block(block, season, source_url, block_index)? {
            rows.push(row);
        }
    }

    debug!(season, source_url, matches = rows.len(), "parsed results page");
    Ok(rows)
}

fn parse_match_block(
    block: &str,
    season: u16,
    source_url: &str,
    block_index: usize,
) -> Result<Option<RawMatch>> {
    let caps = match RESULT_FULL.captures(block).or_else(|| RESULT_BARE.captures(block)) {
        Some(caps) => caps,
        None => return Ok(None),
    };

    let home_team_raw = caps[1].trim().to_string();
    let away_team_raw = caps[3].trim().to_string();
    let home_score: u32 = caps[2].parse()?;
    let away_score: u32 = caps[4].parse()?;
    let venue_raw = Some(caps[5].trim().to_string()).filter(|v| !v.is_empty());

    // Date is a hard requirement: identity derivation hangs off it, so a
    // block without the anchor poisons the whole round rather than
    // emitting a partial record.
    let date_raw = DATE
        .captures(block)
        .map(|c| c[1].to_string())
        .ok_or_else(|| ScrapeError::Parse {
            reason: format!("missing date anchor ({home_team_raw} v {away_team_raw})"),
            block_index,
        })?;
    let date = parse_block_date(&date_raw, season, block_index)?;

    let round_label = round_label(block, source_url);

    let referee_raw = REFEREE.captures(block).map(|c| c[1].trim().to_string());
    let crowd = CROWD
        .captures(block)
        .and_then(|c| c[1].replace(',', "").parse().ok());
    let (home_penalties, away_penalties) = PENALTIES
        .captures(block)
        .map(|c| (c[1].parse().ok(), c[2].parse().ok()))
        .unwrap_or((None, None));

    Ok(Some(RawMatch {
        season,
        round_label,
        date,
        home_team_raw,
        away_team_raw,
        home_score,
        away_score,
        venue_raw,
        referee_raw,
        crowd,
        home_penalties,
        away_penalties,
        source_url: source_url.to_string(),
    }))
}

/// Round designation: from the block text when present, from the source
/// URL otherwise. Finals pages carry the label in prose, not a number.
fn round_label(block: &str, source_url: &str) -> String {
    if let Some(caps) = ROUND.captures(block) {
        return format!("Round {}", &caps[1]);
    }
    let lowered = block.to_lowercase();
    for label in FINALS_LABELS {
        if lowered.contains(&label.to_lowercase()) {
            return (*label).to_string();
        }
    }
    if let Some(caps) = ROUND_IN_URL.captures(source_url) {
        return format!("Round {}", &caps[1]);
    }
    for slug in crate::rlp::FINALS_PAGES {
        if source_url.contains(slug) {
            return slug
                .split('-')
                .map(|w| {
                    let mut c = w.chars();
                    match c.next() {
                        Some(first) => first.to_uppercase().chain(c).collect::<String>(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
        }
    }
    "Unknown".to_string()
}

/// RLP dates read "Friday 8th March" with the year implied by the season.
/// Ordinal suffixes are stripped; a weekday prefix that disagrees with the
/// calendar still resolves via the day-month fallback.
fn parse_block_date(raw: &str, season: u16, block_index: usize) -> Result<NaiveDate> {
    let cleaned = ORDINAL.replace_all(raw, "$1").replace(',', "");
    let cleaned = cleaned.trim();
    let with_year = format!("{cleaned} {season}");
    for fmt in ["%A %d %B %Y", "%a %d %B %Y", "%d %B %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&with_year, fmt) {
            return Ok(date);
        }
    }
    if let Some((_, rest)) = cleaned.split_once(' ') {
        let with_year = format!("{} {season}", rest.trim());
        if let Ok(date) = NaiveDate::parse_from_str(&with_year, "%d %B %Y") {
            return Ok(date);
        }
    }
    Err(ScrapeError::Parse {
        reason: format!("unparseable date {raw:?}"),
        block_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUND_URL: &str =
        "https://www.rugbyleagueproject.org/seasons/nrl-2024/round-1/summary.html";

    fn round_page() -> String {
        // Two fixtures in the shape the live round summary pages render to
        // after tag stripping: result sentence first, then the metadata
        // anchors, then the "View" link closing the block.
        r#"<html><body>
        <h1>NRL 2024 Round 1</h1>
        <p>Brisbane Broncos 24 (Tries: Walsh 2)
        defeated Sydney Roosters 18 (Tries: Tedesco) at Suncorp Stadium.
        Date: Friday 8th March. Referee: Ashley Klein. Crowd: 45,123
        Penalties: Broncos 5-4 View </p>
        <p>Storm 30 (Tries: Papenhuyzen 2)
        defeated Eels 12 (Tries: Brown) at AAMI Park.
        Date: Saturday 9th March. Referee: Adam Gee. Crowd: 21,046 View </p>
        </body></html>"#
            .to_string()
    }

    #[test]
    fn test_parses_fixture_blocks() {
        let rows = parse_results_page(&round_page(), 2024, ROUND_URL).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.home_team_raw, "Brisbane Broncos");
        assert_eq!(first.away_team_raw, "Sydney Roosters");
        assert_eq!(first.home_score, 24);
        assert_eq!(first.away_score, 18);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert_eq!(first.round_label, "Round 1");
        assert_eq!(first.venue_raw.as_deref(), Some("Suncorp Stadium"));
        assert_eq!(first.referee_raw.as_deref(), Some("Ashley Klein"));
        assert_eq!(first.crowd, Some(45_123));
        assert_eq!(first.home_penalties, Some(5));
        assert_eq!(first.away_penalties, Some(4));

        let second = &rows[1];
        assert_eq!(second.home_team_raw, "Storm");
        assert_eq!(second.crowd, Some(21_046));
        assert_eq!(second.home_penalties, None);
    }

    #[test]
    fn test_reparse_is_identical() {
        let page = round_page();
        let a = parse_results_page(&page, 2024, ROUND_URL).unwrap();
        let b = parse_results_page(&page, 2024, ROUND_URL).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_match_page_is_empty_not_error() {
        let html = "<html><body><h1>NRL 2024 Round 27</h1><p>No results yet.</p></body></html>";
        let rows = parse_results_page(html, 2024, ROUND_URL).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_date_anchor_is_parse_error() {
        let html = r#"<html><body><p>Broncos 24 (Tries) defeated Roosters 18 (Tries)
        at Suncorp Stadium. Referee: Ashley Klein. View </p></body></html>"#;
        let err = parse_results_page(html, 2024, ROUND_URL).unwrap_err();
        assert!(matches!(err, ScrapeError::Parse { .. }));
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn test_bare_result_sentence_without_scorers() {
        let html = r#"<html><body><p>Raiders 20 defeated Knights 10 at GIO Stadium.
        Date: Sunday 10th March. View </p></body></html>"#;
        let rows = parse_results_page(html, 2024, ROUND_URL).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].home_team_raw, "Raiders");
        assert_eq!(rows[0].away_score, 10);
    }

    #[test]
    fn test_lost_to_keeps_listed_order() {
        let html = r#"<html><body><p>Titans 12 lost to Sharks 36 at Cbus Super Stadium.
        Date: Sunday 10th March. View </p></body></html>"#;
        let rows = parse_results_page(html, 2024, ROUND_URL).unwrap();
        assert_eq!(rows[0].home_team_raw, "Titans");
        assert_eq!(rows[0].home_score, 12);
        assert_eq!(rows[0].away_team_raw, "Sharks");
        assert_eq!(rows[0].away_score, 36);
    }

    #[test]
    fn test_hyphenated_team_names() {
        let html = r#"<html><body><p>Canterbury-Bankstown Bulldogs 16 (Tries: X)
        defeated Manly-Warringah Sea Eagles 12 (Tries: Y) at Belmore Sports Ground.
        Date: Sunday 10th March. View </p></body></html>"#;
        let rows = parse_results_page(html, 2024, ROUND_URL).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].home_team_raw, "Canterbury-Bankstown Bulldogs");
        assert_eq!(rows[0].away_team_raw, "Manly-Warringah Sea Eagles");
    }

    #[test]
    fn test_finals_label_from_block_text() {
        let url = "https://www.rugbyleagueproject.org/seasons/nrl-2024/grand-final/summary.html";
        let html = r#"<html><body><p>Grand Final
        Penrith Panthers 14 defeated Melbourne Storm 6 at Accor Stadium.
        Date: Sunday 6th October. View </p></body></html>"#;
        let rows = parse_results_page(html, 2024, url).unwrap();
        assert_eq!(rows[0].round_label, "Grand Final");
    }

    #[test]
    fn test_round_label_falls_back_to_url() {
        let html = r#"<html><body><p>Broncos 24 defeated Roosters 18 at Suncorp Stadium.
        Date: Friday 8th March. View </p></body></html>"#;
        let rows = parse_results_page(html, 2024, ROUND_URL).unwrap();
        assert_eq!(rows[0].round_label, "Round 1");

        let finals_url =
            "https://www.rugbyleagueproject.org/seasons/nrl-2024/prelim-final/summary.html";
        let rows = parse_results_page(html, 2024, finals_url).unwrap();
        assert_eq!(rows[0].round_label, "Prelim Final");
    }

    #[test]
    fn test_date_with_mismatched_weekday_still_resolves() {
        // Upstream typo: 9 March 2024 was a Saturday.
        let html = r#"<html><body><p>Broncos 24 defeated Roosters 18 at Suncorp Stadium.
        Date: Friday 9th March. View </p></body></html>"#;
        let rows = parse_results_page(html, 2024, ROUND_URL).unwrap();
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }
}
