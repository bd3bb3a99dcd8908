//! Rugby League Project page access: URL templates, the retrying fetcher
//! and the results-page parser.

pub(crate) mod fetch;
pub(crate) mod parse;

pub(crate) const BASE_URL: &str = "https://www.rugbyleagueproject.org";

/// Finals pages in playing order; the slug doubles as the page path.
pub(crate) const FINALS_PAGES: &[&str] = &[
    "qualif-final",
    "elim-final",
    "semi-final",
    "prelim-final",
    "grand-final",
];

/// Season index page, probed before any round work starts.
pub(crate) fn season_url(year: u16) -> String {
    format!("{BASE_URL}/seasons/nrl-{year}/results.html")
}

pub(crate) fn round_url(year: u16, round: u32) -> String {
    format!("{BASE_URL}/seasons/nrl-{year}/round-{round}/summary.html")
}

pub(crate) fn finals_url(year: u16, slug: &str) -> String {
    format!("{BASE_URL}/seasons/nrl-{year}/{slug}/summary.html")
}

/// Regular-season round count per era. The competition moved to 27 rounds
/// in 2007; the 1998-2006 seasons ran 26 or fewer (trailing rounds that do
/// not exist simply parse to zero matches).
pub(crate) fn max_rounds(year: u16) -> u32 {
    if year >= 2007 {
        27
    } else {
        26
    }
}
