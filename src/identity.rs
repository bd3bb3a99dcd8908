//! Stable content-addressed match identifiers.
//!
//! The identifier is the natural key for upsert and deduplication, so it
//! hashes only the fields that identify a fixture: season, date and the two
//! canonical team names, in that fixed order. Scores, venue and round label
//! are excluded on purpose; a later scrape correcting any of them must land
//! on the same row.

use std::fmt::Write;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

const DIGEST_BYTES: usize = 16;

/// Derive the deterministic identifier for a fixture.
///
/// Same inputs produce the same identifier across runs and processes.
/// Output is 32 lowercase hex characters.
pub fn match_id(season: u16, date: NaiveDate, home_canonical: &str, away_canonical: &str) -> String {
    let key = format!(
        "{}|{}|{}|{}",
        season,
        date.format("%Y-%m-%d"),
        home_canonical.trim().to_lowercase(),
        away_canonical.trim().to_lowercase(),
    );
    let digest = Sha256::digest(key.as_bytes());
    digest[..DIGEST_BYTES]
        .iter()
        .fold(String::with_capacity(DIGEST_BYTES * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}
