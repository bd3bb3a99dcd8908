//! Canonicalization of free-text team, venue and referee names.
//!
//! Alias tables are immutable once built and live for the whole process;
//! table maintenance is a source-edit, not a runtime write. A lookup miss is
//! not an error: the trimmed input passes through unchanged and a per-kind
//! counter records the miss for later table maintenance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

/// The three entity kinds that get canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    Team,
    Venue,
    Referee,
}

/// Lookup-key cleanup: lowercase, strip punctuation, collapse whitespace.
/// Applied to table keys at build time and to inputs on the second lookup
/// attempt, so "St. George" and "st george" converge.
fn fold_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Conservative cleanup for values passed through on a miss: trim and
/// collapse internal whitespace, keep the original casing and punctuation
/// so an unmapped name still reads like a name.
fn tidy(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Immutable raw-variant -> canonical mapping for one entity kind.
#[derive(Debug, Default)]
pub struct AliasTable {
    exact: HashMap<String, String>,
    folded: HashMap<String, String>,
}

impl AliasTable {
    /// Build from (canonical, aliases) pairs. Every canonical name maps to
    /// itself so already-canonical input is a first-try hit.
    pub fn from_pairs(pairs: &[(&str, &[&str])]) -> Self {
        let mut exact = HashMap::new();
        let mut folded = HashMap::new();
        for (canonical, aliases) in pairs {
            exact.insert((*canonical).to_string(), (*canonical).to_string());
            folded.insert(fold_key(canonical), (*canonical).to_string());
            for alias in *aliases {
                exact.insert((*alias).to_string(), (*canonical).to_string());
                folded.insert(fold_key(alias), (*canonical).to_string());
            }
        }
        Self { exact, folded }
    }

    fn lookup(&self, raw: &str) -> Option<&str> {
        self.exact
            .get(raw)
            .or_else(|| self.folded.get(&fold_key(raw)))
            .map(String::as_str)
    }

    pub fn canonical_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .folded
            .values()
            .map(String::as_str)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        names.sort_unstable();
        names
    }

    /// Aliases known for one canonical name, for the lookup-table sink.
    pub fn aliases_of(&self, canonical: &str) -> Vec<&str> {
        let mut aliases: Vec<&str> = self
            .exact
            .iter()
            .filter(|(k, v)| v.as_str() == canonical && k.as_str() != canonical)
            .map(|(k, _)| k.as_str())
            .collect();
        aliases.sort_unstable();
        aliases
    }
}

/// Maps raw scraped names to canonical ones, counting misses per kind.
/// Safe to share across concurrent round tasks.
#[derive(Debug)]
pub struct Normalizer {
    teams: AliasTable,
    venues: AliasTable,
    referees: AliasTable,
    misses: [AtomicU64; 3],
}

impl Normalizer {
    pub fn new(teams: AliasTable, venues: AliasTable, referees: AliasTable) -> Self {
        Self {
            teams,
            venues,
            referees,
            misses: [AtomicU64::new(0), AtomicU64::new(0), AtomicU64::new(0)],
        }
    }

    /// The built-in NRL tables.
    pub fn nrl() -> Self {
        Self::new(
            AliasTable::from_pairs(TEAM_ALIASES),
            AliasTable::from_pairs(VENUE_ALIASES),
            AliasTable::default(),
        )
    }

    fn table(&self, kind: EntityKind) -> &AliasTable {
        match kind {
            EntityKind::Team => &self.teams,
            EntityKind::Venue => &self.venues,
            EntityKind::Referee => &self.referees,
        }
    }

    /// Canonicalize `raw`. On a total miss the tidied input passes through
    /// unchanged and the miss counter for `kind` is incremented.
    ///
    /// Idempotent: feeding the output back in returns it unchanged.
    pub fn normalize(&self, raw: &str, kind: EntityKind) -> String {
        if let Some(canonical) = self.table(kind).lookup(raw) {
            return canonical.to_string();
        }
        self.misses[kind as usize].fetch_add(1, Ordering::Relaxed);
        debug!(kind = %kind, raw, "no canonical mapping");
        tidy(raw)
    }

    /// Total lookup misses observed for `kind` since construction.
    pub fn misses(&self, kind: EntityKind) -> u64 {
        self.misses[kind as usize].load(Ordering::Relaxed)
    }

    pub fn teams(&self) -> &AliasTable {
        &self.teams
    }

    pub fn venues(&self) -> &AliasTable {
        &self.venues
    }
}

// Canonical NRL team names and the spellings seen on results pages over
// the 1998-2025 window.
pub const TEAM_ALIASES: &[(&str, &[&str])] = &[
    ("Brisbane Broncos", &["broncos", "brisbane"]),
    ("Canberra Raiders", &["raiders", "canberra"]),
    (
        "Canterbury Bulldogs",
        &[
            "bulldogs",
            "canterbury",
            "canterbury bankstown",
            "canterbury-bankstown",
            "canterbury bankstown bulldogs",
        ],
    ),
    (
        "Cronulla Sharks",
        &[
            "sharks",
            "cronulla",
            "cronulla sutherland",
            "cronulla-sutherland",
            "cronulla sutherland sharks",
        ],
    ),
    (
        "Dolphins",
        &["dolphins", "the dolphins", "redcliffe", "redcliffe dolphins"],
    ),
    ("Gold Coast Titans", &["titans", "gold coast"]),
    (
        "Manly Sea Eagles",
        &[
            "sea eagles",
            "manly",
            "manly warringah",
            "manly-warringah",
            "manly warringah sea eagles",
        ],
    ),
    ("Melbourne Storm", &["storm", "melbourne"]),
    ("Newcastle Knights", &["knights", "newcastle"]),
    (
        "New Zealand Warriors",
        &["warriors", "new zealand", "nz warriors", "auckland warriors"],
    ),
    (
        "North Queensland Cowboys",
        &[
            "cowboys",
            "north queensland",
            "north qld",
            "nth qld",
            "nq cowboys",
        ],
    ),
    ("Parramatta Eels", &["eels", "parramatta", "parra"]),
    ("Penrith Panthers", &["panthers", "penrith"]),
    (
        "South Sydney Rabbitohs",
        &["rabbitohs", "south sydney", "souths", "bunnies"],
    ),
    (
        "St George Illawarra Dragons",
        &[
            "dragons",
            "st george",
            "st george illawarra",
            "st geo illa",
            "sgi",
            "saints",
        ],
    ),
    (
        "Sydney Roosters",
        &[
            "roosters",
            "sydney",
            "eastern suburbs",
            "easts",
            "sydney city roosters",
        ],
    ),
    (
        "Wests Tigers",
        &["tigers", "wests tigers", "wests", "west tigers"],
    ),
];

// Venue naming churns with sponsorship; aliases cover the historical names.
pub const VENUE_ALIASES: &[(&str, &[&str])] = &[
    (
        "Suncorp Stadium",
        &["suncorp", "lang park", "brisbane stadium"],
    ),
    (
        "Accor Stadium",
        &[
            "accor",
            "stadium australia",
            "anz stadium",
            "homebush",
            "olympic stadium",
            "telstra stadium",
        ],
    ),
    ("AAMI Park", &["aami", "melbourne rectangular"]),
    (
        "CommBank Stadium",
        &[
            "commbank",
            "bankwest",
            "bankwest stadium",
            "parramatta stadium",
            "western sydney stadium",
        ],
    ),
    (
        "4 Pines Park",
        &["4 pines", "brookvale", "brookvale oval", "lottoland"],
    ),
    (
        "BlueBet Stadium",
        &[
            "bluebet",
            "penrith stadium",
            "panthers stadium",
            "pepper stadium",
            "penrith park",
        ],
    ),
    (
        "PointsBet Stadium",
        &[
            "pointsbet",
            "sharks stadium",
            "shark park",
            "southern cross group stadium",
            "toyota stadium",
        ],
    ),
    (
        "McDonald Jones Stadium",
        &[
            "mcdonald jones",
            "mcd jones",
            "newcastle stadium",
            "hunter stadium",
            "energyaustralia stadium",
        ],
    ),
    (
        "Queensland Country Bank Stadium",
        &[
            "qld country bank",
            "qcb stadium",
            "qcb",
            "townsville stadium",
            "1300smiles",
            "1300smiles stadium",
            "dairy farmers",
        ],
    ),
    (
        "Cbus Super Stadium",
        &[
            "cbus",
            "robina",
            "robina stadium",
            "skilled park",
            "metricon stadium",
            "heritage bank stadium",
        ],
    ),
    (
        "Go Media Stadium",
        &[
            "go media",
            "mt smart",
            "mt smart stadium",
            "auckland",
            "ericsson stadium",
        ],
    ),
    (
        "GIO Stadium",
        &["gio", "canberra stadium", "bruce stadium"],
    ),
    (
        "WIN Stadium",
        &["win", "wollongong", "wollongong showground"],
    ),
    (
        "Netstrata Jubilee Stadium",
        &[
            "netstrata",
            "netstrata jubilee",
            "kogarah",
            "kogarah oval",
            "jubilee oval",
            "oki jubilee",
        ],
    ),
    (
        "Campbelltown Stadium",
        &["campbelltown", "campbelltown sports stadium"],
    ),
    ("Leichhardt Oval", &["leichhardt"]),
    (
        "Allianz Stadium",
        &["allianz", "sfs", "sydney football stadium", "moore park"],
    ),
    ("Allegiant Stadium", &["allegiant", "las vegas"]),
    ("Kayo Stadium", &["kayo"]),
    (
        "Belmore Sports Ground",
        &["belmore", "belmore oval"],
    ),
];
