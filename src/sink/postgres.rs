use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::MatchRecord;
use crate::normalize::Normalizer;
use crate::sink::MatchSink;

// ON CONFLICT upsert keyed on the content identifier. Every derived field
// is replaced on re-scrape; match_id and created_at are never touched by
// the update arm.
const UPSERT_MATCH: &str = r#"
INSERT INTO matches (
    match_id, source, source_url, season, round, date,
    home_team, away_team, home_team_raw, away_team_raw,
    home_score, away_score, venue, venue_raw,
    referee, referee_raw, crowd, home_penalties, away_penalties,
    updated_at
) VALUES (
    $1, $2, $3, $4, $5, $6,
    $7, $8, $9, $10,
    $11, $12, $13, $14,
    $15, $16, $17, $18, $19,
    now()
)
ON CONFLICT (match_id) DO UPDATE SET
    source = EXCLUDED.source,
    source_url = EXCLUDED.source_url,
    season = EXCLUDED.season,
    round = EXCLUDED.round,
    date = EXCLUDED.date,
    home_team = EXCLUDED.home_team,
    away_team = EXCLUDED.away_team,
    home_team_raw = EXCLUDED.home_team_raw,
    away_team_raw = EXCLUDED.away_team_raw,
    home_score = EXCLUDED.home_score,
    away_score = EXCLUDED.away_score,
    venue = EXCLUDED.venue,
    venue_raw = EXCLUDED.venue_raw,
    referee = EXCLUDED.referee,
    referee_raw = EXCLUDED.referee_raw,
    crowd = EXCLUDED.crowd,
    home_penalties = EXCLUDED.home_penalties,
    away_penalties = EXCLUDED.away_penalties,
    updated_at = now()
"#;

fn alias_upsert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {table} (name, aliases) VALUES ($1, $2) \
         ON CONFLICT (name) DO UPDATE SET aliases = EXCLUDED.aliases"
    )
}

/// Postgres sink; see `migrations/0001_init.sql` for the schema bootstrap.
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        info!("connected to postgres");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Seed the `teams` and `venues` lookup tables from the in-code alias
    /// tables, replacing each row's alias array wholesale. Returns the
    /// number of canonical names written.
    pub async fn upsert_aliases(&self, normalizer: &Normalizer) -> Result<usize> {
        let mut rows = 0;
        for (table, aliases) in [("teams", normalizer.teams()), ("venues", normalizer.venues())] {
            let sql = alias_upsert_sql(table);
            for name in aliases.canonical_names() {
                let list: Vec<String> = aliases
                    .aliases_of(name)
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                sqlx::query(&sql)
                    .bind(name)
                    .bind(&list)
                    .execute(&self.pool)
                    .await?;
                rows += 1;
            }
        }
        debug!(rows, "seeded alias lookup tables");
        Ok(rows)
    }

    pub async fn count_matches(&self, season: Option<u16>) -> Result<i64> {
        let count = match season {
            Some(year) => {
                sqlx::query_scalar::<_, i64>("SELECT count(*) FROM matches WHERE season = $1")
                    .bind(year as i32)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT count(*) FROM matches")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }
}

impl MatchSink for PgSink {
    async fn upsert_batch(&self, rows: &[MatchRecord]) -> Result<usize> {
        let mut count = 0;
        for row in rows {
            sqlx::query(UPSERT_MATCH)
                .bind(&row.match_id)
                .bind(row.source.to_string())
                .bind(&row.source_url)
                .bind(row.season as i32)
                .bind(&row.round_label)
                .bind(row.date)
                .bind(&row.home_team)
                .bind(&row.away_team)
                .bind(&row.home_team_raw)
                .bind(&row.away_team_raw)
                .bind(row.home_score as i32)
                .bind(row.away_score as i32)
                .bind(row.venue.as_deref())
                .bind(row.venue_raw.as_deref())
                .bind(row.referee.as_deref())
                .bind(row.referee_raw.as_deref())
                .bind(row.crowd.map(|c| c as i32))
                .bind(row.home_penalties.map(|p| p as i32))
                .bind(row.away_penalties.map(|p| p as i32))
                .execute(&self.pool)
                .await?;
            count += 1;
        }
        debug!(rows = count, "upserted match batch");
        Ok(count)
    }
}
