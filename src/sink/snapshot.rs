use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::basic::Compression;
use parquet::data_type::{ByteArray, ByteArrayType, Int32Type};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::{SerializedFileWriter, SerializedRowGroupWriter};
use parquet::schema::parser::parse_message_type;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::model::MatchRecord;

// Column order here must match the write order in write_season exactly.
const MATCH_SCHEMA: &str = "
message nrl_match {
    required binary match_id (UTF8);
    required binary source (UTF8);
    required binary source_url (UTF8);
    required int32 season;
    required binary round (UTF8);
    required binary date (UTF8);
    required binary home_team (UTF8);
    required binary away_team (UTF8);
    required binary home_team_raw (UTF8);
    required binary away_team_raw (UTF8);
    required int32 home_score;
    required int32 away_score;
    optional binary venue (UTF8);
    optional binary venue_raw (UTF8);
    optional binary referee (UTF8);
    optional binary referee_raw (UTF8);
    optional int32 crowd;
    optional int32 home_penalties;
    optional int32 away_penalties;
}
";

#[derive(Serialize)]
struct Manifest<'a> {
    version: &'a str,
    table: &'a str,
    season: u16,
    rows: usize,
}

/// Point-in-time snapshot writer: one parquet file plus a manifest per
/// season partition. Pure function of the batch it is given; it never
/// reads or writes the relational store.
pub struct ParquetExport {
    root: PathBuf,
}

impl ParquetExport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write one season partition under
    /// `<root>/<table>/season=<year>/part-000.parquet`.
    pub fn write_season(
        &self,
        table: &str,
        season: u16,
        rows: &[&MatchRecord],
    ) -> Result<PathBuf> {
        let dir = self.root.join(table).join(format!("season={season}"));
        fs::create_dir_all(&dir)?;
        let path = dir.join("part-000.parquet");

        let schema = Arc::new(parse_message_type(MATCH_SCHEMA)?);
        let props = Arc::new(
            WriterProperties::builder()
                .set_compression(Compression::SNAPPY)
                .build(),
        );
        let file = File::create(&path)?;
        let mut writer = SerializedFileWriter::new(file, schema, props)?;
        let mut group = writer.next_row_group()?;

        write_str(&mut group, rows.iter().map(|r| r.match_id.as_str()))?;
        write_str(&mut group, rows.iter().map(|r| ByteArray::from(r.source.to_string().into_bytes())))?;
        write_str(&mut group, rows.iter().map(|r| r.source_url.as_str()))?;
        write_i32(&mut group, rows.iter().map(|r| r.season as i32))?;
        write_str(&mut group, rows.iter().map(|r| r.round_label.as_str()))?;
        write_str(&mut group, rows.iter().map(|r| {
            ByteArray::from(r.date.format("%Y-%m-%d").to_string().into_bytes())
        }))?;
        write_str(&mut group, rows.iter().map(|r| r.home_team.as_str()))?;
        write_str(&mut group, rows.iter().map(|r| r.away_team.as_str()))?;
        write_str(&mut group, rows.iter().map(|r| r.home_team_raw.as_str()))?;
        write_str(&mut group, rows.iter().map(|r| r.away_team_raw.as_str()))?;
        write_i32(&mut group, rows.iter().map(|r| r.home_score as i32))?;
        write_i32(&mut group, rows.iter().map(|r| r.away_score as i32))?;
        write_opt_str(&mut group, rows.iter().map(|r| r.venue.as_deref()))?;
        write_opt_str(&mut group, rows.iter().map(|r| r.venue_raw.as_deref()))?;
        write_opt_str(&mut group, rows.iter().map(|r| r.referee.as_deref()))?;
        write_opt_str(&mut group, rows.iter().map(|r| r.referee_raw.as_deref()))?;
        write_opt_i32(&mut group, rows.iter().map(|r| r.crowd.map(|v| v as i32)))?;
        write_opt_i32(&mut group, rows.iter().map(|r| r.home_penalties.map(|v| v as i32)))?;
        write_opt_i32(&mut group, rows.iter().map(|r| r.away_penalties.map(|v| v as i32)))?;

        group.close()?;
        writer.close()?;

        let manifest = Manifest {
            version: "1",
            table,
            season,
            rows: rows.len(),
        };
        fs::write(
            dir.join("_manifest.json"),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        info!(table, season, rows = rows.len(), path = %path.display(), "wrote snapshot partition");
        Ok(path)
    }

    /// Write a full batch, partitioned by season.
    pub fn write_batch(&self, table: &str, rows: &[MatchRecord]) -> Result<Vec<PathBuf>> {
        let mut by_season: BTreeMap<u16, Vec<&MatchRecord>> = BTreeMap::new();
        for row in rows {
            by_season.entry(row.season).or_default().push(row);
        }
        let mut paths = Vec::with_capacity(by_season.len());
        for (season, group) in by_season {
            paths.push(self.write_season(table, season, &group)?);
        }
        Ok(paths)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

type RowGroup<'a> = SerializedRowGroupWriter<'a, File>;

fn next_column<'a, 'b>(
    group: &'b mut RowGroup<'a>,
) -> Result<parquet::file::writer::SerializedColumnWriter<'b>> {
    group
        .next_column()?
        .ok_or_else(|| ParquetError::General("schema/write column mismatch".to_string()).into())
}

fn write_str<S: Into<ByteArray>>(
    group: &mut RowGroup<'_>,
    values: impl Iterator<Item = S>,
) -> Result<()> {
    let values: Vec<ByteArray> = values.map(Into::into).collect();
    let mut column = next_column(group)?;
    column
        .typed::<ByteArrayType>()
        .write_batch(&values, None, None)?;
    column.close()?;
    Ok(())
}

fn write_opt_str<'v>(
    group: &mut RowGroup<'_>,
    values: impl Iterator<Item = Option<&'v str>>,
) -> Result<()> {
    let mut present = Vec::new();
    let mut def_levels = Vec::new();
    for value in values {
        match value {
            Some(v) => {
                present.push(ByteArray::from(v));
                def_levels.push(1i16);
            }
            None => def_levels.push(0i16),
        }
    }
    let mut column = next_column(group)?;
    column
        .typed::<ByteArrayType>()
        .write_batch(&present, Some(&def_levels), None)?;
    column.close()?;
    Ok(())
}

fn write_i32(group: &mut RowGroup<'_>, values: impl Iterator<Item = i32>) -> Result<()> {
    let values: Vec<i32> = values.collect();
    let mut column = next_column(group)?;
    column.typed::<Int32Type>().write_batch(&values, None, None)?;
    column.close()?;
    Ok(())
}

fn write_opt_i32(
    group: &mut RowGroup<'_>,
    values: impl Iterator<Item = Option<i32>>,
) -> Result<()> {
    let mut present = Vec::new();
    let mut def_levels = Vec::new();
    for value in values {
        match value {
            Some(v) => {
                present.push(v);
                def_levels.push(1i16);
            }
            None => def_levels.push(0i16),
        }
    }
    let mut column = next_column(group)?;
    column
        .typed::<Int32Type>()
        .write_batch(&present, Some(&def_levels), None)?;
    column.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use parquet::file::reader::{FileReader, SerializedFileReader};

    use super::*;
    use crate::model::Source;

    fn record(season: u16, home: &str, away: &str) -> MatchRecord {
        MatchRecord {
            match_id: crate::identity::match_id(
                season,
                NaiveDate::from_ymd_opt(season as i32, 3, 2).unwrap(),
                home,
                away,
            ),
            source: Source::Mock,
            source_url: "mock://fixture".to_string(),
            season,
            round_label: "Round 1".to_string(),
            date: NaiveDate::from_ymd_opt(season as i32, 3, 2).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_team_raw: home.to_string(),
            away_team_raw: away.to_string(),
            home_score: 24,
            away_score: 18,
            venue: Some("Suncorp Stadium".to_string()),
            venue_raw: Some("Suncorp".to_string()),
            referee: None,
            referee_raw: None,
            crowd: Some(45_000),
            home_penalties: None,
            away_penalties: None,
        }
    }

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nrl-scrape-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_write_batch_partitions_by_season() {
        let root = temp_root("partition");
        let export = ParquetExport::new(&root);
        let rows = vec![
            record(2023, "Brisbane Broncos", "Sydney Roosters"),
            record(2024, "Penrith Panthers", "Melbourne Storm"),
            record(2024, "Brisbane Broncos", "Melbourne Storm"),
        ];

        let paths = export.write_batch("matches", &rows).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("matches/season=2023/part-000.parquet"));
        assert!(paths[1].ends_with("matches/season=2024/part-000.parquet"));

        let reader = SerializedFileReader::new(File::open(&paths[1]).unwrap()).unwrap();
        assert_eq!(reader.metadata().file_metadata().num_rows(), 2);

        let manifest = fs::read_to_string(
            root.join("matches").join("season=2024").join("_manifest.json"),
        )
        .unwrap();
        assert!(manifest.contains("\"rows\": 2"));
        assert!(manifest.contains("\"season\": 2024"));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_snapshot_is_pure_function_of_batch() {
        let root_a = temp_root("pure-a");
        let root_b = temp_root("pure-b");
        let rows = vec![record(2024, "Brisbane Broncos", "Sydney Roosters")];

        let a = ParquetExport::new(&root_a).write_batch("matches", &rows).unwrap();
        let b = ParquetExport::new(&root_b).write_batch("matches", &rows).unwrap();

        let read_rows = |path: &PathBuf| {
            let reader = SerializedFileReader::new(File::open(path).unwrap()).unwrap();
            reader.metadata().file_metadata().num_rows()
        };
        assert_eq!(read_rows(&a[0]), read_rows(&b[0]));

        fs::remove_dir_all(&root_a).ok();
        fs::remove_dir_all(&root_b).ok();
    }
}
