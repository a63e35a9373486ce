//! Output table cells and CSV export.
//!
//! The terminal table and the exported file are both built from [`table_cells`],
//! so what gets written is exactly what was shown.

use crate::error::Result;
use crate::models::Metric;
use crate::ranking::{RankedRow, RankedTable};
use csv::{ReaderBuilder, Writer};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn table_headers(include_level: bool) -> Vec<&'static str> {
    let mut headers = vec!["rank", "institution", "city", "state"];
    if include_level {
        headers.push("level");
    }
    headers.extend(["diversity_score", "percent_female", "percent_of_color", "total_students"]);
    headers
}

pub fn table_cells(row: &RankedRow, include_level: bool) -> Vec<String> {
    let record = row.record;
    let mut cells = vec![
        row.rank.to_string(),
        record.institution.clone(),
        record.city.clone(),
        record.state.clone(),
    ];
    if include_level {
        cells.push(record.level.to_string());
    }
    cells.extend([
        row.score.to_string(),
        record.percent_female.to_string(),
        record.percent_of_color.to_string(),
        record.total_students.to_string(),
    ]);
    cells
}

/// `diversity_rankings_<metric>.csv`
pub fn export_file_name(metric: Metric) -> String {
    format!("diversity_rankings_{}.csv", metric.column())
}

pub fn write_csv<W: io::Write>(table: &RankedTable, include_level: bool, writer: W) -> Result<()> {
    let mut writer = Writer::from_writer(writer);

    writer.write_record(table_headers(include_level))?;
    for row in table.rows() {
        writer.write_record(table_cells(row, include_level))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn to_csv_string(table: &RankedTable, include_level: bool) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(table, include_level, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Write the table into `output_dir` and return the file path
pub fn save_csv(table: &RankedTable, include_level: bool, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(export_file_name(table.metric()));
    let file = fs::File::create(&path)?;
    write_csv(table, include_level, io::BufWriter::new(file))?;
    Ok(path)
}

/// One row of an exported file read back
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportedRow {
    pub rank: usize,
    pub institution: String,
    pub city: String,
    pub state: String,
    /// `None` when the export has no level column; a blank cell reads back as `Some("")`
    #[serde(default, deserialize_with = "present_column")]
    pub level: Option<String>,
    pub diversity_score: f64,
    pub percent_female: f64,
    pub percent_of_color: f64,
    pub total_students: u64,
}

fn present_column<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Some)
}

pub fn read_csv<R: io::Read>(reader: R) -> Result<Vec<ExportedRow>> {
    let mut reader = ReaderBuilder::new().from_reader(reader);
    let rows = reader
        .deserialize::<ExportedRow>()
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{filter, FilterCriteria};
    use crate::models::fixtures::*;
    use crate::models::{Classification, Dataset};
    use crate::ranking::rank;

    fn tricky_dataset() -> Dataset {
        let mut quoted = with_flag(
            with_metric(
                record("Smith, Jones \"& Co\" College", "NY", "total"),
                Metric::BlausGender,
                0.123456789,
            ),
            Classification::Business,
        );
        quoted.city = "New York".to_string();
        quoted.percent_female = 48.57;

        let plain = with_flag(
            with_metric(record("Plain College", "NY", "graduate"), Metric::BlausGender, 0.5),
            Classification::Business,
        );
        Dataset::new(vec![quoted, plain], "fixture")
    }

    #[test]
    fn test_headers_with_and_without_level() {
        assert_eq!(table_headers(false).len(), 8);
        assert_eq!(table_headers(true)[4], "level");
    }

    #[test]
    fn test_export_file_name_follows_metric() {
        assert_eq!(export_file_name(Metric::BlausRace), "diversity_rankings_blaus_race.csv");
    }

    #[test]
    fn test_export_round_trip() {
        let dataset = tricky_dataset();
        let subset = filter(&dataset, &FilterCriteria::default());
        let table = rank(&subset, Metric::BlausGender);

        let csv_text = to_csv_string(&table, true).unwrap();
        assert!(csv_text.starts_with("rank,institution,city,state,level,diversity_score"));

        let rows = read_csv(csv_text.as_bytes()).unwrap();
        assert_eq!(rows.len(), table.len());
        for (exported, ranked) in rows.iter().zip(table.rows()) {
            assert_eq!(exported.rank, ranked.rank);
            assert_eq!(exported.institution, ranked.record.institution);
            assert_eq!(exported.city, ranked.record.city);
            assert_eq!(exported.level.as_deref(), Some(ranked.record.level.as_str()));
            assert_eq!(exported.diversity_score, ranked.score);
            assert_eq!(exported.percent_female, ranked.record.percent_female);
            assert_eq!(exported.percent_of_color, ranked.record.percent_of_color);
            assert_eq!(exported.total_students, ranked.record.total_students);
        }
    }

    #[test]
    fn test_blank_level_round_trips() {
        let blank = with_flag(
            with_metric(record("Unlevelled College", "VT", ""), Metric::BlausGender, 0.7),
            Classification::Business,
        );
        assert_eq!(blank.level.as_str(), "");
        let dataset = Dataset::new(vec![blank], "fixture");
        let subset = filter(&dataset, &FilterCriteria::default());
        let table = rank(&subset, Metric::BlausGender);

        let rows = read_csv(to_csv_string(&table, true).unwrap().as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level.as_deref(), Some(""));
        assert_eq!(rows[0].institution, "Unlevelled College");
    }

    #[test]
    fn test_export_without_level_column() {
        let dataset = tricky_dataset();
        let subset = filter(&dataset, &FilterCriteria::default());
        let table = rank(&subset, Metric::BlausGender);

        let rows = read_csv(to_csv_string(&table, false).unwrap().as_bytes()).unwrap();
        assert!(rows.iter().all(|r| r.level.is_none()));
    }

    #[test]
    fn test_save_csv_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = tricky_dataset();
        let subset = filter(&dataset, &FilterCriteria::default());
        let table = rank(&subset, Metric::BlausGender);

        let path = save_csv(&table, false, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "diversity_rankings_blaus_gender.csv");

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, to_csv_string(&table, false).unwrap());
    }
}
