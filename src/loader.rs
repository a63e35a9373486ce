use crate::error::{DiversityError, Result};
use crate::models::{
    Classification, ClassificationSet, Dataset, InstitutionRecord, Level, Metric, ProportionMap,
};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const IDENTITY_COLUMNS: [&str; 5] = ["unitid", "institution", "city", "state", "level"];
pub const COUNT_COLUMNS: [&str; 3] = ["male_students", "female_students", "total_students"];
pub const GENDER_PROPORTIONS: &str = "gender_proportions";
pub const RACE_PROPORTIONS: &str = "race_proportions";

/// Tokens read as a missing value in numeric cells
const MISSING_TOKENS: [&str; 6] = ["", "nan", "none", "null", "na", "n/a"];

type Row = Map<String, Value>;

/// Every column the loader insists on, in the order they are checked
pub fn required_columns() -> Vec<&'static str> {
    let mut columns: Vec<&'static str> = Vec::new();
    columns.extend(IDENTITY_COLUMNS);
    columns.extend(COUNT_COLUMNS);
    columns.push(GENDER_PROPORTIONS);
    columns.push(RACE_PROPORTIONS);
    columns.extend(Metric::ALL.iter().map(|m| m.column()));
    columns.extend(Classification::ALL.iter().map(|c| c.column()));
    columns
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// Header row followed by one line per record
    Csv,
    /// Array of record objects
    Json,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SourceFormat::Json,
            _ => SourceFormat::Csv,
        }
    }

    /// Guess from the body of a download
    pub fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('[') {
            SourceFormat::Json
        } else {
            SourceFormat::Csv
        }
    }
}

/// A proportion cell as it arrives: already a mapping, or still serialized text
#[derive(Debug, Clone, PartialEq)]
pub enum ProportionField {
    Encoded(String),
    Structured(ProportionMap),
}

impl ProportionField {
    pub fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::String(text) => Ok(ProportionField::Encoded(text.clone())),
            Value::Object(_) => serde_json::from_value(value.clone())
                .map(ProportionField::Structured)
                .map_err(|e| e.to_string()),
            other => Err(format!("expected a category mapping, found {}", other)),
        }
    }

    pub fn into_map(self) -> std::result::Result<ProportionMap, String> {
        match self {
            ProportionField::Structured(map) => Ok(map),
            ProportionField::Encoded(text) => decode_proportions(&text),
        }
    }
}

/// Decode `{'female': 0.52, 'male': 0.48}` style text. Single quotes are
/// swapped for double quotes before JSON parsing.
pub fn decode_proportions(text: &str) -> std::result::Result<ProportionMap, String> {
    let normalized = text.trim().replace('\'', "\"");
    serde_json::from_str::<ProportionMap>(&normalized)
        .map_err(|e| format!("cannot decode {:?}: {}", text, e))
}

pub struct DatasetLoader {
    client: reqwest::Client,
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| DiversityError::Read {
            path: source.clone(),
            source: e,
        })?;

        parse_dataset(&content, SourceFormat::from_path(path), &source)
    }

    pub async fn load_url(&self, url: &str) -> Result<Dataset> {
        info!("Fetching dataset from {}", url);

        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await?
            .error_for_status()?;

        let content = response.text().await?;
        debug!("Downloaded {} bytes from {}", content.len(), url);

        parse_dataset(&content, SourceFormat::sniff(&content), url)
    }
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a whole source into a dataset. Any schema or cell error aborts the load.
pub fn parse_dataset(content: &str, format: SourceFormat, source: &str) -> Result<Dataset> {
    let rows = match format {
        SourceFormat::Csv => read_csv_rows(content)?,
        SourceFormat::Json => read_json_rows(content)?,
    };

    let records = rows
        .iter()
        .enumerate()
        .map(|(i, row)| record_from_row(i + 1, row))
        .collect::<Result<Vec<_>>>()?;

    let records = drop_duplicate_ids(records);
    info!("Loaded {} institution records from {}", records.len(), source);

    Ok(Dataset::new(records, source))
}

fn check_columns<'a>(present: impl Iterator<Item = &'a str>) -> Result<()> {
    let present: HashSet<&str> = present.collect();
    match required_columns().into_iter().find(|c| !present.contains(c)) {
        Some(column) => Err(DiversityError::Schema {
            column: column.to_string(),
        }),
        None => Ok(()),
    }
}

fn read_csv_rows(content: &str) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    check_columns(headers.iter().map(String::as_str))?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.clone(), Value::String(cell.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

fn read_json_rows(content: &str) -> Result<Vec<Row>> {
    let Value::Array(items) = serde_json::from_str::<Value>(content)? else {
        return Err(DiversityError::parse(0, "<root>", "expected an array of records"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(row) => {
                check_columns(row.keys().map(String::as_str))?;
                Ok(row)
            }
            _ => Err(DiversityError::parse(i + 1, "<record>", "expected an object")),
        })
        .collect()
}

fn record_from_row(row_number: usize, row: &Row) -> Result<InstitutionRecord> {
    let mut classifications = ClassificationSet::empty();
    for classification in Classification::ALL {
        classifications.set(classification, flag(row_number, row, classification.column())?);
    }

    let mut record = InstitutionRecord {
        unitid: text(row, "unitid"),
        institution: text(row, "institution"),
        city: text(row, "city"),
        state: text(row, "state"),
        level: Level::parse(&text(row, "level")),
        male_students: count(row_number, row, "male_students")?,
        female_students: count(row_number, row, "female_students")?,
        total_students: count(row_number, row, "total_students")?,
        gender_proportions: proportions(row_number, row, GENDER_PROPORTIONS)?,
        race_proportions: proportions(row_number, row, RACE_PROPORTIONS)?,
        percent_female: 0.0,
        percent_of_color: 0.0,
        metrics: [None; 11],
        classifications,
    };

    for metric in Metric::ALL {
        record.set_metric(metric, number(row_number, row, metric.column())?);
    }
    record.derive_percentages();

    Ok(record)
}

fn text(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn number(row_number: usize, row: &Row, column: &str) -> Result<Option<f64>> {
    let value = match row.get(column) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if MISSING_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t)) {
                None
            } else {
                let parsed = s.parse::<f64>().map_err(|_| {
                    DiversityError::parse(row_number, column, format!("not a number: {:?}", s))
                })?;
                Some(parsed)
            }
        }
        Some(other) => {
            return Err(DiversityError::parse(
                row_number,
                column,
                format!("not a number: {}", other),
            ))
        }
    };

    Ok(value.filter(|v| !v.is_nan()))
}

fn count(row_number: usize, row: &Row, column: &str) -> Result<u64> {
    match number(row_number, row, column)? {
        None => Ok(0),
        Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        Some(v) => Err(DiversityError::parse(
            row_number,
            column,
            format!("expected a non-negative whole number, found {}", v),
        )),
    }
}

fn flag(row_number: usize, row: &Row, column: &str) -> Result<bool> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "" | "false" | "f" | "no" | "n" | "nan" => Ok(false),
            "true" | "t" | "yes" | "y" => Ok(true),
            // Any other number counts like a JSON number: nonzero is set
            other => match other.parse::<f64>() {
                Ok(v) => Ok(v != 0.0),
                Err(_) => Err(DiversityError::parse(
                    row_number,
                    column,
                    format!("not a boolean flag: {:?}", other),
                )),
            },
        },
        Some(other) => Err(DiversityError::parse(
            row_number,
            column,
            format!("not a boolean flag: {}", other),
        )),
    }
}

fn proportions(row_number: usize, row: &Row, column: &str) -> Result<ProportionMap> {
    let field = match row.get(column) {
        Some(value) => ProportionField::from_value(value),
        None => Err("missing value".to_string()),
    };

    field
        .and_then(ProportionField::into_map)
        .map_err(|message| DiversityError::parse(row_number, column, message))
}

/// Keep the first row for each (unitid, level) pair
fn drop_duplicate_ids(records: Vec<InstitutionRecord>) -> Vec<InstitutionRecord> {
    let mut seen: HashSet<(String, Level)> = HashSet::new();

    records
        .into_iter()
        .filter(|record| {
            let first = seen.insert((record.unitid.clone(), record.level.clone()));
            if !first {
                warn!(
                    "Duplicate unitid {} at level {}, keeping the first occurrence",
                    record.unitid, record.level
                );
            }
            first
        })
        .collect()
}
