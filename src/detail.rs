use crate::error::{DiversityError, Result};
use crate::models::{InstitutionRecord, Metric, ProportionMap};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricScore {
    pub metric: Metric,
    pub label: &'static str,
    pub value: Option<f64>,
}

/// Everything shown for a single selected institution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstitutionProfile {
    pub unitid: String,
    pub institution: String,
    pub city: String,
    pub state: String,
    pub level: String,
    pub male_students: u64,
    pub female_students: u64,
    pub total_students: u64,
    pub percent_female: f64,
    pub percent_of_color: f64,
    pub gender_proportions: ProportionMap,
    pub race_proportions: ProportionMap,
    pub scores: Vec<MetricScore>,
    /// Labels of the classifications the institution carries, in canonical order
    pub classifications: Vec<&'static str>,
}

impl From<&InstitutionRecord> for InstitutionProfile {
    fn from(record: &InstitutionRecord) -> Self {
        Self {
            unitid: record.unitid.clone(),
            institution: record.institution.clone(),
            city: record.city.clone(),
            state: record.state.clone(),
            level: record.level.to_string(),
            male_students: record.male_students,
            female_students: record.female_students,
            total_students: record.total_students,
            percent_female: record.percent_female,
            percent_of_color: record.percent_of_color,
            gender_proportions: record.gender_proportions.clone(),
            race_proportions: record.race_proportions.clone(),
            scores: Metric::ALL
                .iter()
                .map(|metric| MetricScore {
                    metric: *metric,
                    label: metric.label(),
                    value: record.metric(*metric),
                })
                .collect(),
            classifications: record.classifications.iter().map(|c| c.label()).collect(),
        }
    }
}

/// Look up an institution by exact name among the records currently selected.
/// The first match wins, so on a ranked table that is the best-ranked row.
pub fn detail<'a, I>(records: I, institution: &str) -> Result<InstitutionProfile>
where
    I: IntoIterator<Item = &'a InstitutionRecord>,
{
    let wanted = institution.trim();
    records
        .into_iter()
        .find(|record| record.institution == wanted)
        .map(InstitutionProfile::from)
        .ok_or_else(|| DiversityError::NotFound(wanted.to_string()))
}
