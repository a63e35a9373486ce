use crate::error::{DiversityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Category -> fraction mapping decoded from the proportion columns
pub type ProportionMap = BTreeMap<String, f64>;

pub const FEMALE_KEY: &str = "female";
pub const WHITE_NON_HISPANIC_KEY: &str = "white_nh";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DescriptiveGender,
    DescriptiveRace,
    DescriptiveJoint,
    RepresentativeGender,
    RepresentativeRace,
    RepresentativeJoint,
    CompensatoryGender,
    CompensatoryRace,
    CompensatoryJoint,
    BlausGender,
    BlausRace,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::DescriptiveGender,
        Metric::DescriptiveRace,
        Metric::DescriptiveJoint,
        Metric::RepresentativeGender,
        Metric::RepresentativeRace,
        Metric::RepresentativeJoint,
        Metric::CompensatoryGender,
        Metric::CompensatoryRace,
        Metric::CompensatoryJoint,
        Metric::BlausGender,
        Metric::BlausRace,
    ];

    /// Column name in the source table
    pub fn column(&self) -> &'static str {
        match self {
            Metric::DescriptiveGender => "descriptive_gender",
            Metric::DescriptiveRace => "descriptive_race",
            Metric::DescriptiveJoint => "descriptive_joint",
            Metric::RepresentativeGender => "representative_gender",
            Metric::RepresentativeRace => "representative_race",
            Metric::RepresentativeJoint => "representative_joint",
            Metric::CompensatoryGender => "compensatory_gender",
            Metric::CompensatoryRace => "compensatory_race",
            Metric::CompensatoryJoint => "compensatory_joint",
            Metric::BlausGender => "blaus_gender",
            Metric::BlausRace => "blaus_race",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::DescriptiveGender => "Descriptive (Gender)",
            Metric::DescriptiveRace => "Descriptive (Race)",
            Metric::DescriptiveJoint => "Descriptive (Joint)",
            Metric::RepresentativeGender => "Representative (Gender)",
            Metric::RepresentativeRace => "Representative (Race)",
            Metric::RepresentativeJoint => "Representative (Joint)",
            Metric::CompensatoryGender => "Compensatory (Gender)",
            Metric::CompensatoryRace => "Compensatory (Race)",
            Metric::CompensatoryJoint => "Compensatory (Joint)",
            Metric::BlausGender => "Blau Index (Gender)",
            Metric::BlausRace => "Blau Index (Race)",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = DiversityError;

    /// Accepts either the column name or the display label, case-insensitively
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Metric::ALL
            .iter()
            .copied()
            .find(|m| {
                m.column().eq_ignore_ascii_case(wanted) || m.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| DiversityError::MetricNotFound(wanted.to_string()))
    }
}

/// Carnegie-style institution classification. Flags are independent; a record may carry several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    R1,
    R2,
    DoctoralProfessional,
    Masters,
    Baccalaureate,
    BaccalaureateAssociates,
    Associates,
    SpecialFocus,
    Tribal,
    Hbcu,
    FaithRelated,
    MedicalHealth,
    EngineeringTech,
    Business,
    Arts,
    Law,
}

impl Classification {
    pub const ALL: [Classification; 16] = [
        Classification::R1,
        Classification::R2,
        Classification::DoctoralProfessional,
        Classification::Masters,
        Classification::Baccalaureate,
        Classification::BaccalaureateAssociates,
        Classification::Associates,
        Classification::SpecialFocus,
        Classification::Tribal,
        Classification::Hbcu,
        Classification::FaithRelated,
        Classification::MedicalHealth,
        Classification::EngineeringTech,
        Classification::Business,
        Classification::Arts,
        Classification::Law,
    ];

    /// Flag column name in the source table
    pub fn column(&self) -> &'static str {
        match self {
            Classification::R1 => "R1",
            Classification::R2 => "R2",
            Classification::DoctoralProfessional => "D/PU",
            Classification::Masters => "Masters",
            Classification::Baccalaureate => "Baccalaureate",
            Classification::BaccalaureateAssociates => "BacAssoc",
            Classification::Associates => "Associates",
            Classification::SpecialFocus => "SpecialFocus",
            Classification::Tribal => "Tribal",
            Classification::Hbcu => "HBCU",
            Classification::FaithRelated => "FaithRelated",
            Classification::MedicalHealth => "MedicalHealth",
            Classification::EngineeringTech => "EngineeringTech",
            Classification::Business => "Business",
            Classification::Arts => "Arts",
            Classification::Law => "Law",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Classification::R1 => "R1: Doctoral Universities – Very high research activity",
            Classification::R2 => "R2: Doctoral Universities – High research activity",
            Classification::DoctoralProfessional => "D/PU: Doctoral/Professional Universities",
            Classification::Masters => "Master's Colleges and Universities",
            Classification::Baccalaureate => "Baccalaureate Colleges",
            Classification::BaccalaureateAssociates => "Baccalaureate/Associate's Colleges",
            Classification::Associates => "Associate's Colleges",
            Classification::SpecialFocus => "Special Focus Institutions",
            Classification::Tribal => "Tribal Colleges and Universities",
            Classification::Hbcu => "HBCU (Historically Black Colleges and Universities)",
            Classification::FaithRelated => "Faith-Related Institutions",
            Classification::MedicalHealth => "Medical Schools & Centers",
            Classification::EngineeringTech => "Engineering and Technology Schools",
            Classification::Business => "Business & Management Schools",
            Classification::Arts => "Arts, Music & Design Schools",
            Classification::Law => "Law Schools",
        }
    }

    fn bit(&self) -> u16 {
        1 << (*self as u16)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Classification {
    type Err = DiversityError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Classification::ALL
            .iter()
            .copied()
            .find(|c| {
                c.column().eq_ignore_ascii_case(wanted) || c.label().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| DiversityError::Config(format!("unknown classification: {}", wanted)))
    }
}

/// Fixed-size set of classification flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ClassificationSet(u16);

impl ClassificationSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Classification::ALL.iter().copied().collect()
    }

    pub fn insert(&mut self, classification: Classification) {
        self.0 |= classification.bit();
    }

    pub fn remove(&mut self, classification: Classification) {
        self.0 &= !classification.bit();
    }

    pub fn set(&mut self, classification: Classification, included: bool) {
        if included {
            self.insert(classification);
        } else {
            self.remove(classification);
        }
    }

    pub fn contains(&self, classification: Classification) -> bool {
        self.0 & classification.bit() != 0
    }

    /// True when at least one flag is shared with `other`
    pub fn intersects(&self, other: &ClassificationSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Members in canonical order
    pub fn iter(&self) -> impl Iterator<Item = Classification> + '_ {
        Classification::ALL.iter().copied().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Classification> for ClassificationSet {
    fn from_iter<I: IntoIterator<Item = Classification>>(iter: I) -> Self {
        let mut set = ClassificationSet::empty();
        for classification in iter {
            set.insert(classification);
        }
        set
    }
}

/// Program level a row describes.
///
/// Levels compare case-insensitively: `Other("Other")` equals `Other("other")`,
/// while the stored text keeps the casing found in the data.
#[derive(Debug, Clone)]
pub enum Level {
    Total,
    Undergraduate,
    Graduate,
    /// Anything else, kept verbatim
    Other(String),
}

impl Level {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_lowercase().as_str() {
            "total" | "all" => Level::Total,
            "undergraduate" | "undergrad" => Level::Undergraduate,
            "graduate" | "grad" => Level::Graduate,
            _ => Level::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Level::Total => "total",
            Level::Undergraduate => "undergraduate",
            Level::Graduate => "graduate",
            Level::Other(raw) => raw,
        }
    }

    /// Lowercased text used for equality, hashing and ordering
    fn key(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for Level {}

impl std::hash::Hash for Level {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::hash::Hash::hash(&self.key(), state);
    }
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstitutionRecord {
    pub unitid: String,
    pub institution: String,
    pub city: String,
    pub state: String,
    pub level: Level,
    pub male_students: u64,
    pub female_students: u64,
    pub total_students: u64,
    pub gender_proportions: ProportionMap,
    pub race_proportions: ProportionMap,
    pub percent_female: f64,
    pub percent_of_color: f64,
    pub metrics: [Option<f64>; 11],
    pub classifications: ClassificationSet,
}

impl InstitutionRecord {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics[metric.index()]
    }

    pub fn set_metric(&mut self, metric: Metric, value: Option<f64>) {
        self.metrics[metric.index()] = value;
    }

    pub fn has_classification(&self, classification: Classification) -> bool {
        self.classifications.contains(classification)
    }

    /// Fill in `percent_female` and `percent_of_color` from the proportion maps
    pub fn derive_percentages(&mut self) {
        let female = self.gender_proportions.get(FEMALE_KEY).copied().unwrap_or(0.0);
        let white_nh = self.race_proportions.get(WHITE_NON_HISPANIC_KEY).copied().unwrap_or(0.0);
        self.percent_female = to_percent(female);
        self.percent_of_color = to_percent(1.0 - white_nh);
    }
}

/// Fraction to a percentage rounded to two decimals, clamped to [0, 100]
pub fn to_percent(fraction: f64) -> f64 {
    let rounded = (fraction * 100.0 * 100.0).round() / 100.0;
    // also folds -0.0 into 0.0
    if rounded <= 0.0 {
        0.0
    } else {
        rounded.min(100.0)
    }
}

/// The loaded dataset. Immutable once built; pipeline stages only borrow it.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<InstitutionRecord>,
    source: String,
}

impl Dataset {
    pub fn new(records: Vec<InstitutionRecord>, source: impl Into<String>) -> Self {
        Self {
            records,
            source: source.into(),
        }
    }

    pub fn records(&self) -> &[InstitutionRecord] {
        &self.records
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted, de-duplicated state codes
    pub fn states(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|r| r.state.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Metrics with at least one value in the data
    pub fn available_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .iter()
            .copied()
            .filter(|m| self.records.iter().any(|r| r.metric(*m).is_some()))
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_metric_from_column_and_label() {
        assert_eq!("blaus_race".parse::<Metric>().unwrap(), Metric::BlausRace);
        assert_eq!(
            "Representative (Joint)".parse::<Metric>().unwrap(),
            Metric::RepresentativeJoint
        );
        assert!(matches!(
            "shannon".parse::<Metric>(),
            Err(DiversityError::MetricNotFound(name)) if name == "shannon"
        ));
    }

    #[test]
    fn test_classification_codes_are_unique() {
        let codes: BTreeSet<&str> = Classification::ALL.iter().map(|c| c.column()).collect();
        assert_eq!(codes.len(), 16);
        assert_eq!("d/pu".parse::<Classification>().unwrap(), Classification::DoctoralProfessional);
    }

    #[test]
    fn test_classification_set_operations() {
        let mut set = ClassificationSet::empty();
        set.insert(Classification::Hbcu);
        set.insert(Classification::Law);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Classification::Hbcu));
        assert!(!set.contains(Classification::Masters));

        let other: ClassificationSet = [Classification::Law].into_iter().collect();
        assert!(set.intersects(&other));

        set.set(Classification::Law, false);
        assert!(!set.intersects(&other));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Classification::Hbcu]);
        assert_eq!(ClassificationSet::all().len(), 16);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("Undergraduate"), Level::Undergraduate);
        assert_eq!(Level::parse(" all "), Level::Total);
        assert_eq!(Level::parse("Doctoral"), Level::Other("Doctoral".to_string()));
        assert_eq!(Level::parse("Doctoral").as_str(), "Doctoral");
    }

    #[test]
    fn test_level_equality_ignores_case() {
        assert_eq!(Level::parse("Other"), Level::parse("other"));
        assert_eq!(Level::Other("TOTAL".to_string()), Level::Total);
        assert_ne!(Level::parse("other"), Level::parse("certificate"));

        let keys = std::collections::HashSet::from([Level::parse("Other"), Level::parse("OTHER")]);
        assert_eq!(keys.len(), 1);
    }

    #[test]
    fn test_derive_percentages() {
        let mut r = record("A", "CT", "total");
        r.gender_proportions = ProportionMap::from([("female".to_string(), 0.51234)]);
        r.race_proportions = ProportionMap::from([("white_nh".to_string(), 0.7)]);
        r.derive_percentages();
        assert_eq!(r.percent_female, 51.23);
        assert_eq!(r.percent_of_color, 30.0);
    }

    #[test]
    fn test_derive_percentages_missing_keys_default_to_zero() {
        let mut r = record("A", "CT", "total");
        r.gender_proportions.clear();
        r.race_proportions.clear();
        r.derive_percentages();
        assert_eq!(r.percent_female, 0.0);
        assert_eq!(r.percent_of_color, 100.0);
    }

    #[test]
    fn test_to_percent_clamps_noise() {
        assert_eq!(to_percent(1.0 - 1.0000001), 0.0);
        assert_eq!(to_percent(1.2), 100.0);
    }

    #[test]
    fn test_dataset_states_and_metrics() {
        let dataset = abc_dataset();
        assert_eq!(dataset.states(), vec!["CT", "MA"]);
        assert_eq!(dataset.available_metrics(), vec![Metric::DescriptiveGender]);
    }
}
