use crate::error::{DiversityError, Result};
use crate::filter::{ClassificationFilter, EmptyClassificationPolicy, FilterCriteria, LevelSelector};
use crate::models::{Classification, Level};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data source configuration
    pub data_source_mode: DataSourceMode,
    pub data_file: Option<String>,
    pub data_url: Option<String>,
    pub output_directory: Option<String>,
    // Selection
    pub metric: String,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub level: LevelMode,
    /// Only read when `level = "explicit"`
    pub levels: Option<Vec<String>>,
    /// Active classification codes; absent means all of them
    pub classifications: Option<Vec<String>>,
    #[serde(default)]
    pub empty_classification_policy: EmptyClassificationPolicy,
    // Presentation
    #[serde(default)]
    pub include_level_column: bool,
    pub top_n: Option<usize>,
    pub institution: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataSourceMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "internet")]
    Internet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelMode {
    #[default]
    All,
    Undergraduate,
    Graduate,
    Other,
    Explicit,
}

impl std::str::FromStr for LevelMode {
    type Err = DiversityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(LevelMode::All),
            "undergraduate" => Ok(LevelMode::Undergraduate),
            "graduate" => Ok(LevelMode::Graduate),
            "other" => Ok(LevelMode::Other),
            "explicit" => Ok(LevelMode::Explicit),
            other => Err(DiversityError::Config(format!("unknown level mode: {}", other))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_source_mode: DataSourceMode::Local,
            data_file: Some("institutional_diversity_metric.csv".to_string()),
            data_url: Some("https://example.com/institutional_diversity_metric.csv".to_string()),
            output_directory: Some("output".to_string()),
            metric: "descriptive_gender".to_string(),
            states: Vec::new(),
            level: LevelMode::All,
            levels: None,
            classifications: None,
            empty_classification_policy: EmptyClassificationPolicy::PassAll,
            include_level_column: true,
            top_n: Some(25),
            institution: None,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn level_selector(&self) -> Result<LevelSelector> {
        Ok(match self.level {
            LevelMode::All => LevelSelector::AllLevels,
            LevelMode::Undergraduate => LevelSelector::Undergraduate,
            LevelMode::Graduate => LevelSelector::Graduate,
            LevelMode::Other => LevelSelector::Other,
            LevelMode::Explicit => {
                let levels = self.levels.as_deref().unwrap_or_default();
                if levels.is_empty() {
                    return Err(DiversityError::Config(
                        "level = \"explicit\" needs a non-empty `levels` list".to_string(),
                    ));
                }
                LevelSelector::ExplicitSet(levels.iter().map(|l| Level::parse(l)).collect())
            }
        })
    }

    pub fn classification_filter(&self) -> Result<ClassificationFilter> {
        let filter = match &self.classifications {
            None => ClassificationFilter::all(),
            Some(codes) => ClassificationFilter::only(
                codes
                    .iter()
                    .map(|code| code.parse::<Classification>())
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(filter.with_empty_policy(self.empty_classification_policy))
    }

    /// Filter criteria for this selection. The metric is attached by the analyzer.
    pub fn criteria(&self) -> Result<FilterCriteria> {
        Ok(FilterCriteria {
            states: self.states.iter().map(|s| s.trim().to_uppercase()).collect(),
            level: self.level_selector()?,
            classifications: self.classification_filter()?,
            require_metric: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        Config::default().save_to_file(path).unwrap();
        let loaded = Config::load_from_file(path).unwrap();

        assert_eq!(loaded.metric, "descriptive_gender");
        assert_eq!(loaded.top_n, Some(25));
        assert!(loaded.classifications.is_none());
        assert_eq!(loaded.criteria().unwrap().classifications.active().len(), 16);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            data_source_mode = "local"
            data_file = "data.csv"
            metric = "blaus_race"
            states = ["ct", " ma "]
            level = "explicit"
            levels = ["graduate", "certificate"]
            classifications = ["HBCU", "Law"]
            empty_classification_policy = "exclude_all"
            "#,
        )
        .unwrap();

        let criteria = config.criteria().unwrap();
        assert_eq!(criteria.states.iter().collect::<Vec<_>>(), vec!["CT", "MA"]);
        assert_eq!(
            criteria.level,
            LevelSelector::ExplicitSet(vec![Level::Graduate, Level::parse("Certificate")])
        );
        assert!(criteria.classifications.active().contains(Classification::Hbcu));
        assert!(criteria.classifications.active().contains(Classification::Law));
        assert_eq!(criteria.classifications.active().len(), 2);
        assert!(!config.include_level_column);
    }

    #[test]
    fn test_explicit_level_without_levels_is_rejected() {
        let config = Config {
            level: LevelMode::Explicit,
            ..Config::default()
        };
        assert!(matches!(config.criteria(), Err(DiversityError::Config(_))));
    }

    #[test]
    fn test_unknown_classification_is_rejected() {
        let config = Config {
            classifications: Some(vec!["Ivy".to_string()]),
            ..Config::default()
        };
        assert!(config.classification_filter().is_err());
    }

    #[test]
    fn test_level_mode_from_str() {
        assert_eq!("Graduate".parse::<LevelMode>().unwrap(), LevelMode::Graduate);
        assert!("postdoc".parse::<LevelMode>().is_err());
    }
}
