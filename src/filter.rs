//! Filter engine: a conjunction of independent predicates over the dataset.

use crate::models::{Classification, ClassificationSet, Dataset, InstitutionRecord, Level, Metric};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Which program levels pass the filter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LevelSelector {
    #[default]
    AllLevels,
    Undergraduate,
    Graduate,
    /// Anything that is neither undergraduate nor graduate
    Other,
    ExplicitSet(Vec<Level>),
}

impl LevelSelector {
    pub fn matches(&self, level: &Level) -> bool {
        match self {
            LevelSelector::AllLevels => true,
            LevelSelector::Undergraduate => *level == Level::Undergraduate,
            LevelSelector::Graduate => *level == Level::Graduate,
            LevelSelector::Other => !matches!(level, Level::Undergraduate | Level::Graduate),
            LevelSelector::ExplicitSet(levels) => levels.contains(level),
        }
    }
}

/// What an empty active classification set means
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyClassificationPolicy {
    /// No classification constraint at all
    #[default]
    PassAll,
    /// OR over zero flags: nothing matches
    ExcludeAll,
}

/// Per-classification include flags. A record passes when it carries at least one active flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationFilter {
    active: ClassificationSet,
    empty_policy: EmptyClassificationPolicy,
}

impl ClassificationFilter {
    /// Every classification included
    pub fn all() -> Self {
        Self {
            active: ClassificationSet::all(),
            empty_policy: EmptyClassificationPolicy::default(),
        }
    }

    pub fn none() -> Self {
        Self {
            active: ClassificationSet::empty(),
            empty_policy: EmptyClassificationPolicy::default(),
        }
    }

    pub fn only(classifications: impl IntoIterator<Item = Classification>) -> Self {
        Self {
            active: classifications.into_iter().collect(),
            empty_policy: EmptyClassificationPolicy::default(),
        }
    }

    pub fn from_flags(flags: impl IntoIterator<Item = (Classification, bool)>) -> Self {
        let mut filter = Self::none();
        for (classification, included) in flags {
            filter.set(classification, included);
        }
        filter
    }

    pub fn with_empty_policy(mut self, policy: EmptyClassificationPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    pub fn set(&mut self, classification: Classification, included: bool) {
        self.active.set(classification, included);
    }

    pub fn active(&self) -> ClassificationSet {
        self.active
    }

    pub fn matches(&self, flags: &ClassificationSet) -> bool {
        if self.active.is_empty() {
            return self.empty_policy == EmptyClassificationPolicy::PassAll;
        }
        self.active.intersects(flags)
    }
}

impl Default for ClassificationFilter {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    /// Empty means every state
    pub states: BTreeSet<String>,
    pub level: LevelSelector,
    pub classifications: ClassificationFilter,
    pub require_metric: Option<Metric>,
}

impl FilterCriteria {
    pub fn matches(&self, record: &InstitutionRecord) -> bool {
        (self.states.is_empty() || self.states.contains(&record.state))
            && self.level.matches(&record.level)
            && self.classifications.matches(&record.classifications)
            && self
                .require_metric
                .map_or(true, |metric| record.metric(metric).is_some())
    }
}

/// Records of the dataset that passed a filter, in dataset order
#[derive(Debug, Clone)]
pub struct Subset<'a> {
    records: Vec<&'a InstitutionRecord>,
}

impl<'a> Subset<'a> {
    pub fn new(records: Vec<&'a InstitutionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[&'a InstitutionRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a InstitutionRecord> + '_ {
        self.records.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// (unitid, level) keys, for order-independent comparisons
    pub fn keys(&self) -> HashSet<(&'a str, &'a Level)> {
        self.records
            .iter()
            .map(|r| (r.unitid.as_str(), &r.level))
            .collect()
    }
}

pub fn filter<'a>(dataset: &'a Dataset, criteria: &FilterCriteria) -> Subset<'a> {
    let records: Vec<&InstitutionRecord> = dataset
        .records()
        .iter()
        .filter(|record| criteria.matches(record))
        .collect();

    debug!("Filter kept {} of {} records", records.len(), dataset.len());
    Subset::new(records)
}
