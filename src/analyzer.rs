use crate::detail::{detail, InstitutionProfile};
use crate::error::{DiversityError, Result};
use crate::filter::{filter, FilterCriteria};
use crate::models::{Dataset, Metric};
use crate::ranking::{rank, RankedTable};
use crate::summary::{summarize, Summary};
use log::{debug, warn};

/// Result of one filter/rank run
#[derive(Debug, Clone)]
pub enum AnalysisOutcome<'a> {
    /// Nothing survived the filters; ranking and aggregation were skipped
    NoMatches,
    Ranked {
        table: RankedTable<'a>,
        summary: Summary,
    },
}

impl<'a> AnalysisOutcome<'a> {
    pub fn table(&self) -> Option<&RankedTable<'a>> {
        match self {
            AnalysisOutcome::NoMatches => None,
            AnalysisOutcome::Ranked { table, .. } => Some(table),
        }
    }

    pub fn summary(&self) -> Option<&Summary> {
        match self {
            AnalysisOutcome::NoMatches => None,
            AnalysisOutcome::Ranked { summary, .. } => Some(summary),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AnalysisOutcome::NoMatches)
    }
}

/// Runs the filter -> rank -> summary pipeline against one loaded dataset
pub struct DiversityAnalyzer<'a> {
    pub dataset: &'a Dataset,
}

impl<'a> DiversityAnalyzer<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Metrics that can actually be offered for this dataset
    pub fn offered_metrics(&self) -> Vec<Metric> {
        self.dataset.available_metrics()
    }

    /// Resolve a user-supplied metric name. Unknown names and metrics with no
    /// values in the data are both `MetricNotFound`.
    pub fn resolve_metric(&self, name: &str) -> Result<Metric> {
        let metric = name.parse::<Metric>()?;
        if self.offered_metrics().contains(&metric) {
            Ok(metric)
        } else {
            Err(DiversityError::MetricNotFound(metric.column().to_string()))
        }
    }

    /// Main analysis function: filter, drop rows without the metric, rank, summarize
    pub fn analyze(&self, metric: Metric, criteria: &FilterCriteria) -> AnalysisOutcome<'a> {
        // Step 1: the selected metric must be present on every surviving record
        let criteria = FilterCriteria {
            require_metric: Some(metric),
            ..criteria.clone()
        };

        // Step 2: apply the filters
        let subset = filter(self.dataset, &criteria);
        if subset.is_empty() {
            warn!("No institutions match the current filters for {}", metric);
            return AnalysisOutcome::NoMatches;
        }

        // Step 3: rank and summarize
        let table = rank(&subset, metric);
        let summary = summarize(&table);
        debug!(
            "{} institutions ranked by {}, mean {:?}, max {:?}",
            summary.count, metric, summary.mean, summary.max
        );

        AnalysisOutcome::Ranked { table, summary }
    }

    /// Detail view for an institution inside the current outcome
    pub fn profile(
        &self,
        outcome: &AnalysisOutcome<'a>,
        institution: &str,
    ) -> Result<InstitutionProfile> {
        match outcome.table() {
            Some(table) => detail(table.records(), institution),
            None => Err(DiversityError::NotFound(institution.trim().to_string())),
        }
    }
}
