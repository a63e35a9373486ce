use crate::models::Metric;
use crate::ranking::RankedTable;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub metric: Metric,
    pub count: usize,
    /// `None` when nothing was ranked
    pub mean: Option<f64>,
    pub max: Option<f64>,
}

pub fn summarize(table: &RankedTable) -> Summary {
    let scores: Vec<f64> = table.rows().iter().map(|row| row.score).collect();

    let (mean, max) = if scores.is_empty() {
        (None, None)
    } else {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (Some(mean), Some(max))
    };

    Summary {
        metric: table.metric(),
        count: scores.len(),
        mean,
        max,
    }
}

fn format_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.3}", v))
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Institutions: {} | Mean {}: {} | Max {}: {}",
            self.count,
            self.metric.label(),
            format_stat(self.mean),
            self.metric.label(),
            format_stat(self.max)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{filter, FilterCriteria, Subset};
    use crate::models::fixtures::*;
    use crate::ranking::rank;

    #[test]
    fn test_summary_over_ranked_rows() {
        let dataset = abc_dataset();
        let subset = filter(&dataset, &FilterCriteria::default());
        let summary = summarize(&rank(&subset, Metric::DescriptiveGender));

        assert_eq!(summary.count, 3);
        assert!((summary.mean.unwrap() - (0.45 + 0.45 + 0.50) / 3.0).abs() < 1e-12);
        assert_eq!(summary.max, Some(0.50));
    }

    #[test]
    fn test_empty_summary_is_not_available() {
        let subset = Subset::new(Vec::new());
        let summary = summarize(&rank(&subset, Metric::BlausGender));

        assert_eq!(summary.count, 0);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.max, None);
        assert!(summary.to_string().contains("N/A"));
    }
}
