use crate::error::Result;
use crate::filter::Subset;
use crate::models::{InstitutionRecord, Metric};
use log::debug;

#[derive(Debug, Clone)]
pub struct RankedRow<'a> {
    pub rank: usize,
    pub score: f64,
    pub record: &'a InstitutionRecord,
}

/// Records ordered by one metric, ranks 1..N
#[derive(Debug, Clone)]
pub struct RankedTable<'a> {
    metric: Metric,
    rows: Vec<RankedRow<'a>>,
}

impl<'a> RankedTable<'a> {
    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn rows(&self) -> &[RankedRow<'a>] {
        &self.rows
    }

    pub fn records(&self) -> impl Iterator<Item = &'a InstitutionRecord> + '_ {
        self.rows.iter().map(|row| row.record)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Sort by score descending, then institution name ascending (case-sensitive).
/// Level and unitid settle rows of the same institution.
pub fn rank<'a>(subset: &Subset<'a>, metric: Metric) -> RankedTable<'a> {
    let mut scored: Vec<(f64, &'a InstitutionRecord)> = subset
        .iter()
        .filter_map(|record| record.metric(metric).map(|score| (score, record)))
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.institution.cmp(&b.institution))
            .then_with(|| a.level.as_str().cmp(b.level.as_str()))
            .then_with(|| a.unitid.cmp(&b.unitid))
    });

    let rows: Vec<RankedRow<'a>> = scored
        .into_iter()
        .enumerate()
        .map(|(i, (score, record))| RankedRow {
            rank: i + 1,
            score,
            record,
        })
        .collect();

    debug!("Ranked {} of {} records by {}", rows.len(), subset.len(), metric);
    RankedTable { metric, rows }
}

/// Rank by a metric given by column name or label
pub fn rank_by_name<'a>(subset: &Subset<'a>, metric: &str) -> Result<RankedTable<'a>> {
    Ok(rank(subset, metric.parse::<Metric>()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiversityError;
    use crate::filter::{filter, FilterCriteria};
    use crate::models::fixtures::*;
    use crate::models::{Classification, Dataset};

    fn order(table: &RankedTable) -> Vec<(usize, String)> {
        table
            .rows()
            .iter()
            .map(|row| (row.rank, row.record.institution.clone()))
            .collect()
    }

    #[test]
    fn test_no_filter_scenario_order() {
        let dataset = abc_dataset();
        let subset = filter(&dataset, &FilterCriteria::default());
        let table = rank(&subset, Metric::DescriptiveGender);

        assert_eq!(
            order(&table),
            vec![(1, "C".to_string()), (2, "A".to_string()), (3, "B".to_string())]
        );
        assert_eq!(table.rows()[0].score, 0.50);
    }

    #[test]
    fn test_missing_metric_excluded_only_for_that_metric() {
        let dataset = Dataset::new(
            vec![
                with_flag(
                    with_metric(
                        with_metric(record("Full", "CT", "total"), Metric::DescriptiveRace, 0.3),
                        Metric::BlausGender,
                        0.4,
                    ),
                    Classification::R1,
                ),
                with_flag(
                    with_metric(record("Partial", "CT", "total"), Metric::BlausGender, 0.5),
                    Classification::R1,
                ),
            ],
            "fixture",
        );
        let subset = filter(&dataset, &FilterCriteria::default());

        let by_race = rank(&subset, Metric::DescriptiveRace);
        assert_eq!(order(&by_race), vec![(1, "Full".to_string())]);

        let by_blau = rank(&subset, Metric::BlausGender);
        assert_eq!(order(&by_blau), vec![(1, "Partial".to_string()), (2, "Full".to_string())]);
    }

    #[test]
    fn test_ranks_are_a_total_order() {
        let scores = [0.3, 0.9, 0.3, 0.1, 0.9, 0.5];
        let records = scores
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let name = format!("Inst {}", (b'F' - i as u8) as char);
                with_flag(
                    with_metric(record(&name, "CT", "total"), Metric::CompensatoryJoint, *s),
                    Classification::Law,
                )
            })
            .collect();
        let dataset = Dataset::new(records, "fixture");
        let subset = filter(&dataset, &FilterCriteria::default());
        let table = rank(&subset, Metric::CompensatoryJoint);

        let ranks: Vec<usize> = table.rows().iter().map(|r| r.rank).collect();
        assert_eq!(ranks, (1..=scores.len()).collect::<Vec<_>>());

        for pair in table.rows().windows(2) {
            assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                assert!(pair[0].record.institution < pair[1].record.institution);
            }
        }
    }

    #[test]
    fn test_tie_break_is_case_sensitive() {
        let dataset = Dataset::new(
            vec![
                with_flag(
                    with_metric(record("alpha", "CT", "total"), Metric::BlausRace, 0.5),
                    Classification::Arts,
                ),
                with_flag(
                    with_metric(record("Zulu", "CT", "total"), Metric::BlausRace, 0.5),
                    Classification::Arts,
                ),
            ],
            "fixture",
        );
        let subset = filter(&dataset, &FilterCriteria::default());
        let table = rank(&subset, Metric::BlausRace);
        assert_eq!(table.rows()[0].record.institution, "Zulu");
    }

    #[test]
    fn test_rank_by_unknown_name() {
        let dataset = abc_dataset();
        let subset = filter(&dataset, &FilterCriteria::default());
        assert!(matches!(
            rank_by_name(&subset, "gini_gender"),
            Err(DiversityError::MetricNotFound(_))
        ));
        assert_eq!(rank_by_name(&subset, "Descriptive (Gender)").unwrap().len(), 3);
    }

    #[test]
    fn test_rank_empty_subset() {
        let subset = Subset::new(Vec::new());
        assert!(rank(&subset, Metric::DescriptiveGender).is_empty());
    }
}
