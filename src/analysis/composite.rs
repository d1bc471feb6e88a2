use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::data::registry::TableRegistry;
use crate::error::AnalysisError;

use super::correlate::{complete_cases, pearson};

// ---------------------------------------------------------------------------
// Composite-index schema
// ---------------------------------------------------------------------------

/// The composite quality index column (Grubel-Lloyd index, per the source
/// workbook's naming).
pub const COMPOSITE_TOTAL: &str = "IGL total";

/// The four sub-components, in workbook order.
pub const COMPOSITE_COMPONENTS: [&str; 4] = [
    "IGL vertical alta calidad",
    "IGL vertical baja calidad",
    "IGL Horizontal",
    "IGL vertical",
];

/// Year selection for the cross-entity aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearFilter {
    #[default]
    All,
    Only(i32),
}

impl YearFilter {
    fn keeps(self, year: i32) -> bool {
        match self {
            YearFilter::All => true,
            YearFilter::Only(y) => year == y,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One row of the cross-entity working set, tagged with its entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeRecord {
    pub entity: String,
    pub year: i32,
    /// The composite total; missing cells stay missing.
    pub total: Option<f64>,
    /// `(component name, cell)` in [`COMPOSITE_COMPONENTS`] order.
    pub components: Vec<(String, Option<f64>)>,
}

/// Cross-entity, cross-year composite-index analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeAnalysis {
    /// Concatenated working set: entity order as requested, year order
    /// ascending within each entity.
    pub records: Vec<CompositeRecord>,
    /// The maximum observation of the composite total; ties go to the first
    /// occurrence in `records` order.
    pub max_record: CompositeRecord,
    /// Each component's correlation with the composite total over the
    /// complete-case rows, sorted descending by coefficient (undefined
    /// coefficients last, name order on ties).
    pub component_correlations: Vec<(String, Option<f64>)>,
}

// ---------------------------------------------------------------------------
// aggregate
// ---------------------------------------------------------------------------

/// Merge the requested entities' tables, filter by year, and analyse the
/// composite index.
///
/// Fails with [`AnalysisError::MissingColumns`] when any of the five
/// required columns is absent from the merged set, and with
/// [`AnalysisError::EmptyAfterFilter`] when no rows survive the year filter
/// or no composite total is observed at all.
pub fn aggregate(
    registry: &TableRegistry,
    entities: &[String],
    year_filter: YearFilter,
) -> Result<CompositeAnalysis, AnalysisError> {
    let tables = entities
        .iter()
        .map(|e| registry.get(e))
        .collect::<Result<Vec<_>, _>>()?;

    // Schema check over the merged column set: a column is present when any
    // requested sheet carries it (absent sheets contribute missing cells).
    let required = std::iter::once(COMPOSITE_TOTAL).chain(COMPOSITE_COMPONENTS);
    let missing: Vec<String> = required
        .filter(|col| !tables.iter().any(|t| t.column(col).is_some()))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::MissingColumns { missing });
    }

    let mut records = Vec::new();
    for table in &tables {
        for (row, &year) in table.years().iter().enumerate() {
            if !year_filter.keeps(year) {
                continue;
            }
            let cell = |col: &str| table.column(col).map(|c| c[row]).unwrap_or(None);
            records.push(CompositeRecord {
                entity: table.entity().to_string(),
                year,
                total: cell(COMPOSITE_TOTAL),
                components: COMPOSITE_COMPONENTS
                    .iter()
                    .map(|&name| (name.to_string(), cell(name)))
                    .collect(),
            });
        }
    }
    if records.is_empty() {
        return Err(AnalysisError::EmptyAfterFilter);
    }

    let max_record = first_maximum(&records)?.clone();
    let component_correlations = component_correlations(&records);
    log::debug!(
        "aggregate: {} entities, {} records, max {} {} = {:?}",
        entities.len(),
        records.len(),
        max_record.entity,
        max_record.year,
        max_record.total
    );

    Ok(CompositeAnalysis {
        records,
        max_record,
        component_correlations,
    })
}

/// Stable first-maximum scan over the composite total; ties keep the
/// earliest record in concatenation order. NaN totals are treated as
/// unobserved so they can neither win nor poison the comparison.
fn first_maximum(records: &[CompositeRecord]) -> Result<&CompositeRecord, AnalysisError> {
    let mut best: Option<(f64, &CompositeRecord)> = None;
    for rec in records {
        let Some(total) = rec.total.filter(|t| !t.is_nan()) else {
            continue;
        };
        match best {
            Some((b, _)) if total.total_cmp(&b).is_le() => {}
            _ => best = Some((total, rec)),
        }
    }
    best.map(|(_, rec)| rec).ok_or(AnalysisError::EmptyAfterFilter)
}

/// Correlation of each component with the total over the rows fully
/// observed across all five columns. The total itself is not ranked.
fn component_correlations(records: &[CompositeRecord]) -> Vec<(String, Option<f64>)> {
    let mut columns: Vec<Vec<Option<f64>>> =
        vec![Vec::with_capacity(records.len()); 1 + COMPOSITE_COMPONENTS.len()];
    for rec in records {
        columns[0].push(rec.total);
        for (k, (_, cell)) in rec.components.iter().enumerate() {
            columns[k + 1].push(*cell);
        }
    }
    let retained = complete_cases(&columns);

    let mut ranked: Vec<(String, Option<f64>)> = COMPOSITE_COMPONENTS
        .iter()
        .enumerate()
        .map(|(k, &name)| (name.to_string(), pearson(&retained[0], &retained[k + 1])))
        .collect();
    ranked.sort_by(|(name_a, a), (name_b, b)| match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(x).then_with(|| name_a.cmp(name_b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => name_a.cmp(name_b),
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::EntityTable;

    fn full_columns() -> Vec<String> {
        let mut cols = vec![COMPOSITE_TOTAL.to_string()];
        cols.extend(COMPOSITE_COMPONENTS.iter().map(|s| s.to_string()));
        cols
    }

    /// One row per `(year, total)`; components derived deterministically so
    /// each has a known relationship with the total.
    fn igl_table(entity: &str, rows: &[(i32, f64)]) -> EntityTable {
        EntityTable::from_rows(
            entity,
            full_columns(),
            rows.iter()
                .map(|&(year, total)| {
                    (
                        year,
                        vec![
                            Some(total),
                            Some(total * 2.0),  // perfectly positive
                            Some(-total),       // perfectly negative
                            Some(total + 1.0),  // perfectly positive
                            Some(total * total), // nonlinear
                        ],
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    fn registry() -> TableRegistry {
        TableRegistry::new(vec![
            igl_table("A", &[(2000, 5.0)]),
            igl_table("B", &[(2000, 9.0)]),
            igl_table("C", &[(2000, 9.0)]),
            igl_table("D", &[(2000, 3.0)]),
        ])
    }

    fn names(v: &[String]) -> Vec<String> {
        v.to_vec()
    }

    #[test]
    fn maximum_breaks_ties_by_first_occurrence() {
        let order = names(&["A".into(), "B".into(), "C".into(), "D".into()]);
        let analysis = aggregate(&registry(), &order, YearFilter::All).unwrap();
        assert_eq!(analysis.max_record.entity, "B");
        assert_eq!(analysis.max_record.total, Some(9.0));

        // Reversed request order flips the winner among the tied pair.
        let reversed = names(&["D".into(), "C".into(), "B".into(), "A".into()]);
        let analysis = aggregate(&registry(), &reversed, YearFilter::All).unwrap();
        assert_eq!(analysis.max_record.entity, "C");
    }

    #[test]
    fn records_preserve_entity_then_year_order() {
        let reg = TableRegistry::new(vec![
            igl_table("B", &[(2001, 1.0), (2000, 2.0)]),
            igl_table("A", &[(2000, 3.0)]),
        ]);
        let analysis =
            aggregate(&reg, &names(&["B".into(), "A".into()]), YearFilter::All).unwrap();
        let seen: Vec<(&str, i32)> = analysis
            .records
            .iter()
            .map(|r| (r.entity.as_str(), r.year))
            .collect();
        assert_eq!(seen, vec![("B", 2000), ("B", 2001), ("A", 2000)]);
    }

    #[test]
    fn component_ranking_is_descending_and_excludes_total() {
        let reg = TableRegistry::new(vec![igl_table(
            "A",
            &[(2000, 1.0), (2001, 2.0), (2002, 4.0)],
        )]);
        let analysis = aggregate(&reg, &names(&["A".into()]), YearFilter::All).unwrap();

        let ranked = &analysis.component_correlations;
        assert_eq!(ranked.len(), COMPOSITE_COMPONENTS.len());
        assert!(ranked.iter().all(|(name, _)| name != COMPOSITE_TOTAL));

        // Coefficients descend.
        let coefs: Vec<f64> = ranked.iter().filter_map(|(_, c)| *c).collect();
        assert!(coefs.windows(2).all(|w| w[0] >= w[1]));
        // The anti-correlated component ranks last.
        assert_eq!(ranked.last().unwrap().0, "IGL vertical baja calidad");
        assert!((ranked.last().unwrap().1.unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn year_filter_restricts_rows() {
        let reg = TableRegistry::new(vec![
            igl_table("A", &[(2000, 1.0), (2001, 5.0)]),
            igl_table("B", &[(2000, 3.0)]),
        ]);
        let analysis = aggregate(
            &reg,
            &names(&["A".into(), "B".into()]),
            YearFilter::Only(2000),
        )
        .unwrap();
        assert_eq!(analysis.records.len(), 2);
        assert_eq!(analysis.max_record.entity, "B");
    }

    #[test]
    fn year_filter_matching_nothing_is_no_valid_data() {
        let err = aggregate(&registry(), &names(&["A".into()]), YearFilter::Only(1980))
            .unwrap_err();
        assert_eq!(err, AnalysisError::EmptyAfterFilter);
    }

    #[test]
    fn incomplete_schema_is_missing_columns() {
        let partial = EntityTable::from_rows(
            "A",
            vec![COMPOSITE_TOTAL.to_string(), "Exportaciones".to_string()],
            vec![(2000, vec![Some(1.0), Some(2.0)])],
        )
        .unwrap();
        let reg = TableRegistry::new(vec![partial]);
        let err = aggregate(&reg, &names(&["A".into()]), YearFilter::All).unwrap_err();
        match err {
            AnalysisError::MissingColumns { missing } => {
                assert_eq!(missing.len(), COMPOSITE_COMPONENTS.len());
                assert!(missing.contains(&"IGL Horizontal".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn nan_totals_never_win_the_max_scan() {
        // A NaN total must act like a missing one: the finite maximum
        // before it stays the winner, and later smaller values must not
        // displace it either.
        let t = EntityTable::from_rows(
            "A",
            full_columns(),
            vec![
                (2000, vec![Some(5.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0)]),
                (2001, vec![Some(f64::NAN), Some(1.0), Some(1.0), Some(1.0), Some(1.0)]),
                (2002, vec![Some(3.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0)]),
            ],
        )
        .unwrap();
        let reg = TableRegistry::new(vec![t]);
        let analysis = aggregate(&reg, &names(&["A".into()]), YearFilter::All).unwrap();
        assert_eq!(analysis.max_record.year, 2000);
        assert_eq!(analysis.max_record.total, Some(5.0));
    }

    #[test]
    fn all_nan_totals_is_no_valid_data() {
        let t = EntityTable::from_rows(
            "A",
            full_columns(),
            vec![(2000, vec![Some(f64::NAN), Some(1.0), Some(1.0), Some(1.0), Some(1.0)])],
        )
        .unwrap();
        let reg = TableRegistry::new(vec![t]);
        let err = aggregate(&reg, &names(&["A".into()]), YearFilter::All).unwrap_err();
        assert_eq!(err, AnalysisError::EmptyAfterFilter);
    }

    #[test]
    fn all_missing_totals_is_no_valid_data() {
        let t = EntityTable::from_rows(
            "A",
            full_columns(),
            vec![(2000, vec![None, Some(1.0), Some(1.0), Some(1.0), Some(1.0)])],
        )
        .unwrap();
        let reg = TableRegistry::new(vec![t]);
        let err = aggregate(&reg, &names(&["A".into()]), YearFilter::All).unwrap_err();
        assert_eq!(err, AnalysisError::EmptyAfterFilter);
    }

    #[test]
    fn rows_with_gaps_still_feed_the_max_scan() {
        // The max scan skips missing totals but keeps partially observed
        // rows; correlations use complete cases only.
        let t = EntityTable::from_rows(
            "A",
            full_columns(),
            vec![
                (2000, vec![Some(8.0), None, Some(1.0), Some(1.0), Some(1.0)]),
                (2001, vec![Some(2.0), Some(1.0), Some(1.0), Some(1.0), Some(1.0)]),
            ],
        )
        .unwrap();
        let reg = TableRegistry::new(vec![t]);
        let analysis = aggregate(&reg, &names(&["A".into()]), YearFilter::All).unwrap();
        assert_eq!(analysis.max_record.year, 2000);
        // Only one complete-case row: every coefficient is undefined.
        assert!(analysis
            .component_correlations
            .iter()
            .all(|(_, c)| c.is_none()));
    }

    #[test]
    fn unknown_entity_propagates() {
        let err = aggregate(&registry(), &names(&["Z".into()]), YearFilter::All).unwrap_err();
        assert_eq!(err, AnalysisError::UnknownEntity("Z".into()));
    }
}
