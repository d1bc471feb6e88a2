//! Analysis layer: pure functions over the immutable registry.
//!
//! Every selection change in the caller maps to one synchronous
//! recomputation here; nothing is cached between calls.
//!
//! ```text
//!   AnalysisRequest { entity, variables, spec, year filter }
//!        │
//!        ├─▶ transform   zero-guard → Δ / %Δ → optional ln
//!        ├─▶ correlate   complete-case Pearson matrix
//!        ├─▶ describe    per-variable summary + coefficient of variation
//!        └─▶ composite   cross-entity merge, max scan, component ranking
//! ```

pub mod composite;
pub mod correlate;
pub mod describe;
pub mod transform;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::model::SeriesPoint;
use crate::data::registry::TableRegistry;
use crate::error::AnalysisError;

use composite::YearFilter;
use correlate::CorrelationMatrix;
use describe::DescriptiveStats;
use transform::TransformSpec;

// ---------------------------------------------------------------------------
// AnalysisRequest – one declarative selection
// ---------------------------------------------------------------------------

/// The caller's current selection, passed in whole on every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub entity: String,
    pub variables: Vec<String>,
    #[serde(default)]
    pub spec: TransformSpec,
    #[serde(default)]
    pub year_filter: YearFilter,
}

/// Everything the single-entity views need for one request.
///
/// The correlation slot keeps its own outcome: an empty complete-case set
/// is a normal, recoverable state that must not suppress the chart slice
/// or the descriptive table.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub series: Vec<SeriesPoint>,
    pub correlation: Result<CorrelationMatrix, AnalysisError>,
    pub stats: BTreeMap<String, DescriptiveStats>,
}

/// Run the per-entity analyses for one request.
pub fn run(registry: &TableRegistry, request: &AnalysisRequest) -> Result<AnalysisReport, AnalysisError> {
    let table = registry.get(&request.entity)?;
    let series = table.series(&request.variables)?;
    let stats = describe::describe(table, &request.variables)?;
    let correlation = correlate::correlate(table, &request.variables, request.spec);
    log::debug!(
        "run: entity '{}', {} variables, {} series points",
        request.entity,
        request.variables.len(),
        series.len()
    );
    Ok(AnalysisReport {
        series,
        correlation,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::EntityTable;
    use crate::analysis::transform::TransformKind;

    fn registry() -> TableRegistry {
        TableRegistry::new(vec![EntityTable::from_rows(
            "Alemania",
            vec!["Exportaciones".into(), "Importaciones".into()],
            vec![
                (2000, vec![Some(100.0), Some(50.0)]),
                (2001, vec![Some(110.0), Some(55.0)]),
                (2002, vec![Some(121.0), Some(66.0)]),
            ],
        )
        .unwrap()])
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            entity: "Alemania".into(),
            variables: vec!["Exportaciones".into(), "Importaciones".into()],
            spec: TransformSpec::default(),
            year_filter: YearFilter::All,
        }
    }

    #[test]
    fn run_produces_all_three_views() {
        let report = run(&registry(), &request()).unwrap();
        assert_eq!(report.series.len(), 3);
        assert_eq!(report.stats.len(), 2);
        let matrix = report.correlation.unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.get(0, 0), Some(1.0));
    }

    #[test]
    fn correlation_failure_does_not_suppress_the_rest() {
        // A shrinking series has only negative growth, so ln() empties the
        // correlation input while the chart and stats remain valid.
        let reg = TableRegistry::new(vec![EntityTable::from_rows(
            "Chile",
            vec!["v".into()],
            vec![(2000, vec![Some(4.0)]), (2001, vec![Some(2.0)])],
        )
        .unwrap()]);
        let req = AnalysisRequest {
            entity: "Chile".into(),
            variables: vec!["v".into()],
            spec: TransformSpec::new(TransformKind::PercentChange, true),
            year_filter: YearFilter::All,
        };
        let report = run(&reg, &req).unwrap();
        assert_eq!(report.series.len(), 2);
        assert_eq!(report.stats["v"].count, 2);
        assert_eq!(
            report.correlation.unwrap_err(),
            AnalysisError::EmptyAfterFilter
        );
    }

    #[test]
    fn unknown_entity_short_circuits() {
        let mut req = request();
        req.entity = "Atlantis".into();
        assert_eq!(
            run(&registry(), &req).unwrap_err(),
            AnalysisError::UnknownEntity("Atlantis".into())
        );
    }

    #[test]
    fn request_round_trips_through_serde() {
        let req = request();
        let json = serde_json::to_string(&req).unwrap();
        let back: AnalysisRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }
}
