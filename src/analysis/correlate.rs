use serde::Serialize;

use crate::data::model::EntityTable;
use crate::error::AnalysisError;

use super::transform::{transform, TransformSpec};

// ---------------------------------------------------------------------------
// CorrelationMatrix
// ---------------------------------------------------------------------------

/// Symmetric Pearson correlation matrix over a transformed variable set.
///
/// Entries are `None` where the coefficient is not defined (a variable with
/// zero variance over the retained rows); the diagonal is `Some(1.0)`
/// everywhere else.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    variables: Vec<String>,
    /// Row-major, `variables.len()²` entries.
    cells: Vec<Option<f64>>,
    /// Rows retained after complete-case filtering.
    observations: usize,
}

impl CorrelationMatrix {
    /// Variable names, in request order; indexes both matrix axes.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Number of complete-case rows the coefficients were computed from.
    pub fn observations(&self) -> usize {
        self.observations
    }

    /// Coefficient by position.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.cells[i * self.variables.len() + j]
    }

    /// Coefficient by variable names.
    pub fn get_by_name(&self, a: &str, b: &str) -> Option<f64> {
        let pos = |name| self.variables.iter().position(|v| v == name);
        match (pos(a), pos(b)) {
            (Some(i), Some(j)) => self.get(i, j),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

// ---------------------------------------------------------------------------
// correlate
// ---------------------------------------------------------------------------

/// Correlation matrix over the selected variables of one entity's table.
///
/// Each column is transformed independently with the same `spec`, then every
/// row with a missing value in *any* selected column is dropped
/// (complete-case, not pairwise deletion). [`AnalysisError::EmptyAfterFilter`]
/// when nothing survives.
pub fn correlate(
    table: &EntityTable,
    variables: &[String],
    spec: TransformSpec,
) -> Result<CorrelationMatrix, AnalysisError> {
    let transformed: Vec<Vec<Option<f64>>> = variables
        .iter()
        .map(|name| {
            table
                .column(name)
                .map(|cells| transform(cells, spec))
                .ok_or_else(|| AnalysisError::UnknownColumn(name.clone()))
        })
        .collect::<Result<_, _>>()?;

    let retained = complete_cases(&transformed);
    if retained.is_empty() || retained[0].is_empty() {
        return Err(AnalysisError::EmptyAfterFilter);
    }
    let observations = retained[0].len();
    log::debug!(
        "correlate: {} variables, {} of {} rows retained",
        variables.len(),
        observations,
        table.len()
    );

    let n = variables.len();
    let mut cells = vec![None; n * n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&retained[i], &retained[j]);
            cells[i * n + j] = r;
            cells[j * n + i] = r;
        }
    }

    Ok(CorrelationMatrix {
        variables: variables.to_vec(),
        cells,
        observations,
    })
}

/// Column-wise view of the rows that are fully observed across all columns.
pub(crate) fn complete_cases(columns: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
    if columns.is_empty() {
        return Vec::new();
    }
    let rows = columns[0].len();
    let mut out = vec![Vec::new(); columns.len()];
    for row in 0..rows {
        if columns.iter().all(|col| col[row].is_some()) {
            for (k, col) in columns.iter().enumerate() {
                out[k].push(col[row].expect("checked above"));
            }
        }
    }
    out
}

/// Pearson coefficient; `None` when either side has zero variance.
pub(crate) fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    if n == 0 {
        return None;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some(cov / (var_x * var_y).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::transform::TransformKind;

    fn table() -> EntityTable {
        EntityTable::from_rows(
            "Alemania",
            vec!["up".into(), "down".into(), "flat".into(), "holey".into()],
            vec![
                (2000, vec![Some(1.0), Some(8.0), Some(5.0), Some(1.0)]),
                (2001, vec![Some(2.0), Some(6.0), Some(5.0), None]),
                (2002, vec![Some(3.0), Some(4.0), Some(5.0), Some(2.0)]),
                (2003, vec![Some(4.0), Some(2.0), Some(5.0), Some(4.0)]),
            ],
        )
        .unwrap()
    }

    fn vars(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let m = correlate(&table(), &vars(&["up", "down"]), TransformSpec::default()).unwrap();
        assert_eq!(m.get(0, 0), Some(1.0));
        assert_eq!(m.get(1, 1), Some(1.0));
        assert_eq!(m.get(0, 1), m.get(1, 0));
        assert!((m.get(0, 1).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(m.observations(), 4);
    }

    #[test]
    fn zero_variance_diagonal_is_not_defined() {
        let m = correlate(&table(), &vars(&["up", "flat"]), TransformSpec::default()).unwrap();
        assert_eq!(m.get(0, 0), Some(1.0));
        assert_eq!(m.get(1, 1), None);
        assert_eq!(m.get(0, 1), None);
    }

    #[test]
    fn complete_case_rows_drop_across_all_variables() {
        // 'holey' is missing in 2001, so only 3 rows count for every pair.
        let m = correlate(&table(), &vars(&["up", "holey"]), TransformSpec::default()).unwrap();
        assert_eq!(m.observations(), 3);
    }

    #[test]
    fn all_rows_filtered_reports_no_valid_data() {
        // Percent change leaves one row, and the log of its negative value
        // leaves none.
        let t = EntityTable::from_rows(
            "X",
            vec!["v".into()],
            vec![(2000, vec![Some(4.0)]), (2001, vec![Some(2.0)])],
        )
        .unwrap();
        let spec = TransformSpec::new(TransformKind::PercentChange, true);
        assert_eq!(
            correlate(&t, &vars(&["v"]), spec).unwrap_err(),
            AnalysisError::EmptyAfterFilter
        );
    }

    #[test]
    fn unknown_variable_is_reported() {
        assert_eq!(
            correlate(&table(), &vars(&["nope"]), TransformSpec::default()).unwrap_err(),
            AnalysisError::UnknownColumn("nope".into())
        );
    }

    #[test]
    fn lookup_by_name() {
        let m = correlate(&table(), &vars(&["up", "down"]), TransformSpec::default()).unwrap();
        assert_eq!(m.get_by_name("up", "up"), Some(1.0));
        assert_eq!(m.get_by_name("up", "missing"), None);
    }

    #[test]
    fn pearson_of_perfectly_correlated_series() {
        let r = pearson(&[1.0, 2.0, 3.0], &[10.0, 20.0, 30.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }
}
