use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TransformSpec – how a raw column becomes a derived column
// ---------------------------------------------------------------------------

/// Base transformation applied to a year-ordered column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    /// Raw values (after the zero-guard substitution).
    #[default]
    Identity,
    /// Year-over-year growth in percent: `(x[i] - x[i-1]) / x[i-1] * 100`.
    PercentChange,
    /// Year-over-year difference: `x[i] - x[i-1]`.
    FirstDifference,
}

/// Pure, stateless description of a column transformation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub kind: TransformKind,
    /// Apply the natural logarithm elementwise after the base transform.
    pub apply_log: bool,
}

impl TransformSpec {
    pub fn new(kind: TransformKind, apply_log: bool) -> Self {
        TransformSpec { kind, apply_log }
    }
}

// ---------------------------------------------------------------------------
// transform – one column at a time
// ---------------------------------------------------------------------------

/// Transform one chronologically ordered column.
///
/// Zeros are replaced with missing before anything else, guarding the
/// `ln(0)` case for every downstream path. Differencing transforms leave
/// the first element missing; a missing operand makes the result missing.
/// With `apply_log`, non-positive values map to missing rather than
/// raising a domain error.
pub fn transform(cells: &[Option<f64>], spec: TransformSpec) -> Vec<Option<f64>> {
    let base: Vec<Option<f64>> = cells
        .iter()
        .map(|cell| match cell {
            Some(v) if *v == 0.0 => None,
            other => *other,
        })
        .collect();

    let mut out = match spec.kind {
        TransformKind::Identity => base,
        TransformKind::PercentChange => differenced(&base, |prev, cur| (cur - prev) / prev * 100.0),
        TransformKind::FirstDifference => differenced(&base, |prev, cur| cur - prev),
    };

    if spec.apply_log {
        for cell in &mut out {
            *cell = cell.and_then(|v| if v > 0.0 { Some(v.ln()) } else { None });
        }
    }
    out
}

/// Pairwise combinator over consecutive elements; element 0 is missing.
fn differenced(cells: &[Option<f64>], f: impl Fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(cells.len());
    let mut prev: Option<f64> = None;
    for &cell in cells {
        out.push(match (prev, cell) {
            (Some(p), Some(c)) => Some(f(p, c)),
            _ => None,
        });
        prev = cell;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn identity_only_substitutes_zeros() {
        let input = vec![Some(1.0), Some(0.0), None, Some(-3.0)];
        let out = transform(&input, TransformSpec::default());
        assert_eq!(out, vec![Some(1.0), None, None, Some(-3.0)]);
    }

    #[test]
    fn percent_change_of_compound_growth() {
        let out = transform(
            &cells(&[100.0, 110.0, 121.0]),
            TransformSpec::new(TransformKind::PercentChange, false),
        );
        assert_eq!(out[0], None);
        assert!((out[1].unwrap() - 10.0).abs() < 1e-9);
        assert!((out[2].unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn first_difference() {
        let out = transform(
            &cells(&[100.0, 110.0, 121.0]),
            TransformSpec::new(TransformKind::FirstDifference, false),
        );
        assert_eq!(out, vec![None, Some(10.0), Some(11.0)]);
    }

    #[test]
    fn missing_operand_makes_result_missing() {
        let input = vec![Some(100.0), None, Some(121.0)];
        let out = transform(&input, TransformSpec::new(TransformKind::FirstDifference, false));
        assert_eq!(out, vec![None, None, None]);
    }

    #[test]
    fn log_of_non_positive_is_missing_not_a_panic() {
        let input = vec![Some(-5.0), Some(0.0), Some(std::f64::consts::E), None];
        let out = transform(&input, TransformSpec::new(TransformKind::Identity, true));
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert!((out[2].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(out[3], None);
    }

    #[test]
    fn log_applies_to_transform_output_not_input() {
        // First differences of [1, 3, 2] are [2, -1]; only the positive
        // difference survives the log.
        let out = transform(
            &cells(&[1.0, 3.0, 2.0]),
            TransformSpec::new(TransformKind::FirstDifference, true),
        );
        assert_eq!(out[0], None);
        assert!((out[1].unwrap() - 2.0_f64.ln()).abs() < 1e-12);
        assert_eq!(out[2], None);
    }
}
