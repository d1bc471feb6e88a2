use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::model::EntityTable;
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// DescriptiveStats
// ---------------------------------------------------------------------------

/// Summary statistics of one variable over its observed (non-missing) cells.
///
/// Values are exact; rounding to display precision is the presentation
/// layer's concern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n − 1); `0.0` for a single observation.
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
    /// `std / mean`; `None` when the mean is zero (undefined, not an error).
    pub coef_variation: Option<f64>,
}

// ---------------------------------------------------------------------------
// describe
// ---------------------------------------------------------------------------

/// Per-variable summary statistics.
///
/// Missing cells are excluded per variable only; there is no cross-variable
/// complete-case filtering here. A variable with zero observed cells is
/// skipped (its absence from the map is the per-variable outcome);
/// [`AnalysisError::EmptyAfterFilter`] only when no requested variable has
/// any observation at all.
pub fn describe(
    table: &EntityTable,
    variables: &[String],
) -> Result<BTreeMap<String, DescriptiveStats>, AnalysisError> {
    let mut out = BTreeMap::new();
    for name in variables {
        let cells = table
            .column(name)
            .ok_or_else(|| AnalysisError::UnknownColumn(name.clone()))?;
        let observed: Vec<f64> = cells.iter().filter_map(|c| *c).collect();
        if observed.is_empty() {
            log::warn!("describe: '{name}' has no observed values, skipping");
            continue;
        }
        out.insert(name.clone(), stats_of(&observed));
    }
    if out.is_empty() {
        return Err(AnalysisError::EmptyAfterFilter);
    }
    Ok(out)
}

fn stats_of(observed: &[f64]) -> DescriptiveStats {
    let n = observed.len();
    let nf = n as f64;
    let mean = observed.iter().sum::<f64>() / nf;

    let std = if n > 1 {
        let ss: f64 = observed.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (nf - 1.0)).sqrt()
    } else {
        0.0
    };

    let mut sorted = observed.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    DescriptiveStats {
        count: n,
        mean,
        std,
        min: sorted[0],
        p25: percentile(&sorted, 0.25),
        median: percentile(&sorted, 0.50),
        p75: percentile(&sorted, 0.75),
        max: sorted[n - 1],
        coef_variation: if mean == 0.0 { None } else { Some(std / mean) },
    }
}

/// Linear-interpolation percentile over an ascending slice, `q` in `[0, 1]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let frac = pos - lo as f64;
    if frac == 0.0 || lo + 1 == sorted.len() {
        sorted[lo]
    } else {
        sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
    }
}
