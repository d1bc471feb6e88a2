use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Year parsing
// ---------------------------------------------------------------------------

/// Header names accepted for the year column (source workbooks use the
/// Spanish "Años"; generated samples use "Year").
pub const YEAR_ALIASES: [&str; 2] = ["Años", "Year"];

/// A year cell that cannot be read as a 4-digit calendar year.
/// Fatal at load time: the affected table cannot participate in analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse '{value}' as a 4-digit calendar year")]
pub struct YearParseError {
    pub value: String,
}

/// Parse a calendar year from its textual workbook representation.
///
/// Accepts `"1995"` as well as the `"1995.0"` float spelling that
/// spreadsheet exports produce for integer cells.
pub fn parse_year(raw: &str) -> Result<i32, YearParseError> {
    let err = || YearParseError {
        value: raw.to_string(),
    };
    let trimmed = raw.trim();
    let year = if let Ok(y) = trimmed.parse::<i32>() {
        y
    } else {
        let f = trimmed.parse::<f64>().map_err(|_| err())?;
        if f.fract() != 0.0 {
            return Err(err());
        }
        f as i32
    };
    if !(1000..=9999).contains(&year) {
        return Err(err());
    }
    Ok(year)
}

// ---------------------------------------------------------------------------
// EntityTable – one annual series per partner entity
// ---------------------------------------------------------------------------

/// Structural defects detected while assembling a table. Fatal at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("entity '{entity}': duplicate year {year}")]
    DuplicateYear { entity: String, year: i32 },
    #[error("entity '{entity}': row for year {year} has {got} cells, expected {expected}")]
    RowWidth {
        entity: String,
        year: i32,
        got: usize,
        expected: usize,
    },
    #[error("entity '{entity}': table has no rows")]
    Empty { entity: String },
}

/// One point of a year-indexed chart slice: the cell of every requested
/// variable for a single year, in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub values: Vec<Option<f64>>,
}

/// The annual series of one partner entity, column-oriented.
///
/// Immutable after construction: rows are sorted ascending by year, years
/// are unique, every cell is explicitly value-or-missing. Non-numeric
/// source columns are dropped by the loader and never reach this type.
#[derive(Debug, Clone)]
pub struct EntityTable {
    entity: String,
    /// Ascending, unique.
    years: Vec<i32>,
    /// column name → one cell per year.
    columns: BTreeMap<String, Vec<Option<f64>>>,
    /// Column names in workbook order (feeds the variable pickers).
    column_order: Vec<String>,
}

impl EntityTable {
    /// Assemble a table from unsorted rows.
    ///
    /// `column_names` fixes the cell order inside each row; rows are
    /// `(year, cells)` pairs. Sorts by year and rejects duplicates.
    pub fn from_rows(
        entity: impl Into<String>,
        column_names: Vec<String>,
        mut rows: Vec<(i32, Vec<Option<f64>>)>,
    ) -> Result<Self, TableError> {
        let entity = entity.into();
        if rows.is_empty() {
            return Err(TableError::Empty { entity });
        }
        for (year, cells) in &rows {
            if cells.len() != column_names.len() {
                return Err(TableError::RowWidth {
                    entity,
                    year: *year,
                    got: cells.len(),
                    expected: column_names.len(),
                });
            }
        }

        rows.sort_by_key(|(year, _)| *year);
        for pair in rows.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(TableError::DuplicateYear {
                    entity,
                    year: pair[0].0,
                });
            }
        }

        let years: Vec<i32> = rows.iter().map(|(year, _)| *year).collect();
        let mut columns: BTreeMap<String, Vec<Option<f64>>> = column_names
            .iter()
            .map(|name| (name.clone(), Vec::with_capacity(rows.len())))
            .collect();
        for (_, cells) in &rows {
            for (name, cell) in column_names.iter().zip(cells) {
                columns
                    .get_mut(name)
                    .expect("column pre-inserted")
                    .push(*cell);
            }
        }

        Ok(EntityTable {
            entity,
            years,
            columns,
            column_order: column_names,
        })
    }

    /// The entity (partner) this table belongs to.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Ascending, unique calendar years.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Numeric column names in workbook order.
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    /// One cell per year for the named column, year-aligned with [`Self::years`].
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Number of rows (years).
    pub fn len(&self) -> usize {
        self.years.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Year-indexed slice of the requested variables, for charting.
    /// Values appear in request order inside each point.
    pub fn series(&self, variables: &[String]) -> Result<Vec<SeriesPoint>, AnalysisError> {
        let columns: Vec<&[Option<f64>]> = variables
            .iter()
            .map(|name| {
                self.column(name)
                    .ok_or_else(|| AnalysisError::UnknownColumn(name.clone()))
            })
            .collect::<Result<_, _>>()?;

        Ok(self
            .years
            .iter()
            .enumerate()
            .map(|(row, &year)| SeriesPoint {
                year,
                values: columns.iter().map(|col| col[row]).collect(),
            })
            .collect())
    }
}
