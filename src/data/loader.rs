use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{parse_year, EntityTable, YearParseError, YEAR_ALIASES};
use super::registry::TableRegistry;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a trade workbook and build the session registry. Dispatch by path.
///
/// Supported layouts:
/// * `.parquet` – long-format table with an `entity` column, one row per
///   entity/year (recommended)
/// * `.json`    – `{ "<entity>": [ { "Años": 1995, ...columns }, ... ], ... }`
/// * directory  – one `.csv` sheet per entity, file stem = entity name
///
/// Column names are trimmed of surrounding whitespace. Source columns that
/// are not numeric (and not the year column) are dropped from analysis.
/// Any unparseable year is fatal for the whole load.
pub fn load_workbook(path: &Path) -> Result<TableRegistry> {
    let registry = if path.is_dir() {
        load_csv_dir(path)
    } else {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "parquet" | "pq" => load_parquet(path),
            "json" => load_json(path),
            other => bail!("Unsupported workbook format: .{other}"),
        }
    }?;

    log::info!(
        "loaded workbook '{}': {} tables, {} selectable entities",
        path.display(),
        registry.len(),
        registry.list_entities().len()
    );
    Ok(registry)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (one records-oriented array per sheet, the shape of
/// `{name: df.to_json(orient='records') for each sheet}`):
///
/// ```json
/// {
///   "Alemania": [
///     { "Años": 1995, "Exportaciones": 812.4, "IGL total": 0.21, ... },
///     ...
///   ],
///   "TOTAL": [ ... ]
/// }
/// ```
fn load_json(path: &Path) -> Result<TableRegistry> {
    let text = std::fs::read_to_string(path).context("reading JSON workbook")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON workbook")?;

    let sheets = root
        .as_object()
        .context("Expected top-level JSON object mapping entity -> rows")?;

    let mut tables = Vec::with_capacity(sheets.len());
    for (entity, rows_value) in sheets {
        let records = rows_value
            .as_array()
            .with_context(|| format!("Sheet '{entity}' is not a JSON array"))?;
        tables.push(
            json_sheet_to_table(entity, records)
                .with_context(|| format!("Sheet '{entity}'"))?,
        );
    }

    Ok(TableRegistry::new(tables))
}

fn json_sheet_to_table(entity: &str, records: &[JsonValue]) -> Result<EntityTable> {
    // Column order = first-seen key order across the sheet, names trimmed.
    let mut headers: Vec<String> = Vec::new();
    for rec in records {
        let obj = rec.as_object().context("row is not a JSON object")?;
        for key in obj.keys() {
            let trimmed = key.trim().to_string();
            if !headers.contains(&trimmed) {
                headers.push(trimmed);
            }
        }
    }

    let year_col = find_year_column(&headers)
        .with_context(|| format!("no year column among {headers:?}"))?;

    // A column participates only if every cell is a number or null.
    let numeric: Vec<String> = headers
        .iter()
        .filter(|name| **name != year_col)
        .filter(|name| {
            let ok = records.iter().all(|rec| {
                match trimmed_key_lookup(rec, name) {
                    None | Some(JsonValue::Null) => true,
                    Some(v) => v.is_number(),
                }
            });
            if !ok {
                log::warn!("'{entity}': dropping non-numeric column '{name}'");
            }
            ok
        })
        .cloned()
        .collect();

    let mut rows = Vec::with_capacity(records.len());
    for rec in records {
        let year_value = trimmed_key_lookup(rec, &year_col)
            .context("row is missing its year cell")?;
        let year = json_year(year_value)?;

        let cells = numeric
            .iter()
            .map(|name| match trimmed_key_lookup(rec, name) {
                Some(v) => v.as_f64(),
                None => None,
            })
            .collect();
        rows.push((year, cells));
    }

    Ok(EntityTable::from_rows(entity, numeric, rows)?)
}

/// Look a trimmed column name up in a row object whose keys may still carry
/// the workbook's stray whitespace.
fn trimmed_key_lookup<'a>(rec: &'a JsonValue, name: &str) -> Option<&'a JsonValue> {
    let obj = rec.as_object()?;
    obj.iter()
        .find(|(key, _)| key.trim() == name)
        .map(|(_, v)| v)
}

fn json_year(value: &JsonValue) -> Result<i32, YearParseError> {
    match value {
        JsonValue::String(s) => parse_year(s),
        JsonValue::Number(n) => parse_year(&n.to_string()),
        other => Err(YearParseError {
            value: other.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// One `.csv` file per entity sheet; the file stem is the entity name.
/// Header row carries the column names; empty / `NA` cells are missing.
fn load_csv_dir(dir: &Path) -> Result<TableRegistry> {
    let mut sheet_paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("reading workbook directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    sheet_paths.sort();

    if sheet_paths.is_empty() {
        bail!("no .csv sheets in '{}'", dir.display());
    }

    let mut tables = Vec::with_capacity(sheet_paths.len());
    for sheet in &sheet_paths {
        let entity = sheet
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("bad sheet file name '{}'", sheet.display()))?
            .trim()
            .to_string();
        tables.push(
            load_csv_sheet(&entity, sheet)
                .with_context(|| format!("Sheet '{}'", sheet.display()))?,
        );
    }

    Ok(TableRegistry::new(tables))
}

fn load_csv_sheet(entity: &str, path: &Path) -> Result<EntityTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let year_col = find_year_column(&headers)
        .with_context(|| format!("no year column among {headers:?}"))?;
    let year_idx = headers
        .iter()
        .position(|h| *h == year_col)
        .expect("year column located above");

    let mut raw_rows: Vec<csv::StringRecord> = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        raw_rows.push(result.with_context(|| format!("CSV row {row_no}"))?);
    }

    // Numeric columns only: a single unparseable cell disqualifies the column.
    let mut numeric_idx: Vec<(usize, String)> = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        if idx == year_idx {
            continue;
        }
        let all_numeric = raw_rows
            .iter()
            .all(|rec| parse_numeric_cell(rec.get(idx).unwrap_or("")).is_ok());
        if all_numeric {
            numeric_idx.push((idx, name.clone()));
        } else {
            log::warn!("'{entity}': dropping non-numeric column '{name}'");
        }
    }

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (row_no, rec) in raw_rows.iter().enumerate() {
        let year = parse_year(rec.get(year_idx).unwrap_or(""))
            .with_context(|| format!("CSV row {row_no}"))?;
        let cells = numeric_idx
            .iter()
            .map(|(idx, _)| {
                parse_numeric_cell(rec.get(*idx).unwrap_or(""))
                    .expect("column pre-checked as numeric")
            })
            .collect();
        rows.push((year, cells));
    }

    let column_names = numeric_idx.into_iter().map(|(_, name)| name).collect();
    Ok(EntityTable::from_rows(entity, column_names, rows)?)
}

/// `Ok(None)` for an empty / NA cell, `Ok(Some)` for a number,
/// `Err` for anything else (which disqualifies the whole column).
fn parse_numeric_cell(s: &str) -> Result<Option<f64>, ()> {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("na") || t.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    t.parse::<f64>().map(Some).map_err(|_| ())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Long-format Parquet workbook:
/// - `entity`: Utf8 – sheet name per row
/// - year column (`Años` / `Year`): Int64, Int32, Float64, or Utf8
/// - every other numeric column becomes an analysis variable
///
/// Works with files written by both Pandas (`df.to_parquet()`) and Polars
/// (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<TableRegistry> {
    let file = std::fs::File::open(path).context("opening parquet workbook")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    // entity -> rows in encounter order; one schema for the whole file.
    let mut sheets: BTreeMap<String, Vec<(i32, Vec<Option<f64>>)>> = BTreeMap::new();
    let mut column_names: Vec<String> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let entity_idx = schema
            .index_of("entity")
            .map_err(|_| anyhow::anyhow!("Parquet workbook missing 'entity' column"))?;

        let trimmed: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| f.name().trim().to_string())
            .collect();
        let year_col = find_year_column(&trimmed)
            .with_context(|| format!("no year column among {trimmed:?}"))?;
        let year_idx = trimmed
            .iter()
            .position(|h| *h == year_col)
            .expect("year column located above");

        let numeric_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != entity_idx && *i != year_idx)
            .filter(|(_, f)| {
                let ok = matches!(
                    f.data_type(),
                    DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
                );
                if !ok {
                    log::warn!(
                        "dropping non-numeric parquet column '{}' ({:?})",
                        f.name(),
                        f.data_type()
                    );
                }
                ok
            })
            .map(|(i, f)| (i, f.name().trim().to_string()))
            .collect();
        if column_names.is_empty() {
            column_names = numeric_cols.iter().map(|(_, n)| n.clone()).collect();
        }

        let entities = batch
            .column(entity_idx)
            .as_any()
            .downcast_ref::<StringArray>()
            .context("'entity' column must be Utf8")?;
        let year_array = batch.column(year_idx);

        for row in 0..batch.num_rows() {
            if entities.is_null(row) {
                bail!("row {row}: null entity");
            }
            let entity = entities.value(row).trim().to_string();
            let year = extract_year(year_array, row)
                .with_context(|| format!("row {row} ('{entity}')"))?;
            let cells = numeric_cols
                .iter()
                .map(|(idx, _)| extract_numeric(batch.column(*idx), row))
                .collect();
            sheets.entry(entity).or_default().push((year, cells));
        }
    }

    let mut tables = Vec::with_capacity(sheets.len());
    for (entity, rows) in sheets {
        tables.push(EntityTable::from_rows(entity, column_names.clone(), rows)?);
    }
    Ok(TableRegistry::new(tables))
}

// -- Parquet / Arrow helpers --

fn extract_year(col: &Arc<dyn Array>, row: usize) -> Result<i32> {
    if col.is_null(row) {
        return Err(YearParseError {
            value: "<null>".into(),
        }
        .into());
    }
    let repr = match col.data_type() {
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("Int64 column")
            .value(row)
            .to_string(),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .expect("Int32 column")
            .value(row)
            .to_string(),
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .expect("Float64 column")
            .value(row)
            .to_string(),
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("Utf8 column")
            .value(row)
            .to_string(),
        other => bail!("unsupported year column type {other:?}"),
    };
    Ok(parse_year(&repr)?)
}

/// NaN cells are normalized to missing, matching the CSV loader's `nan`
/// handling.
fn extract_numeric(col: &Arc<dyn Array>, row: usize) -> Option<f64> {
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Float64 => col
            .as_any()
            .downcast_ref::<Float64Array>()
            .map(|a| a.value(row))
            .filter(|v| !v.is_nan()),
        DataType::Float32 => col
            .as_any()
            .downcast_ref::<Float32Array>()
            .map(|a| a.value(row) as f64)
            .filter(|v| !v.is_nan()),
        DataType::Int64 => col
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| a.value(row) as f64),
        DataType::Int32 => col
            .as_any()
            .downcast_ref::<Int32Array>()
            .map(|a| a.value(row) as f64),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Find the year column among trimmed headers.
fn find_year_column(headers: &[String]) -> Option<String> {
    headers
        .iter()
        .find(|h| YEAR_ALIASES.contains(&h.as_str()))
        .cloned()
}
