use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Float64Builder, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

const COLUMNS: [&str; 8] = [
    "Exportaciones",
    "Importaciones",
    "Balanza comercial",
    "IGL total",
    "IGL vertical alta calidad",
    "IGL vertical baja calidad",
    "IGL Horizontal",
    "IGL vertical",
];

const PARTNERS: [&str; 4] = ["Alemania", "China", "Estados Unidos", "Venezuela"];
const YEARS: std::ops::RangeInclusive<i32> = 1995..=2023;

/// One sheet: year → cells in COLUMNS order.
type Sheet = Vec<(i32, Vec<Option<f64>>)>;

fn generate_partner(rng: &mut SimpleRng) -> Sheet {
    let mut exports = 500.0 + rng.next_f64() * 2000.0;
    let mut imports = 500.0 + rng.next_f64() * 2000.0;

    YEARS
        .map(|year| {
            exports = (exports * rng.gauss(1.04, 0.08)).max(1.0);
            imports = (imports * rng.gauss(1.04, 0.08)).max(1.0);

            let alta = rng.next_f64() * 0.4;
            let baja = rng.next_f64() * 0.3;
            let horizontal = rng.next_f64() * 0.3;
            let vertical = alta + baja;
            let total = vertical + horizontal;

            // A few gaps, like the real workbook's early years.
            let exports_cell = (rng.next_f64() > 0.05).then_some(exports);
            let cells = vec![
                exports_cell,
                Some(imports),
                exports_cell.map(|e| e - imports),
                Some(total),
                Some(alta),
                Some(baja),
                Some(horizontal),
                Some(vertical),
            ];
            (year, cells)
        })
        .collect()
}

/// Element-wise sum of the partner sheets (missing cells stay missing).
fn total_sheet(sheets: &BTreeMap<String, Sheet>) -> Sheet {
    YEARS
        .enumerate()
        .map(|(row, year)| {
            let cells = (0..COLUMNS.len())
                .map(|col| {
                    sheets
                        .values()
                        .map(|sheet| sheet[row].1[col])
                        .sum::<Option<f64>>()
                })
                .collect();
            (year, cells)
        })
        .collect()
}

fn write_json(workbook: &BTreeMap<String, Sheet>, path: &str) {
    let mut root = serde_json::Map::new();
    for (entity, sheet) in workbook {
        let rows: Vec<serde_json::Value> = sheet
            .iter()
            .map(|(year, cells)| {
                let mut row = serde_json::Map::new();
                row.insert("Años".to_string(), serde_json::json!(year));
                for (name, cell) in COLUMNS.iter().zip(cells) {
                    row.insert(name.to_string(), serde_json::json!(cell));
                }
                serde_json::Value::Object(row)
            })
            .collect();
        root.insert(entity.clone(), serde_json::Value::Array(rows));
    }
    let text = serde_json::to_string_pretty(&serde_json::Value::Object(root))
        .expect("serializing workbook");
    std::fs::write(path, text).expect("writing JSON workbook");
}

fn write_csv_dir(workbook: &BTreeMap<String, Sheet>, dir: &str) {
    std::fs::create_dir_all(dir).expect("creating CSV directory");
    for (entity, sheet) in workbook {
        let path = format!("{dir}/{entity}.csv");
        let mut writer = csv::Writer::from_path(&path).expect("opening CSV sheet");
        let mut header = vec!["Años".to_string()];
        header.extend(COLUMNS.iter().map(|s| s.to_string()));
        writer.write_record(&header).expect("writing CSV header");
        for (year, cells) in sheet {
            let mut record = vec![year.to_string()];
            record.extend(
                cells
                    .iter()
                    .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record).expect("writing CSV row");
        }
        writer.flush().expect("flushing CSV sheet");
    }
}

fn write_parquet(workbook: &BTreeMap<String, Sheet>, path: &str) {
    let mut entities: Vec<String> = Vec::new();
    let mut years: Vec<i64> = Vec::new();
    let mut value_builders: Vec<Float64Builder> =
        COLUMNS.iter().map(|_| Float64Builder::new()).collect();

    for (entity, sheet) in workbook {
        for (year, cells) in sheet {
            entities.push(entity.clone());
            years.push(*year as i64);
            for (builder, cell) in value_builders.iter_mut().zip(cells) {
                builder.append_option(*cell);
            }
        }
    }

    let mut fields = vec![
        Field::new("entity", DataType::Utf8, false),
        Field::new("Años", DataType::Int64, false),
    ];
    fields.extend(
        COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, true)),
    );
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<Arc<dyn arrow::array::Array>> = vec![
        Arc::new(StringArray::from(
            entities.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(years)),
    ];
    columns.extend(
        value_builders
            .into_iter()
            .map(|mut b| Arc::new(b.finish()) as Arc<dyn arrow::array::Array>),
    );

    let batch =
        RecordBatch::try_new(schema.clone(), columns).expect("Failed to create RecordBatch");

    let file = std::fs::File::create(path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");
}

fn main() {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let mut workbook: BTreeMap<String, Sheet> = PARTNERS
        .iter()
        .map(|&p| (p.to_string(), generate_partner(&mut rng)))
        .collect();
    workbook.insert("TOTAL".to_string(), total_sheet(&workbook));

    write_json(&workbook, "sample_workbook.json");
    write_csv_dir(&workbook, "sample_workbook_csv");
    write_parquet(&workbook, "sample_workbook.parquet");

    println!(
        "Wrote {} sheets x {} years to sample_workbook.{{json,parquet}} and sample_workbook_csv/",
        workbook.len(),
        YEARS.count()
    );
}
