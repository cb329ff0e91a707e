use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::error::LoadError;
use super::model::{
    CellValue, GenericTable, TrajectoryFrame, TrajectoryTable, TransitionRecord, TransitionTable,
};

/// Columns of a raw `.dat` trajectory: frame, donor, acceptor, FRET, idealized FRET.
const TRAJECTORY_COLUMNS: usize = 5;

/// Columns of a transition file: molecule, FRET before, FRET after, time (frames).
const TRANSITION_COLUMNS: usize = 4;

// ---------------------------------------------------------------------------
// Data kinds
// ---------------------------------------------------------------------------

/// The kinds of input the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    /// Directory of per-molecule `.dat` trajectories.
    Histogram,
    /// A single transition/dwell table.
    Transitions,
    /// Directory of header-less CSVs of pre-aggregated frequencies.
    TransitionFrequency,
    /// Any other tabular file (CSV, JSON records or Parquet).
    Other,
}

impl FromStr for DataKind {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hist" => Ok(DataKind::Histogram),
            "TDP" => Ok(DataKind::Transitions),
            "transition_frequency" => Ok(DataKind::TransitionFrequency),
            "other" => Ok(DataKind::Other),
            other => Err(LoadError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataKind::Histogram => "hist",
            DataKind::Transitions => "TDP",
            DataKind::TransitionFrequency => "transition_frequency",
            DataKind::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Result of [`load`], one variant per schema.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedTable {
    Trajectories(TrajectoryTable),
    Transitions(TransitionTable),
    Table(GenericTable),
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load `source` as the declared kind.
///
/// `treatment` labels trajectory and transition rows. `column_names` is
/// required for [`DataKind::TransitionFrequency`] and ignored otherwise.
pub fn load(
    source: &Path,
    kind: DataKind,
    treatment: &str,
    column_names: Option<&[String]>,
) -> Result<LoadedTable, LoadError> {
    log::debug!("loading {} as {kind}", source.display());
    match kind {
        DataKind::Histogram => load_histogram_dir(source, treatment).map(LoadedTable::Trajectories),
        DataKind::Transitions => load_transitions(source, treatment).map(LoadedTable::Transitions),
        DataKind::TransitionFrequency => {
            let names = column_names.ok_or(LoadError::MissingColumnNames)?;
            load_frequency_dir(source, names).map(LoadedTable::Table)
        }
        DataKind::Other => load_generic(source).map(LoadedTable::Table),
    }
}

// ---------------------------------------------------------------------------
// Whitespace-delimited loaders
// ---------------------------------------------------------------------------

/// Read every `*.dat` trajectory in `dir` (sorted by path) into one table.
/// The molecule id of each frame is its file stem.
pub fn load_histogram_dir(dir: &Path, treatment: &str) -> Result<TrajectoryTable, LoadError> {
    let files = list_files(dir, "dat")?;
    let mut frames = Vec::new();

    for path in &files {
        let molecule = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;

        for (line_no, fields) in whitespace_rows(&text) {
            check_width(path, line_no, TRAJECTORY_COLUMNS, fields.len())?;
            frames.push(TrajectoryFrame {
                frame: parse_index(fields[0], path, line_no, "frame index")?,
                donor: parse_f64(fields[1], path, line_no, "donor intensity")?,
                acceptor: parse_f64(fields[2], path, line_no, "acceptor intensity")?,
                fret: parse_f64(fields[3], path, line_no, "FRET value")?,
                idealized_fret: parse_f64(fields[4], path, line_no, "idealized FRET value")?,
                treatment: treatment.to_string(),
                molecule: molecule.clone(),
            });
        }
    }

    log::info!(
        "{treatment}: read {} frames from {} trajectories in {}",
        frames.len(),
        files.len(),
        dir.display()
    );
    Ok(TrajectoryTable::new(frames))
}

/// Read a header-less transition table
/// (`Molecule`, `FRET before`, `FRET after`, `Time` in frames).
pub fn load_transitions(path: &Path, treatment: &str) -> Result<TransitionTable, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let mut records = Vec::new();

    for (line_no, fields) in whitespace_rows(&text) {
        check_width(path, line_no, TRANSITION_COLUMNS, fields.len())?;
        let dwell_frames = parse_f64(fields[3], path, line_no, "dwell time")?;
        if !dwell_frames.is_finite() || dwell_frames <= 0.0 {
            return Err(LoadError::InvalidNumber {
                path: path.to_path_buf(),
                line: line_no,
                token: fields[3].to_string(),
                what: "positive dwell time",
            });
        }
        records.push(TransitionRecord {
            molecule: parse_index(fields[0], path, line_no, "molecule id")?,
            fret_before: parse_f64(fields[1], path, line_no, "FRET value")?,
            fret_after: parse_f64(fields[2], path, line_no, "FRET value")?,
            dwell_frames,
            treatment: treatment.to_string(),
        });
    }

    log::info!(
        "{treatment}: read {} transitions from {}",
        records.len(),
        path.display()
    );
    Ok(TransitionTable::new(records))
}

/// Non-empty lines split on whitespace, with 1-based line numbers.
fn whitespace_rows(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line.split_whitespace().collect()))
}

fn check_width(path: &Path, line: usize, expected: usize, found: usize) -> Result<(), LoadError> {
    if found != expected {
        return Err(LoadError::SchemaMismatch {
            path: path.to_path_buf(),
            line,
            expected,
            found,
        });
    }
    Ok(())
}

fn parse_f64(tok: &str, path: &Path, line: usize, what: &'static str) -> Result<f64, LoadError> {
    tok.parse::<f64>().map_err(|_| LoadError::InvalidNumber {
        path: path.to_path_buf(),
        line,
        token: tok.to_string(),
        what,
    })
}

/// Parse a non-negative integer index. Values written as floats
/// (`"12.0"`, `"1.2e1"`) are accepted when they are integral.
fn parse_index(tok: &str, path: &Path, line: usize, what: &'static str) -> Result<u64, LoadError> {
    if let Ok(i) = tok.parse::<u64>() {
        return Ok(i);
    }
    match tok.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Ok(v as u64),
        _ => Err(LoadError::InvalidNumber {
            path: path.to_path_buf(),
            line,
            token: tok.to_string(),
            what,
        }),
    }
}

/// Files in `dir` with the given extension, sorted by path.
fn list_files(dir: &Path, extension: &'static str) -> Result<Vec<PathBuf>, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|e| LoadError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| LoadError::io(dir, e))?.path();
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(LoadError::NoInputFiles {
            dir: dir.to_path_buf(),
            extension,
        });
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// CSV loaders
// ---------------------------------------------------------------------------

/// Concatenate every header-less `*.csv` in `dir` and name the columns.
pub fn load_frequency_dir(dir: &Path, column_names: &[String]) -> Result<GenericTable, LoadError> {
    if column_names.is_empty() {
        return Err(LoadError::MissingColumnNames);
    }
    let mut rows = Vec::new();

    for path in list_files(dir, "csv")? {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(|e| LoadError::csv(&path, e))?;
        for result in reader.records() {
            let record = result.map_err(|e| LoadError::csv(&path, e))?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            check_width(&path, line, column_names.len(), record.len())?;
            rows.push(record.iter().map(CellValue::guess).collect());
        }
    }

    Ok(GenericTable {
        columns: column_names.to_vec(),
        rows,
    })
}

/// Load any tabular file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with column names
/// * `.json`    – `[{ "column": value, ... }, ...]`
/// * `.parquet` – flat columns of strings, integers, floats or bools
pub fn load_generic(path: &Path) -> Result<GenericTable, LoadError> {
    match extension(path).as_str() {
        "csv" => load_generic_csv(path),
        "json" => load_generic_json(path),
        "parquet" | "pq" => load_generic_parquet(path),
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn load_generic_csv(path: &Path) -> Result<GenericTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| LoadError::csv(path, e))?;
    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::csv(path, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| LoadError::csv(path, e))?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        check_width(path, line, columns.len(), record.len())?;
        rows.push(record.iter().map(CellValue::guess).collect());
    }

    Ok(GenericTable { columns, rows })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`.
/// Keys missing from a record become nulls.
fn load_generic_json(path: &Path) -> Result<GenericTable, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let root: JsonValue = serde_json::from_str(&text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let invalid = |message: String| LoadError::InvalidFormat {
        path: path.to_path_buf(),
        message,
    };
    let records = root
        .as_array()
        .ok_or_else(|| invalid("expected a top-level JSON array".to_string()))?;

    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| invalid(format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            columns
                .iter()
                .map(|c| obj.get(c).map_or(CellValue::Null, json_to_cell))
                .collect()
        })
        .collect();

    Ok(GenericTable { columns, rows })
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loaders
// ---------------------------------------------------------------------------

fn parquet_batches(
    path: &Path,
) -> Result<Vec<arrow::record_batch::RecordBatch>, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::io(path, e))?;
    let parquet_err = |source| LoadError::Parquet {
        path: path.to_path_buf(),
        source,
    };
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(parquet_err)?
        .build()
        .map_err(parquet_err)?;

    reader
        .map(|batch| {
            batch.map_err(|source| LoadError::Arrow {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

fn load_generic_parquet(path: &Path) -> Result<GenericTable, LoadError> {
    let mut table = GenericTable::default();

    for batch in parquet_batches(path)? {
        let schema = batch.schema();
        if table.columns.is_empty() {
            table.columns = schema.fields().iter().map(|f| f.name().clone()).collect();
        }
        for row in 0..batch.num_rows() {
            table
                .rows
                .push(batch.columns().iter().map(|col| arrow_cell(col, row)).collect());
        }
    }

    Ok(table)
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &ArrayRef, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => col
            .as_string_opt::<i32>()
            .map_or(CellValue::Null, |s| CellValue::String(s.value(row).to_string())),
        DataType::LargeUtf8 => col
            .as_string_opt::<i64>()
            .map_or(CellValue::Null, |s| CellValue::String(s.value(row).to_string())),
        DataType::Boolean => col
            .as_boolean_opt()
            .map_or(CellValue::Null, |b| CellValue::Bool(b.value(row))),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            cast(col, &DataType::Int64)
                .ok()
                .and_then(|c| c.as_primitive_opt::<Int64Type>().map(|a| a.value(row)))
                .map_or(CellValue::Null, CellValue::Integer)
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            cast(col, &DataType::Float64)
                .ok()
                .and_then(|c| c.as_primitive_opt::<Float64Type>().map(|a| a.value(row)))
                .map_or(CellValue::Null, CellValue::Float)
        }
        other => CellValue::String(format!("{other:?}")),
    }
}

// ---------------------------------------------------------------------------
// Compiled trajectories (written by `export`)
// ---------------------------------------------------------------------------

/// Read back a compiled trajectory table from `.csv` or `.parquet`.
pub fn load_compiled_trajectories(path: &Path) -> Result<TrajectoryTable, LoadError> {
    match extension(path).as_str() {
        "csv" => {
            let mut reader = csv::Reader::from_path(path).map_err(|e| LoadError::csv(path, e))?;
            let frames = reader
                .deserialize::<TrajectoryFrame>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| LoadError::csv(path, e))?;
            Ok(TrajectoryTable::new(frames))
        }
        "parquet" | "pq" => load_compiled_parquet(path),
        other => Err(LoadError::UnsupportedExtension(other.to_string())),
    }
}

fn load_compiled_parquet(path: &Path) -> Result<TrajectoryTable, LoadError> {
    let mut frames = Vec::new();

    for batch in parquet_batches(path)? {
        let column = |name: &str, dtype: &DataType| -> Result<ArrayRef, LoadError> {
            let schema = batch.schema();
            let idx = schema.index_of(name).map_err(|_| LoadError::InvalidFormat {
                path: path.to_path_buf(),
                message: format!("missing '{name}' column"),
            })?;
            cast(batch.column(idx), dtype).map_err(|source| LoadError::Arrow {
                path: path.to_path_buf(),
                source,
            })
        };

        let frame_col = column("frames", &DataType::UInt64)?;
        let donor_col = column("donor", &DataType::Float64)?;
        let acceptor_col = column("acceptor", &DataType::Float64)?;
        let fret_col = column("FRET", &DataType::Float64)?;
        let ideal_col = column("idealized FRET", &DataType::Float64)?;
        let treatment_col = column("treatment_name", &DataType::Utf8)?;
        let molecule_col = match batch.schema().index_of("molecule") {
            Ok(_) => Some(column("molecule", &DataType::Utf8)?),
            Err(_) => None,
        };

        let wrong_type = || LoadError::InvalidFormat {
            path: path.to_path_buf(),
            message: "unexpected column type after cast".to_string(),
        };
        let frame = frame_col.as_primitive_opt::<UInt64Type>().ok_or_else(wrong_type)?;
        let donor = donor_col.as_primitive_opt::<Float64Type>().ok_or_else(wrong_type)?;
        let acceptor = acceptor_col.as_primitive_opt::<Float64Type>().ok_or_else(wrong_type)?;
        let fret = fret_col.as_primitive_opt::<Float64Type>().ok_or_else(wrong_type)?;
        let ideal = ideal_col.as_primitive_opt::<Float64Type>().ok_or_else(wrong_type)?;
        let treatment = treatment_col.as_string_opt::<i32>().ok_or_else(wrong_type)?;
        let molecule = molecule_col
            .as_ref()
            .map(|col| col.as_string_opt::<i32>().ok_or_else(wrong_type))
            .transpose()?;

        for row in 0..batch.num_rows() {
            frames.push(TrajectoryFrame {
                frame: frame.value(row),
                donor: donor.value(row),
                acceptor: acceptor.value(row),
                fret: fret.value(row),
                idealized_fret: ideal.value(row),
                treatment: treatment.value(row).to_string(),
                molecule: molecule.map_or_else(String::new, |m| m.value(row).to_string()),
            });
        }
    }

    Ok(TrajectoryTable::new(frames))
}
