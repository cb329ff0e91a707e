//! CSV and Parquet writers for compiled and derived tables.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use super::error::LoadError;
use super::model::{Dwell, TrajectoryTable, TransitionClass};
use crate::analysis::{ClassifiedDwells, MeanDwell, MoleculeFraction, Occupancy, TransitionFrequency};

/// Write any serializable rows to a CSV with a header row.
fn write_rows<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), LoadError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| LoadError::csv(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| LoadError::csv(path, e))?;
    }
    writer.flush().map_err(|e| LoadError::io(path, e))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), LoadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LoadError::io(parent, e))?;
    }
    Ok(())
}

/// Write a table with an explicit header and pre-formatted cells.
fn write_records(path: &Path, header: &[String], records: &[Vec<String>]) -> Result<(), LoadError> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| LoadError::csv(path, e))?;
    writer.write_record(header).map_err(|e| LoadError::csv(path, e))?;
    for record in records {
        writer.write_record(record).map_err(|e| LoadError::csv(path, e))?;
    }
    writer.flush().map_err(|e| LoadError::io(path, e))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

fn class_header(threshold: f64) -> Vec<String> {
    TransitionClass::ALL.iter().map(|c| c.header(threshold)).collect()
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Trajectories
// ---------------------------------------------------------------------------

pub fn write_trajectories_csv(path: &Path, table: &TrajectoryTable) -> Result<(), LoadError> {
    write_rows(path, &table.frames)
}

/// Write the compiled trajectories as a single-batch Parquet file.
pub fn write_trajectories_parquet(path: &Path, table: &TrajectoryTable) -> Result<(), LoadError> {
    ensure_parent(path)?;
    let frames = &table.frames;

    let schema = Arc::new(Schema::new(vec![
        Field::new("frames", DataType::UInt64, false),
        Field::new("donor", DataType::Float64, false),
        Field::new("acceptor", DataType::Float64, false),
        Field::new("FRET", DataType::Float64, false),
        Field::new("idealized FRET", DataType::Float64, false),
        Field::new("treatment_name", DataType::Utf8, false),
        Field::new("molecule", DataType::Utf8, false),
    ]));

    let arrow_err = |source| LoadError::Arrow {
        path: path.to_path_buf(),
        source,
    };
    let parquet_err = |source| LoadError::Parquet {
        path: path.to_path_buf(),
        source,
    };

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(UInt64Array::from_iter_values(frames.iter().map(|f| f.frame))),
            Arc::new(Float64Array::from_iter_values(frames.iter().map(|f| f.donor))),
            Arc::new(Float64Array::from_iter_values(frames.iter().map(|f| f.acceptor))),
            Arc::new(Float64Array::from_iter_values(frames.iter().map(|f| f.fret))),
            Arc::new(Float64Array::from_iter_values(
                frames.iter().map(|f| f.idealized_fret),
            )),
            Arc::new(StringArray::from_iter_values(
                frames.iter().map(|f| f.treatment.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                frames.iter().map(|f| f.molecule.as_str()),
            )),
        ],
    )
    .map_err(arrow_err)?;

    let file = std::fs::File::create(path).map_err(|e| LoadError::io(path, e))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).map_err(parquet_err)?;
    writer.write(&batch).map_err(parquet_err)?;
    writer.close().map_err(parquet_err)?;
    log::debug!("wrote {} frames to {}", frames.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Dwell tables
// ---------------------------------------------------------------------------

pub fn write_dwells_csv(path: &Path, dwells: &[Dwell]) -> Result<(), LoadError> {
    write_rows(path, dwells)
}

/// One column per class; shorter columns are padded with empty cells.
pub fn write_classified_csv(path: &Path, classified: &ClassifiedDwells) -> Result<(), LoadError> {
    let records: Vec<Vec<String>> = classified
        .rows()
        .map(|row| row.iter().map(|v| format_optional(*v)).collect())
        .collect();
    write_records(path, &class_header(classified.threshold), &records)
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

pub fn write_frequencies_csv(path: &Path, rows: &[TransitionFrequency]) -> Result<(), LoadError> {
    let Some(first) = rows.first() else {
        return write_records(path, &["sample".to_string()], &[]);
    };
    let mut header = class_header(first.threshold);
    header.push("sample".to_string());
    let records: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells: Vec<String> = r.percent.iter().map(|p| p.to_string()).collect();
            cells.push(r.treatment.clone());
            cells
        })
        .collect();
    write_records(path, &header, &records)
}

pub fn write_means_csv(path: &Path, rows: &[MeanDwell]) -> Result<(), LoadError> {
    let Some(first) = rows.first() else {
        return write_records(path, &["sample".to_string()], &[]);
    };
    let mut header = class_header(first.threshold);
    header.push("sample".to_string());
    let records: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            let mut cells: Vec<String> = r.mean_s.iter().map(|m| format_optional(*m)).collect();
            cells.push(r.treatment.clone());
            cells
        })
        .collect();
    write_records(path, &header, &records)
}

pub fn write_occupancy_csv(path: &Path, rows: &[Occupancy]) -> Result<(), LoadError> {
    let Some(first) = rows.first() else {
        return write_records(path, &["treatment".to_string()], &[]);
    };
    let header = vec![
        format!("< {}", first.threshold),
        format!("> {}", first.threshold),
        "treatment".to_string(),
    ];
    let records: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.time_below.to_string(),
                r.time_above.to_string(),
                r.treatment.clone(),
            ]
        })
        .collect();
    write_records(path, &header, &records)
}

pub fn write_molecule_fractions_csv(
    path: &Path,
    rows: &[MoleculeFraction],
) -> Result<(), LoadError> {
    write_rows(path, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_compiled_trajectories;
    use crate::data::model::TrajectoryFrame;
    use tempfile::tempdir;

    fn sample_table() -> TrajectoryTable {
        TrajectoryTable::new(
            (0..4)
                .map(|i| TrajectoryFrame {
                    frame: i,
                    donor: 100.0 + i as f64,
                    acceptor: 50.0,
                    fret: 0.25 * i as f64,
                    idealized_fret: 0.3,
                    treatment: if i < 2 { "Native" } else { "ATP" }.to_string(),
                    molecule: format!("mol{}", i % 2),
                })
                .collect(),
        )
    }

    #[test]
    fn test_trajectory_csv_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("Raw_FRET_histogram_data.csv");
        let table = sample_table();

        write_trajectories_csv(&path, &table).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("frames,donor,acceptor,FRET,idealized FRET,treatment_name,molecule"));

        let reloaded = load_compiled_trajectories(&path).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_trajectory_parquet_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("compiled.parquet");
        let table = sample_table();

        write_trajectories_parquet(&path, &table).unwrap();
        let reloaded = load_compiled_trajectories(&path).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_classified_padding() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("classified.csv");
        let classified = ClassifiedDwells {
            threshold: 0.5,
            columns: [vec![1.0, 2.0], vec![3.0], vec![], vec![4.0]],
        };

        write_classified_csv(&path, &classified).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "< 0.5 to < 0.5,< 0.5 to > 0.5,> 0.5 to > 0.5,> 0.5 to < 0.5");
        assert_eq!(lines[1], "1,3,,4");
        assert_eq!(lines[2], "2,,,");
        assert_eq!(lines.len(), 3);
    }
}
