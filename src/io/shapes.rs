//! Columnar CSV shape store.
//!
//! One file per (ISO, technology, year) named `<ISO>_<technology>_<year>.csv`
//! inside a root directory. The header holds one cell id per column and
//! every following row is one hour of the year.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::calendar::HOURS_PER_YEAR;
use crate::error::{Result, TimesliceError};
use crate::resources::cache::ShapeStore;
use crate::resources::types::{CellId, Technology};

/// Shape store backed by a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvShapeStore {
    root: PathBuf,
}

impl CsvShapeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the file holding `(iso, technology, year)`.
    pub fn path_for(&self, iso: &str, technology: Technology, year: u16) -> PathBuf {
        self.root.join(format!("{iso}_{technology}_{year}.csv"))
    }
}

impl ShapeStore for CsvShapeStore {
    fn fetch(
        &self,
        iso: &str,
        technology: Technology,
        year: u16,
        ids: &[CellId],
    ) -> Result<HashMap<CellId, Vec<f64>>> {
        let path = self.path_for(iso, technology, year);
        if !path.exists() {
            debug!(path = %path.display(), "no shape file");
            return Ok(HashMap::new());
        }
        let mut rdr = csv::ReaderBuilder::new().from_path(&path)?;

        let mut columns: Vec<(usize, CellId)> = Vec::new();
        for (col, field) in rdr.headers()?.iter().enumerate() {
            let id: CellId = field.trim().parse().map_err(|_| {
                TimesliceError::unavailable(
                    iso,
                    format!("bad cell id \"{field}\" in {}", path.display()),
                )
            })?;
            if ids.contains(&id) {
                columns.push((col, id));
            }
        }

        let mut series: HashMap<CellId, Vec<f64>> = columns
            .iter()
            .map(|(_, id)| (*id, Vec::with_capacity(HOURS_PER_YEAR)))
            .collect();
        if columns.is_empty() {
            return Ok(series);
        }
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            for (col, id) in &columns {
                let raw = record.get(*col).unwrap_or("").trim();
                let value: f64 = raw.parse().map_err(|_| {
                    TimesliceError::unavailable(
                        iso,
                        format!(
                            "bad value \"{raw}\" for cell {id} on row {} of {}",
                            line + 1,
                            path.display()
                        ),
                    )
                })?;
                if let Some(s) = series.get_mut(id) {
                    s.push(value);
                }
            }
        }
        Ok(series)
    }
}

/// Writes shapes in the layout [`CsvShapeStore`] reads.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn write_shapes(path: &Path, shapes: &BTreeMap<CellId, Vec<f64>>) -> Result<()> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(io::BufWriter::new(file));
    wtr.write_record(shapes.keys().map(ToString::to_string))?;
    let rows = shapes.values().map(Vec::len).max().unwrap_or(0);
    for h in 0..rows {
        wtr.write_record(
            shapes
                .values()
                .map(|s| s.get(h).map(|v| v.to_string()).unwrap_or_default()),
        )?;
    }
    wtr.flush()?;
    Ok(())
}
