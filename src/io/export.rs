//! CSV export for mapping tables and scenario diagnostics.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::error::Result;
use crate::mapping::{ConsolidatedMapping, TimesliceMapping};
use crate::runner::IsoRun;

/// Column header of a standalone mapping.
const MAPPING_HEADER: &str = "description,source,timeslice";

/// Column header of the diagnostics table.
const DIAGNOSTICS_HEADER: &str = "scenario,periods,stress_hours,aggregated_hours,timeslices";

/// Exports one scenario's mapping to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_mapping(mapping: &TimesliceMapping, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_mapping(mapping, io::BufWriter::new(file))
}

/// Writes a standalone mapping as CSV to any writer.
///
/// # Arguments
///
/// * `mapping` - Mapping of a single scenario
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_mapping(mapping: &TimesliceMapping, writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(MAPPING_HEADER.split(','))?;
    for row in mapping.rows() {
        wtr.write_record([
            row.description.as_str(),
            row.source.as_str(),
            row.timeslice.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Exports the consolidated table to a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if file creation or writing fails.
pub fn export_consolidated(table: &ConsolidatedMapping, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_consolidated(table, io::BufWriter::new(file))
}

/// Writes the consolidated table as CSV: `description,source` followed by
/// one column per scenario.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_consolidated(table: &ConsolidatedMapping, writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    let header = ["description", "source"]
        .into_iter()
        .chain(table.scenarios.iter().map(String::as_str));
    wtr.write_record(header)?;
    for row in &table.rows {
        let record = [row.description.as_str(), row.source.as_str()]
            .into_iter()
            .chain(row.values.iter().map(String::as_str));
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one diagnostics row per scenario of an ISO run.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_diagnostics(run: &IsoRun, writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(DIAGNOSTICS_HEADER.split(','))?;
    for s in &run.scenarios {
        let d = s.diagnostics;
        wtr.write_record(&[
            s.name.clone(),
            d.periods.to_string(),
            d.stress_hours.to_string(),
            d.aggregated_hours.to_string(),
            d.timeslices.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
