// Write a (filtered) table as CSV

use anyhow::{Context, Result};
use std::io::Write;

use crate::table::Table;

/// Header row from the table's columns; nulls are written as empty fields
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(table.columns())
        .context("Failed to write CSV header")?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|v| v.to_string()))
            .context("Failed to write CSV row")?;
    }

    wtr.flush()?;
    Ok(())
}
