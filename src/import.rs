// CSV import: fill a fresh (or existing) database from one CSV file per
// table. Rows are upserted by id, so importing the same directory twice
// leaves the database unchanged.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::db::setup_database;

#[derive(Debug, Deserialize)]
struct FranchiseRecord {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct OrganizationRecord {
    id: i64,
    franchise_id: i64,
    name: String,
    organization_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndividualRecord {
    id: i64,
    franchise_id: i64,
    name: String,
    species: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommanderRecord {
    id: i64,
    individual_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VehicleRecord {
    id: i64,
    franchise_id: i64,
    name: String,
    manufacturer: Option<String>,
    commander_id: Option<i64>,
}

/// Rows written per table
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub franchises: usize,
    pub organizations: usize,
    pub individuals: usize,
    pub commanders: usize,
    pub vehicles: usize,
}

/// Import `franchises.csv` (required) and the optional entity files from `dir`
pub fn import_dir(conn: &mut Connection, dir: &Path) -> Result<ImportSummary> {
    setup_database(conn)?;

    let open = |name: &str| -> Result<Option<File>> {
        let path = dir.join(name);
        if path.exists() {
            let file = File::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Some(file))
        } else {
            Ok(None)
        }
    };

    let franchises = open("franchises.csv")?
        .with_context(|| format!("franchises.csv not found in {}", dir.display()))?;

    let tx = conn.transaction()?;
    let mut summary = ImportSummary {
        franchises: import_franchises(&tx, franchises)?,
        ..ImportSummary::default()
    };

    match open("organizations.csv")? {
        Some(f) => summary.organizations = import_organizations(&tx, f)?,
        None => warn!("organizations.csv not found, skipping"),
    }
    match open("individuals.csv")? {
        Some(f) => summary.individuals = import_individuals(&tx, f)?,
        None => warn!("individuals.csv not found, skipping"),
    }
    match open("commanders.csv")? {
        Some(f) => summary.commanders = import_commanders(&tx, f)?,
        None => warn!("commanders.csv not found, skipping"),
    }
    match open("vehicles.csv")? {
        Some(f) => summary.vehicles = import_vehicles(&tx, f)?,
        None => warn!("vehicles.csv not found, skipping"),
    }

    tx.commit()?;
    info!(?summary, dir = %dir.display(), "import complete");
    Ok(summary)
}

fn records<T, R>(reader: R, what: &str) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize()
        .enumerate()
        .map(|(i, r)| r.with_context(|| format!("Failed to deserialize {} row {}", what, i + 1)))
        .collect()
}

pub fn import_franchises<R: Read>(conn: &Connection, reader: R) -> Result<usize> {
    let rows: Vec<FranchiseRecord> = records(reader, "franchise")?;
    for r in &rows {
        conn.execute(
            "INSERT OR REPLACE INTO franchises (id, name) VALUES (?1, ?2)",
            params![r.id, r.name],
        )?;
    }
    Ok(rows.len())
}

pub fn import_organizations<R: Read>(conn: &Connection, reader: R) -> Result<usize> {
    let rows: Vec<OrganizationRecord> = records(reader, "organization")?;
    for r in &rows {
        conn.execute(
            "INSERT OR REPLACE INTO organizations (id, franchise_id, name, organization_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![r.id, r.franchise_id, r.name, r.organization_type],
        )?;
    }
    Ok(rows.len())
}

pub fn import_individuals<R: Read>(conn: &Connection, reader: R) -> Result<usize> {
    let rows: Vec<IndividualRecord> = records(reader, "individual")?;
    for r in &rows {
        conn.execute(
            "INSERT OR REPLACE INTO individuals (id, franchise_id, name, species)
             VALUES (?1, ?2, ?3, ?4)",
            params![r.id, r.franchise_id, r.name, r.species],
        )?;
    }
    Ok(rows.len())
}

pub fn import_commanders<R: Read>(conn: &Connection, reader: R) -> Result<usize> {
    let rows: Vec<CommanderRecord> = records(reader, "commander")?;
    for r in &rows {
        conn.execute(
            "INSERT OR REPLACE INTO commanders (id, individual_id) VALUES (?1, ?2)",
            params![r.id, r.individual_id],
        )?;
    }
    Ok(rows.len())
}

pub fn import_vehicles<R: Read>(conn: &Connection, reader: R) -> Result<usize> {
    let rows: Vec<VehicleRecord> = records(reader, "vehicle")?;
    for r in &rows {
        conn.execute(
            "INSERT OR REPLACE INTO vehicles (id, franchise_id, name, manufacturer, commander_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![r.id, r.franchise_id, r.name, r.manufacturer, r.commander_id],
        )?;
    }
    Ok(rows.len())
}
