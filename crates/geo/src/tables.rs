//! Row shapes of the static reference tables and their CSV loaders.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// Department reference row, numeric fields still raw
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentRow {
    pub code_departement: String,
    pub nom_departement: String,
    pub code_region: String,
    pub nom_region: String,
    pub latitude: String,
    pub longitude: String,
}

/// Commune reference row: one geocoded place for a postal code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommuneRow {
    pub postcode: String,
    pub commune: String,
    pub latitude: String,
    pub longitude: String,
}

/// Broader postal directory row (no coordinates), used to name missing codes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceCommuneRow {
    #[serde(rename = "CodePostal")]
    pub code_postal: String,
    #[serde(rename = "NomCommune")]
    pub nom_commune: String,
}

fn read_rows<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn load_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path)?;
    let rows = read_rows(file)?;
    log::debug!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn read_department_rows<R: Read>(reader: R) -> Result<Vec<DepartmentRow>> {
    read_rows(reader)
}

pub fn read_commune_rows<R: Read>(reader: R) -> Result<Vec<CommuneRow>> {
    read_rows(reader)
}

pub fn read_reference_communes<R: Read>(reader: R) -> Result<Vec<ReferenceCommuneRow>> {
    read_rows(reader)
}

/// Load `code_departement,nom_departement,code_region,nom_region,latitude,longitude`
pub fn load_department_rows(path: impl AsRef<Path>) -> Result<Vec<DepartmentRow>> {
    load_rows(path.as_ref())
}

/// Load `postcode,commune,latitude,longitude` (extra columns ignored)
pub fn load_commune_rows(path: impl AsRef<Path>) -> Result<Vec<CommuneRow>> {
    load_rows(path.as_ref())
}

/// Load `CodePostal,NomCommune`
pub fn load_reference_communes(path: impl AsRef<Path>) -> Result<Vec<ReferenceCommuneRow>> {
    load_rows(path.as_ref())
}
