//! Partner registry: reference number -> partner name and shared secret.
//!
//! The registry is read-only once built, so a single instance can be shared
//! across any number of concurrent pipeline runs without locking.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::model::PartnerRecord;

/// Lookup capability the pipeline depends on.
pub trait PartnerRegistry {
    /// Exact, case-sensitive match on the reference number.
    fn lookup(&self, reference_no: &str) -> Option<&PartnerRecord>;
}

/// Errors raised while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("line {line}: failed to parse partner row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("failed to open partner file: {0}")]
    Open(#[source] csv::Error),

    #[error("line {line}: empty reference number or secret")]
    EmptyField { line: usize },

    #[error("duplicate partner reference number '{0}'")]
    Duplicate(String),
}

#[derive(Debug, Deserialize)]
struct PartnerRow {
    refno: String,
    name: String,
    secret: String,
}

/// In-memory registry, immutable after construction.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    partners: HashMap<String, PartnerRecord>,
}

impl StaticRegistry {
    /// The compiled-in partner table.
    pub fn builtin() -> Self {
        let partners = [
            PartnerRecord::new("FG-00001", "Fourtitude Partner 1", "FAKEPASSWORD1234"),
            PartnerRecord::new("FG-00002", "Fourtitude Partner 2", "FAKEPASSWORD4578"),
        ];
        Self {
            partners: partners
                .into_iter()
                .map(|p| (p.reference_no.clone(), p))
                .collect(),
        }
    }

    /// Build from records, rejecting duplicate reference numbers.
    pub fn from_records(
        records: impl IntoIterator<Item = PartnerRecord>,
    ) -> Result<Self, RegistryError> {
        let mut partners = HashMap::new();
        for record in records {
            if partners.contains_key(&record.reference_no) {
                return Err(RegistryError::Duplicate(record.reference_no));
            }
            partners.insert(record.reference_no.clone(), record);
        }
        Ok(Self { partners })
    }

    /// Load a `refno,name,secret` csv file.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(RegistryError::Open)?;
        Self::from_csv_reader(reader)
    }

    /// Load `refno,name,secret` rows from any reader.
    pub fn from_reader(rdr: impl io::Read) -> Result<Self, RegistryError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);
        Self::from_csv_reader(reader)
    }

    fn from_csv_reader<R: io::Read>(reader: csv::Reader<R>) -> Result<Self, RegistryError> {
        let mut records = Vec::new();
        for (idx, result) in reader.into_deserialize::<PartnerRow>().enumerate() {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| RegistryError::Parse { line, source })?;
            if row.refno.is_empty() || row.secret.is_empty() {
                return Err(RegistryError::EmptyField { line });
            }
            records.push(PartnerRecord::new(row.refno, row.name, row.secret));
        }
        Self::from_records(records)
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PartnerRegistry for StaticRegistry {
    fn lookup(&self, reference_no: &str) -> Option<&PartnerRecord> {
        self.partners.get(reference_no)
    }
}
