//! Subdataset registry
//!
//! A parent dataset lists its subdatasets in a tab-separated file with
//! one row per `(identifier, path_posix)` pair. Reconciling a reference
//! appends it, replaces a row holding another version of it in place,
//! or leaves the registry alone when the row is already current.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::CatalogError;
use crate::value::{as_list, scalar_text};

/// Column names of the registry file, in order
pub const REGISTRY_COLUMNS: [&str; 5] =
    ["dataset_type", "identifier", "version", "path_posix", "url"];

/// Kind of dataset a reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatasetType {
    Datalad,
    Other,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Datalad => "DATALAD",
            DatasetType::Other => "OTHER",
        }
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DATALAD" => Ok(DatasetType::Datalad),
            "OTHER" => Ok(DatasetType::Other),
            other => Err(CatalogError::MalformedInput(format!(
                "Unknown dataset type '{}'",
                other
            ))),
        }
    }
}

/// One row of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdatasetReference {
    pub dataset_type: DatasetType,
    pub identifier: String,
    pub version: String,
    pub path_posix: String,
    /// Only set for DataLad datasets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SubdatasetReference {
    /// Build the reference to a child dataset from its dataset record
    ///
    /// The record's `url` is kept for DataLad datasets only; if it holds
    /// several URLs the first one is used.
    pub fn from_dataset_record(
        record: &Value,
        path_posix: &str,
        dataset_type: DatasetType,
    ) -> Result<Self, CatalogError> {
        let required = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| {
                    CatalogError::MalformedInput(format!("Dataset record has no {}", key))
                })
        };

        let url = match dataset_type {
            DatasetType::Datalad => as_list(record.get("url")).into_iter().find_map(scalar_text),
            DatasetType::Other => None,
        };

        Ok(Self {
            dataset_type,
            identifier: required("dataset_id")?,
            version: required("dataset_version")?,
            path_posix: path_posix.to_string(),
            url,
        })
    }

    /// Whether this row and `other` describe the same subdataset
    pub fn same_subdataset(&self, other: &SubdatasetReference) -> bool {
        self.identifier == other.identifier && self.path_posix == other.path_posix
    }
}

/// State of the registry with respect to one reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// No row for this identifier and path
    Absent,
    /// A row with the same version exists
    Current(usize),
    /// A row with a different version exists
    Stale(usize),
}

/// What reconciling a reference did to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Unchanged,
    Appended,
    Replaced { index: usize },
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, ReconcileOutcome::Unchanged)
    }
}

/// Ordered subdataset references of a parent dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubdatasetRegistry {
    rows: Vec<SubdatasetReference>,
}

impl SubdatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<SubdatasetReference>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[SubdatasetReference] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find the row for a reference's identifier and path
    ///
    /// Fails if the registry already holds more than one such row.
    pub fn state_of(&self, reference: &SubdatasetReference) -> Result<RowState, CatalogError> {
        let mut matches = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.same_subdataset(reference));

        match (matches.next(), matches.next()) {
            (None, _) => Ok(RowState::Absent),
            (Some((index, row)), None) => {
                if row.version == reference.version {
                    Ok(RowState::Current(index))
                } else {
                    Ok(RowState::Stale(index))
                }
            }
            (Some(_), Some(_)) => Err(CatalogError::IdentityConflict {
                identifier: reference.identifier.clone(),
                path: reference.path_posix.clone(),
            }),
        }
    }

    /// Bring the registry in line with a reference
    ///
    /// Rows for other subdatasets are never touched. A stale row is
    /// replaced where it stands so the file diffs stay minimal.
    pub fn reconcile(
        &mut self,
        reference: SubdatasetReference,
    ) -> Result<ReconcileOutcome, CatalogError> {
        let outcome = match self.state_of(&reference)? {
            RowState::Current(_) => ReconcileOutcome::Unchanged,
            RowState::Stale(index) => {
                self.rows[index] = reference;
                ReconcileOutcome::Replaced { index }
            }
            RowState::Absent => {
                self.rows.push(reference);
                ReconcileOutcome::Appended
            }
        };
        debug!("Reconciled subdataset registry: {:?}", outcome);
        Ok(outcome)
    }

    /// Parse the tab-separated registry format
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());

        let header: Vec<&str> = match lines.next() {
            Some(line) => line.split('\t').map(str::trim).collect(),
            None => return Ok(Self::new()),
        };
        if header != REGISTRY_COLUMNS {
            return Err(CatalogError::MalformedInput(format!(
                "Unexpected registry header: {}",
                header.join(", ")
            )));
        }

        let mut rows = Vec::new();
        for (n, line) in lines.enumerate() {
            let cells: Vec<&str> = line.split('\t').collect();
            // a trailing empty url cell may be cut off by editors
            if cells.len() != REGISTRY_COLUMNS.len() && cells.len() != REGISTRY_COLUMNS.len() - 1 {
                return Err(CatalogError::MalformedInput(format!(
                    "Registry row {} has {} columns, expected {}",
                    n + 1,
                    cells.len(),
                    REGISTRY_COLUMNS.len()
                )));
            }

            let url = cells.get(4).map(|u| u.trim()).filter(|u| !u.is_empty());
            rows.push(SubdatasetReference {
                dataset_type: cells[0].parse()?,
                identifier: cells[1].to_string(),
                version: cells[2].to_string(),
                path_posix: cells[3].to_string(),
                url: url.map(String::from),
            });
        }

        Ok(Self { rows })
    }

    /// Render the registry in its tab-separated format
    pub fn to_tsv(&self) -> Result<String, CatalogError> {
        let mut out = REGISTRY_COLUMNS.join("\t");
        out.push('\n');
        for row in &self.rows {
            let cells = [
                row.dataset_type.as_str(),
                row.identifier.as_str(),
                row.version.as_str(),
                row.path_posix.as_str(),
                row.url.as_deref().unwrap_or(""),
            ];
            if let Some(bad) = cells.iter().find(|c| c.contains(['\t', '\n', '\r'])) {
                return Err(CatalogError::MalformedInput(format!(
                    "Registry value {:?} contains a tab or line break",
                    bad
                )));
            }
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        Ok(out)
    }

    /// Load a registry file; a missing file is an empty registry
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            debug!("No registry at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Write the registry file
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let content = self.to_tsv()?;
        std::fs::write(path, content)?;
        info!("Wrote {} subdataset rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// Compute the next registry state for a reference
///
/// Returns the new registry and whether it differs from the input.
pub fn reconcile(
    registry: &SubdatasetRegistry,
    reference: SubdatasetReference,
) -> Result<(SubdatasetRegistry, bool), CatalogError> {
    let mut next = registry.clone();
    let outcome = next.reconcile(reference)?;
    Ok((next, outcome.changed()))
}
