//! Tabby Catalog Library
//!
//! This library turns dataset descriptions (tabby sidecar files already
//! loaded and expanded into linked-data documents) into records that
//! conform to a data catalog schema, and maintains the registry of
//! subdatasets a parent dataset lists about itself.
//!
//! # Overview
//!
//! Assembling records from a document:
//!
//! 1. Determining `dataset_id` and `dataset_version` from an identity policy
//!    (minted from the name, the name itself, or an external identity)
//! 2. Normalizing each field (authors, license, keywords, ...) whether the
//!    document holds a single value or a list
//! 3. Enriching sample terms with labels and identifiers from an ontology
//!    lookup service
//! 4. Building one dataset record plus one record per listed file
//!
//! Registering a subdataset with its parent:
//!
//! 1. Deriving a reference from the child's dataset record
//! 2. Reconciling it into the parent's registry: append if new, replace
//!    in place if another version is listed, otherwise leave untouched
//!
//! # Usage
//!
//! ```ignore
//! use tabby_catalog::{assemble, to_json_string, AssembleOptions, HttpFetcher, IdentityPolicy};
//!
//! let document: serde_json::Value = // load the expanded tabby record
//! let fetcher = HttpFetcher::new()?;
//! let result = assemble(
//!     &document,
//!     &IdentityPolicy::MintFromName,
//!     &fetcher,
//!     &AssembleOptions::default(),
//! )?;
//!
//! println!("{}", to_json_string(&result, true)?);
//! ```
//!
//! ```ignore
//! use tabby_catalog::{DatasetType, SubdatasetReference, SubdatasetRegistry};
//!
//! let reference =
//!     SubdatasetReference::from_dataset_record(&result.dataset, "sub", DatasetType::Other)?;
//! let mut registry = SubdatasetRegistry::load(path)?;
//! if registry.reconcile(reference)?.changed() {
//!     registry.save(path)?;
//! }
//! ```

pub mod assemble;
pub mod crossref;
pub mod error;
pub mod fetch;
pub mod id;
pub mod loader;
pub mod normalize;
pub mod ontology;
pub mod record;
pub mod registry;
pub mod value;
pub mod vocab;

// Re-export main types for convenience
pub use crate::assemble::{
    assemble, dataset_record, to_json_string, AssembleOptions, AssembleResult, AssembleStats,
    IdentityPolicy,
};
pub use crate::error::CatalogError;
pub use crate::fetch::{
    CacheConfig, CachedFetcher, FetchResponse, Fetcher, HttpFetcher, NoOpFetcher,
};
pub use crate::id::{mint, IdScheme};
pub use crate::loader::{load_document, parse_document, DocumentSource};
pub use crate::ontology::{parcellation_repr, species_repr, OntologyClient, OntologyConfig};
pub use crate::registry::{
    reconcile, DatasetType, ReconcileOutcome, SubdatasetReference, SubdatasetRegistry,
};
