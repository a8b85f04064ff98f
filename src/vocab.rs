//! Vocabulary definitions for catalog records
//!
//! IRIs and type tags attached to linked-data values, plus the fixed
//! context of the additional display block.

/// schema.org Person, assumed for every data controller
pub const SCHEMA_PERSON: &str = "https://schema.org/Person";

/// schema.org Thing, used for "used for" activities
pub const SCHEMA_THING: &str = "https://schema.org/Thing";

/// schema.org URL, used for homepages
pub const SCHEMA_URL: &str = "https://schema.org/URL";

/// openMINDS species type for organism samples
pub const OPENMINDS_SPECIES: &str = "https://openminds.ebrains.eu/controlledTerms/Species";

/// openMINDS parcellation type for organism part samples
pub const OPENMINDS_UBERON_PARCELLATION: &str =
    "https://openminds.ebrains.eu/controlledTerms/UBERONParcellation";

/// Identifier scheme name folded in from an `orcid` key
pub const ORCID_SCHEME: &str = "ORCID";

/// Synonym scope and type marking a species' common name in ontology responses
pub const EXACT_SYNONYM_SCOPE: &str = "hasExactSynonym";
pub const COMMON_NAME_SYNONYM_TYPE: &str = "genbank common name";

/// Keys of the additional display content block
pub const DISPLAY_HOMEPAGE: &str = "homepage";
pub const DISPLAY_DATA_CONTROLLER: &str = "data controller";
pub const DISPLAY_SAMPLE_ORGANISM: &str = "sample (organism)";
pub const DISPLAY_SAMPLE_PART: &str = "sample (organism part)";
pub const DISPLAY_USED_FOR: &str = "used for";

/// Catalog item types
pub const ITEM_DATASET: &str = "dataset";
pub const ITEM_FILE: &str = "file";

/// Context of the additional display block
///
/// Provided explicitly so the catalog can render IRIs as links
/// without expanding the record itself.
pub fn display_context() -> serde_json::Value {
    serde_json::json!({
        DISPLAY_HOMEPAGE: "https://schema.org/mainEntityOfPage",
        DISPLAY_DATA_CONTROLLER: "https://w3id.org/dpv#hasDataController",
        DISPLAY_SAMPLE_ORGANISM: OPENMINDS_SPECIES,
        DISPLAY_SAMPLE_PART: OPENMINDS_UBERON_PARCELLATION,
        DISPLAY_USED_FOR: "http://www.w3.org/ns/prov#hadUsage",
    })
}
