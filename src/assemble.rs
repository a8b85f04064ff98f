//! Record assembly
//!
//! Builds the dataset-level record and the file-level records for one
//! parsed linked-data document.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::crossref::{CrossrefClient, CrossrefConfig};
use crate::error::CatalogError;
use crate::fetch::Fetcher;
use crate::id::{mint, IdScheme};
use crate::normalize::{
    normalize_access_request_contact, normalize_authors, normalize_data_controller,
    normalize_file, normalize_funding, normalize_homepage, normalize_keywords,
    normalize_license, normalize_publications, normalize_subdatasets, normalize_used_for,
};
use crate::ontology::{
    parcellation_repr, reshape, species_repr, OntologyClient, OntologyConfig, Reducer,
};
use crate::record::{ItemType, RecordTemplate};
use crate::value::{as_list, collapse, field_text, insert_some, unwrap_typed};
use crate::vocab::{
    display_context, DISPLAY_DATA_CONTROLLER, DISPLAY_HOMEPAGE, DISPLAY_SAMPLE_ORGANISM,
    DISPLAY_SAMPLE_PART, DISPLAY_USED_FOR, ITEM_DATASET,
};

/// Version used when a document does not declare one
pub const DEFAULT_VERSION: &str = "latest";

/// Options for record assembly
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Name of the metadata source reported on every record
    pub source_name: String,
    /// Version of the metadata source reported on every record
    pub source_version: String,
    /// Scheme used when minting identifiers from names
    pub id_scheme: IdScheme,
    /// Title of the additional display tab
    pub display_name: String,
    /// Icon of the additional display tab
    pub display_icon: String,
    /// Resolve sample terms against the ontology service
    pub enrich_terms: bool,
    /// Complete publications carrying a DOI from Crossref
    pub resolve_dois: bool,
    pub ontology: OntologyConfig,
    pub crossref: CrossrefConfig,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            source_name: "tabby".to_string(),
            source_version: "0.1.0".to_string(),
            id_scheme: IdScheme::default(),
            display_name: "ABCD-J".to_string(),
            display_icon: "fa-solid fa-graduation-cap".to_string(),
            enrich_terms: true,
            resolve_dois: false,
            ontology: OntologyConfig::default(),
            crossref: CrossrefConfig::default(),
        }
    }
}

/// Where `dataset_id` and `dataset_version` come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Mint the id from the document's name
    MintFromName,
    /// Use the document's name as the id
    UseNameDirectly,
    /// Use an identity supplied from outside (e.g. version control)
    External {
        dataset_id: String,
        dataset_version: String,
    },
}

/// Result of assembling one document
#[derive(Debug)]
pub struct AssembleResult {
    /// The dataset-level record
    pub dataset: Value,
    /// One record per file in the document's file list
    pub files: Vec<Value>,
    /// Statistics about the assembly
    pub stats: AssembleStats,
}

/// Statistics from assembly
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AssembleStats {
    /// Number of file records produced
    pub files: usize,
    /// Number of ontology terms resolved
    pub enriched_terms: usize,
    /// Number of ontology terms whose lookup failed
    pub failed_lookups: usize,
}

impl AssembleResult {
    /// All records, dataset first
    pub fn records(&self) -> Vec<Value> {
        std::iter::once(self.dataset.clone())
            .chain(self.files.iter().cloned())
            .collect()
    }
}

/// Assemble catalog records from a parsed document
pub fn assemble(
    document: &Value,
    policy: &IdentityPolicy,
    fetcher: &dyn Fetcher,
    options: &AssembleOptions,
) -> Result<AssembleResult, CatalogError> {
    let doc = document.as_object().ok_or_else(|| {
        CatalogError::MalformedInput("Document must be a JSON object".to_string())
    })?;
    let mut stats = AssembleStats::default();

    let (dataset_id, dataset_version) = resolve_identity(doc, policy, &options.id_scheme)?;
    let template = RecordTemplate {
        item_type: ItemType::Dataset,
        dataset_id,
        dataset_version,
        source_name: options.source_name.clone(),
        source_version: options.source_version.clone(),
    };

    let mut publications = normalize_publications(doc.get("publications"));
    if options.resolve_dois {
        let crossref = CrossrefClient::new(fetcher, options.crossref.clone());
        publications = publications.map(|p| {
            Value::Array(as_list(Some(&p)).into_iter().map(|e| crossref.complete(e)).collect())
        });
    }

    let additional_display = additional_display(doc, fetcher, options, &mut stats);

    let dataset = template
        .builder()
        .field("name", Some(text_or_empty(doc, "title")))
        .field("description", Some(text_or_empty(doc, "description")))
        .field("doi", Some(text_or_empty(doc, "doi")))
        .field("license", normalize_license(doc.get("license")))
        .field("authors", normalize_authors(doc.get("authors")))
        .field("keywords", normalize_keywords(doc.get("keywords")))
        .field("funding", normalize_funding(doc.get("funding")))
        .field("publications", publications)
        .field(
            "access_request_contact",
            normalize_access_request_contact(doc.get("dataController")),
        )
        .field("subdatasets", Some(normalize_subdatasets(doc.get("subdatasets"))))
        .field("url", homepage_url(doc.get("homepage")))
        .field("additional_display", Some(additional_display))
        .build();

    let file_template = template.for_item(ItemType::File);
    let mut files = Vec::new();
    for entry in as_list(doc.get("fileList")) {
        let fields = normalize_file(entry)?;
        files.push(file_template.builder().fields(fields).build());
    }
    stats.files = files.len();

    info!(
        "Assembled dataset {}@{} with {} file records",
        template.dataset_id, template.dataset_version, stats.files
    );

    Ok(AssembleResult {
        dataset,
        files,
        stats,
    })
}

/// Determine dataset id and version according to the policy
fn resolve_identity(
    doc: &Map<String, Value>,
    policy: &IdentityPolicy,
    scheme: &IdScheme,
) -> Result<(String, String), CatalogError> {
    let declared_version =
        || field_text(doc, "version").unwrap_or_else(|| DEFAULT_VERSION.to_string());
    let declared_name = || {
        field_text(doc, "name")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| CatalogError::MalformedInput("Document has no name".to_string()))
    };

    match policy {
        IdentityPolicy::MintFromName => {
            let name = declared_name()?;
            let id = mint(&name, scheme)?;
            debug!("Minted {} from name '{}'", id, name);
            Ok((id.to_string(), declared_version()))
        }
        IdentityPolicy::UseNameDirectly => Ok((declared_name()?, declared_version())),
        IdentityPolicy::External {
            dataset_id,
            dataset_version,
        } => {
            if dataset_id.is_empty() || dataset_version.is_empty() {
                return Err(CatalogError::MalformedInput(
                    "External identity needs both an id and a version".to_string(),
                ));
            }
            Ok((dataset_id.clone(), dataset_version.clone()))
        }
    }
}

/// Build the additional display block
fn additional_display(
    doc: &Map<String, Value>,
    fetcher: &dyn Fetcher,
    options: &AssembleOptions,
    stats: &mut AssembleStats,
) -> Value {
    let mut content = Map::new();
    content.insert("@context".to_string(), display_context());

    if options.enrich_terms {
        let client = OntologyClient::new(fetcher, options.ontology.clone());
        let samples: [(&str, &str, Reducer); 2] = [
            (DISPLAY_SAMPLE_ORGANISM, "sampleOrganism", species_repr),
            (DISPLAY_SAMPLE_PART, "samplePart", parcellation_repr),
        ];
        for (key, field, reducer) in samples {
            let terms = doc.get(field);
            let resolved = client.enrich_terms(terms, reducer);
            stats.enriched_terms += resolved.iter().filter(|r| r.is_some()).count();
            stats.failed_lookups += resolved.iter().filter(|r| r.is_none()).count();
            insert_some(&mut content, key, reshape(terms, resolved));
        }
    }

    insert_some(&mut content, DISPLAY_HOMEPAGE, normalize_homepage(doc.get("homepage")));
    insert_some(
        &mut content,
        DISPLAY_DATA_CONTROLLER,
        normalize_data_controller(doc.get("dataController")),
    );
    insert_some(&mut content, DISPLAY_USED_FOR, normalize_used_for(doc.get("usedFor")));

    let mut tab = Map::new();
    tab.insert("name".to_string(), Value::from(options.display_name.as_str()));
    tab.insert("icon".to_string(), Value::from(options.display_icon.as_str()));
    tab.insert("content".to_string(), Value::Object(content));
    Value::Array(vec![Value::Object(tab)])
}

/// The record's `url`: homepage URL(s) as given
fn homepage_url(raw: Option<&Value>) -> Option<Value> {
    collapse(
        as_list(raw)
            .into_iter()
            .map(|v| unwrap_typed(v).clone())
            .collect(),
    )
}

fn text_or_empty(doc: &Map<String, Value>, key: &str) -> Value {
    Value::String(field_text(doc, key).unwrap_or_default())
}

/// Pick the single dataset record out of a record list
pub fn dataset_record(records: &[Value]) -> Result<&Value, CatalogError> {
    let mut datasets = records
        .iter()
        .filter(|r| r.get("type").and_then(Value::as_str) == Some(ITEM_DATASET));

    match (datasets.next(), datasets.next()) {
        (Some(record), None) => Ok(record),
        (None, _) => Err(CatalogError::MalformedInput(
            "No dataset record found".to_string(),
        )),
        (Some(_), Some(_)) => Err(CatalogError::MalformedInput(
            "More than one dataset record found".to_string(),
        )),
    }
}

/// Serialize records (dataset first) to a JSON string
pub fn to_json_string(result: &AssembleResult, pretty: bool) -> Result<String, CatalogError> {
    let records = Value::Array(result.records());
    if pretty {
        Ok(serde_json::to_string_pretty(&records)?)
    } else {
        Ok(serde_json::to_string(&records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;
    use crate::fetch::NoOpFetcher;
    use crate::vocab::{OPENMINDS_SPECIES, SCHEMA_PERSON};
    use serde_json::json;

    const HUMAN_URL: &str = concat!(
        "http://www.ebi.ac.uk/ols4/api/ontologies/ncbitaxon/terms/",
        "http%253A%252F%252Fpurl.obolibrary.org%252Fobo%252FNCBITaxon_9606"
    );

    fn sample_document() -> Value {
        json!({
            "name": "my-dataset",
            "title": "My Dataset",
            "description": "A dataset about things",
            "license": "https://creativecommons.org/licenses/by/4.0/",
            "authors": [{"@type": "Person", "name": "Jane Doe", "orcid": "0000-0001-2345-6789"}],
            "keywords": "genomics",
            "funding": {"name": "DFG", "identifier": "123"},
            "publications": {"citation": "Doe J. (2021) A study"},
            "dataController": {"name": "Jane van Doe", "email": "jane@example.org"},
            "homepage": "https://example.org/my-dataset",
            "sampleOrganism": "NCBITaxon:9606",
            "usedFor": {"title": "Project A", "description": ["One.", "Two."]},
            "fileList": [
                {"path": {"@value": "a/b.txt"}, "contentbytesize": {"@value": "120"}},
                {"name": {"@value": "c.csv"}, "url": "https://example.org/c.csv"}
            ]
        })
    }

    fn human_fetcher() -> StaticFetcher {
        StaticFetcher::new().with(
            HUMAN_URL,
            200,
            &json!({
                "label": "Homo sapiens",
                "iri": "http://purl.obolibrary.org/obo/NCBITaxon_9606"
            })
            .to_string(),
        )
    }

    #[test]
    fn test_assemble_dataset_record() {
        let fetcher = human_fetcher();
        let result = assemble(
            &sample_document(),
            &IdentityPolicy::MintFromName,
            &fetcher,
            &AssembleOptions::default(),
        )
        .unwrap();

        let ds = &result.dataset;
        assert_eq!(ds["type"], "dataset");
        assert_eq!(ds["dataset_id"], "414d719f-7f0f-5bd8-95c8-3f7b26f21005");
        assert_eq!(ds["dataset_version"], "latest");
        assert_eq!(ds["source_name"], "tabby");
        assert_eq!(ds["source_version"], "0.1.0");
        assert_eq!(ds["name"], "My Dataset");
        assert_eq!(ds["doi"], "");
        assert_eq!(ds["keywords"], json!(["genomics"]));
        assert_eq!(ds["funding"], json!([{"name": "DFG", "identifier": "123"}]));
        assert_eq!(ds["publications"], json!([{"title": "Doe J. (2021) A study", "authors": []}]));
        assert_eq!(
            ds["access_request_contact"],
            json!({"givenName": "Jane van", "familyName": "Doe", "email": "jane@example.org"})
        );
        assert_eq!(ds["authors"][0]["identifiers"][0]["identifier"], "0000-0001-2345-6789");
        assert_eq!(ds["subdatasets"], json!([]));
        assert_eq!(ds["url"], "https://example.org/my-dataset");

        let content = &ds["additional_display"][0]["content"];
        assert_eq!(ds["additional_display"][0]["name"], "ABCD-J");
        assert!(content.get("@context").is_some());
        assert_eq!(content["sample (organism)"]["@type"], OPENMINDS_SPECIES);
        assert!(content.get("sample (organism part)").is_none());
        assert_eq!(content["data controller"]["@type"], SCHEMA_PERSON);
        assert_eq!(content["used for"]["description"], "One.\n\nTwo.");

        assert_eq!(result.stats.enriched_terms, 1);
        assert_eq!(result.stats.failed_lookups, 0);
    }

    #[test]
    fn test_assemble_file_records() {
        let result = assemble(
            &sample_document(),
            &IdentityPolicy::UseNameDirectly,
            &NoOpFetcher,
            &AssembleOptions::default(),
        )
        .unwrap();

        assert_eq!(result.files.len(), 2);
        assert_eq!(
            result.files[0],
            json!({
                "type": "file",
                "dataset_id": "my-dataset",
                "dataset_version": "latest",
                "source_name": "tabby",
                "source_version": "0.1.0",
                "path": "a/b.txt",
                "contentbytesize": 120
            })
        );
        assert_eq!(result.files[1]["path"], "c.csv");
        assert_eq!(result.files[1]["url"], "https://example.org/c.csv");
        assert_eq!(result.records().len(), 3);
    }

    #[test]
    fn test_single_file_entry() {
        let mut doc = sample_document();
        doc["fileList"] = json!({"path": "only.txt"});
        let result = assemble(
            &doc,
            &IdentityPolicy::UseNameDirectly,
            &NoOpFetcher,
            &AssembleOptions::default(),
        )
        .unwrap();
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0]["path"], "only.txt");
    }

    #[test]
    fn test_failed_enrichment_is_not_fatal() {
        let result = assemble(
            &sample_document(),
            &IdentityPolicy::UseNameDirectly,
            &NoOpFetcher,
            &AssembleOptions::default(),
        )
        .unwrap();
        let content = &result.dataset["additional_display"][0]["content"];
        assert!(content.get("sample (organism)").is_none());
        assert_eq!(result.stats.failed_lookups, 1);
    }

    #[test]
    fn test_no_null_keys() {
        let doc = json!({"name": "bare"});
        let result = assemble(
            &doc,
            &IdentityPolicy::UseNameDirectly,
            &NoOpFetcher,
            &AssembleOptions::default(),
        )
        .unwrap();
        let ds = result.dataset.as_object().unwrap();
        assert!(ds.values().all(|v| !v.is_null()));
        assert!(!ds.contains_key("license"));
        assert!(!ds.contains_key("authors"));
        assert!(!ds.contains_key("url"));
        assert_eq!(ds["subdatasets"], json!([]));
        assert!(result.files.is_empty());
    }

    #[test]
    fn test_external_identity() {
        let policy = IdentityPolicy::External {
            dataset_id: "ds-123".to_string(),
            dataset_version: "abc123".to_string(),
        };
        let result =
            assemble(&sample_document(), &policy, &NoOpFetcher, &AssembleOptions::default())
                .unwrap();
        assert_eq!(result.dataset["dataset_id"], "ds-123");
        assert_eq!(result.files[0]["dataset_version"], "abc123");
    }

    #[test]
    fn test_declared_version() {
        let mut doc = sample_document();
        doc["version"] = json!("1.2.0");
        let result = assemble(
            &doc,
            &IdentityPolicy::UseNameDirectly,
            &NoOpFetcher,
            &AssembleOptions::default(),
        )
        .unwrap();
        assert_eq!(result.dataset["dataset_version"], "1.2.0");
    }

    #[test]
    fn test_missing_name() {
        let doc = json!({"title": "No name"});
        let err = assemble(
            &doc,
            &IdentityPolicy::MintFromName,
            &NoOpFetcher,
            &AssembleOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::MalformedInput(_)));
    }

    #[test]
    fn test_bad_bytesize_aborts() {
        let mut doc = sample_document();
        doc["fileList"] = json!([{"path": "x", "contentbytesize": "many"}]);
        let err = assemble(
            &doc,
            &IdentityPolicy::UseNameDirectly,
            &NoOpFetcher,
            &AssembleOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::TypeCoercionFailure { .. }));
    }

    #[test]
    fn test_enrichment_disabled() {
        let fetcher = human_fetcher();
        let options = AssembleOptions {
            enrich_terms: false,
            ..AssembleOptions::default()
        };
        let result = assemble(
            &sample_document(),
            &IdentityPolicy::UseNameDirectly,
            &fetcher,
            &options,
        )
        .unwrap();
        assert_eq!(fetcher.calls(), 0);
        assert!(result.dataset["additional_display"][0]["content"]
            .get("sample (organism)")
            .is_none());
    }

    #[test]
    fn test_dataset_record() {
        let records = vec![json!({"type": "dataset", "dataset_id": "a"}), json!({"type": "file"})];
        assert_eq!(dataset_record(&records).unwrap()["dataset_id"], "a");

        let none = vec![json!({"type": "file"})];
        assert!(dataset_record(&none).is_err());

        let two = vec![json!({"type": "dataset"}), json!({"type": "dataset"})];
        assert!(dataset_record(&two).is_err());
    }

    #[test]
    fn test_to_json_string() {
        let result = assemble(
            &json!({"name": "x"}),
            &IdentityPolicy::UseNameDirectly,
            &NoOpFetcher,
            &AssembleOptions::default(),
        )
        .unwrap();
        let s = to_json_string(&result, false).unwrap();
        let parsed: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert_eq!(parsed[0]["dataset_id"], "x");
    }
}
