//! Controlled-vocabulary term enrichment
//!
//! Resolves coded terms like `UBERON:0013702` against an ontology
//! lookup service and reduces each response to a display
//! representation. A failed lookup only leaves a gap for that term.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::CatalogError;
use crate::fetch::{Fetcher, ACCEPT_JSON};
use crate::value::{as_list, insert_some, scalar_text};
use crate::vocab::{
    COMMON_NAME_SYNONYM_TYPE, EXACT_SYNONYM_SCOPE, OPENMINDS_SPECIES,
    OPENMINDS_UBERON_PARCELLATION,
};

/// Characters left unescaped in a path segment: alphanumerics and `-._~`
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Maps a successful lookup response and the original term to a representation
pub type Reducer = fn(&Value, &str) -> Value;

/// Location of the ontology lookup service
#[derive(Debug, Clone)]
pub struct OntologyConfig {
    /// Base of the ontologies API, without trailing slash
    pub api_base: String,
    /// Prefix turning `PREFIX_suffix` into a term IRI
    pub iri_prefix: String,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            api_base: "http://www.ebi.ac.uk/ols4/api/ontologies".to_string(),
            iri_prefix: "http://purl.obolibrary.org/obo/".to_string(),
        }
    }
}

impl OntologyConfig {
    /// Build the lookup URL for a coded term
    ///
    /// The ontology is the lowercased prefix before the first colon.
    /// The term IRI is the prefix joined with the term (colons replaced
    /// by underscores), percent-encoded twice as the service requires.
    pub fn term_url(&self, term: &str) -> Result<String, CatalogError> {
        let ontology = term.split(':').next().unwrap_or_default().to_lowercase();
        if ontology.is_empty() {
            return Err(CatalogError::MalformedInput(format!(
                "Term '{}' has no ontology prefix",
                term
            )));
        }

        let iri = Url::parse(&self.iri_prefix)?.join(&term.replace(':', "_"))?;
        let once = utf8_percent_encode(iri.as_str(), SEGMENT).to_string();
        let twice = utf8_percent_encode(&once, SEGMENT).to_string();

        Ok(format!(
            "{}/{}/terms/{}",
            self.api_base.trim_end_matches('/'),
            ontology,
            twice
        ))
    }
}

/// Client resolving terms through a fetcher
pub struct OntologyClient<'a> {
    fetcher: &'a dyn Fetcher,
    config: OntologyConfig,
}

impl<'a> OntologyClient<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, config: OntologyConfig) -> Self {
        Self { fetcher, config }
    }

    /// Look up a single term
    ///
    /// Returns the parsed response, or `None` (with a warning) if the
    /// lookup did not succeed.
    pub fn lookup(&self, term: &str) -> Option<Value> {
        match self.try_lookup(term) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Ontology lookup for {} failed: {}", term, e);
                None
            }
        }
    }

    fn try_lookup(&self, term: &str) -> Result<Value, CatalogError> {
        let url = self.config.term_url(term)?;
        debug!("Looking up {} at {}", term, url);

        let response = self.fetcher.get(&url, ACCEPT_JSON)?;
        if !response.is_success() {
            return Err(CatalogError::LookupFailure {
                url,
                reason: format!("returned {}", response.status),
            });
        }

        serde_json::from_str(&response.body).map_err(|e| CatalogError::LookupFailure {
            url,
            reason: format!("invalid JSON body: {}", e),
        })
    }

    /// Resolve each term of a raw value, keeping positions
    ///
    /// Every input term yields one entry, `None` where the lookup failed.
    pub fn enrich_terms(&self, terms: Option<&Value>, reducer: Reducer) -> Vec<Option<Value>> {
        as_list(terms)
            .into_iter()
            .map(|raw| {
                let term = scalar_text(raw)?;
                self.lookup(&term).map(|response| reducer(&response, &term))
            })
            .collect()
    }

    /// Resolve a term or list of terms to representations
    ///
    /// A single term gives a single representation, a list gives a
    /// list in input order with failed terms left out. Returns `None`
    /// when the input is absent or nothing resolved.
    pub fn enrich(&self, terms: Option<&Value>, reducer: Reducer) -> Option<Value> {
        reshape(terms, self.enrich_terms(terms, reducer))
    }
}

/// Give positional results the shape of the input terms
///
/// A list input stays a list (failed terms left out), anything else
/// yields its single result.
pub fn reshape(terms: Option<&Value>, resolved: Vec<Option<Value>>) -> Option<Value> {
    match terms {
        Some(Value::Array(_)) => {
            let list: Vec<Value> = resolved.into_iter().flatten().collect();
            if list.is_empty() {
                None
            } else {
                Some(Value::Array(list))
            }
        }
        _ => resolved.into_iter().next().flatten(),
    }
}

/// Reduce a taxonomy response to an openMINDS species
///
/// Picks up the common name from an exact synonym tagged as such.
pub fn species_repr(response: &Value, _term: &str) -> Value {
    let mut species = base_repr(OPENMINDS_SPECIES, response);

    let synonym = as_list(response.get("obo_synonym")).into_iter().find(|s| {
        s.get("scope").and_then(Value::as_str) == Some(EXACT_SYNONYM_SCOPE)
            && s.get("type").and_then(Value::as_str) == Some(COMMON_NAME_SYNONYM_TYPE)
    });
    if let Some(s) = synonym {
        insert_some(&mut species, "synonym", s.get("name").cloned());
    }

    Value::Object(species)
}

/// Reduce an anatomy response to an openMINDS UBERON parcellation
pub fn parcellation_repr(response: &Value, _term: &str) -> Value {
    Value::Object(base_repr(OPENMINDS_UBERON_PARCELLATION, response))
}

fn base_repr(type_iri: &str, response: &Value) -> Map<String, Value> {
    let mut repr = Map::new();
    repr.insert("@type".to_string(), json!(type_iri));
    insert_some(&mut repr, "name", response.get("label").cloned());
    insert_some(
        &mut repr,
        "preferredOntologyIdentifier",
        response.get("iri").cloned(),
    );
    repr
}
