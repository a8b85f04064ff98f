//! DOI lookup for publications
//!
//! Completes publication entries from the Crossref works API.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::CatalogError;
use crate::fetch::{Fetcher, ACCEPT_JSON};
use crate::normalize::orcid_identifiers;
use crate::value::{as_list, insert_some, scalar_text};

/// Location of the Crossref works API
#[derive(Debug, Clone)]
pub struct CrossrefConfig {
    pub api_base: String,
    /// Contact address sent along for the polite pool
    pub mailto: Option<String>,
}

impl Default for CrossrefConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.crossref.org/works".to_string(),
            mailto: None,
        }
    }
}

/// Get the id part of a DOI
///
/// "https://doi.org/10.1000/xyz" -> "10.1000/xyz"
/// "doi:10.1000/xyz" -> "10.1000/xyz"
/// "10.1000/xyz" -> "10.1000/xyz"
pub fn doi_id(doi: &str) -> String {
    let doi = doi.trim();
    if doi.to_lowercase().starts_with("http") {
        if let Ok(parsed) = Url::parse(doi) {
            return parsed.path().trim_start_matches('/').to_string();
        }
    }
    if let Some(rest) = doi
        .get(..4)
        .filter(|prefix| prefix.eq_ignore_ascii_case("doi:"))
        .and_then(|_| doi.get(4..))
    {
        return rest.to_string();
    }
    doi.to_string()
}

/// Client for publication metadata
pub struct CrossrefClient<'a> {
    fetcher: &'a dyn Fetcher,
    config: CrossrefConfig,
}

impl<'a> CrossrefClient<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, config: CrossrefConfig) -> Self {
        Self { fetcher, config }
    }

    /// Build the works URL for a DOI
    pub fn work_url(&self, doi: &str) -> Result<String, CatalogError> {
        let mut url = Url::parse(&format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            doi_id(doi)
        ))?;
        if let Some(mailto) = &self.config.mailto {
            url.query_pairs_mut().append_pair("mailto", mailto);
        }
        Ok(url.into())
    }

    /// Look up a DOI, returning a catalog publication or `None`
    pub fn lookup(&self, doi: &str) -> Option<Value> {
        match self.try_lookup(doi) {
            Ok(publication) => Some(publication),
            Err(e) => {
                warn!("Crossref lookup for {} failed: {}", doi, e);
                None
            }
        }
    }

    fn try_lookup(&self, doi: &str) -> Result<Value, CatalogError> {
        let url = self.work_url(doi)?;
        debug!("Looking up DOI {} at {}", doi, url);

        let response = self.fetcher.get(&url, ACCEPT_JSON)?;
        if !response.is_success() {
            return Err(CatalogError::LookupFailure {
                url,
                reason: format!("returned {}", response.status),
            });
        }

        let body: Value =
            serde_json::from_str(&response.body).map_err(|e| CatalogError::LookupFailure {
                url: url.clone(),
                reason: format!("invalid JSON body: {}", e),
            })?;

        body.get("message")
            .map(publication_from_work)
            .ok_or_else(|| CatalogError::LookupFailure {
                url,
                reason: "response has no message".to_string(),
            })
    }

    /// Fill missing fields of a publication from its DOI
    ///
    /// Keys already on the publication win. An empty author list (left
    /// by a citation-only entry) is replaced by the looked-up authors.
    pub fn complete(&self, publication: &Value) -> Value {
        let mut entry = match publication.as_object() {
            Some(obj) => obj.clone(),
            None => return publication.clone(),
        };
        let doi = match entry.get("doi").and_then(scalar_text) {
            Some(doi) => doi,
            None => return publication.clone(),
        };
        let found = match self.lookup(&doi) {
            Some(Value::Object(found)) => found,
            _ => return publication.clone(),
        };

        let authors_empty = entry
            .get("authors")
            .and_then(Value::as_array)
            .map(|a| a.is_empty())
            .unwrap_or(false);
        if authors_empty {
            entry.remove("authors");
        }

        for (key, value) in found {
            entry.entry(key).or_insert(value);
        }
        Value::Object(entry)
    }
}

/// Map a Crossref work message to a catalog publication
pub fn publication_from_work(message: &Value) -> Value {
    let mut publication = Map::new();
    insert_some(&mut publication, "type", message.get("type").cloned());
    insert_some(&mut publication, "title", first(message.get("title")));
    insert_some(&mut publication, "doi", message.get("DOI").cloned());
    insert_some(
        &mut publication,
        "datePublished",
        message.pointer("/issued/date-parts/0/0").cloned(),
    );
    insert_some(
        &mut publication,
        "publicationOutlet",
        first(message.get("container-title")),
    );

    let authors: Vec<Value> = as_list(message.get("author"))
        .into_iter()
        .filter_map(Value::as_object)
        .map(crossref_author)
        .collect();
    publication.insert("authors".to_string(), json!(authors));

    Value::Object(publication)
}

fn first(value: Option<&Value>) -> Option<Value> {
    as_list(value).into_iter().next().cloned()
}

/// Map a Crossref author to a catalog author
fn crossref_author(author: &Map<String, Value>) -> Value {
    let mut entry = Map::new();
    for (from, to) in [("given", "givenName"), ("family", "familyName"), ("name", "name")] {
        insert_some(&mut entry, to, author.get(from).cloned());
    }
    if let Some(orcid) = author.get("ORCID").and_then(scalar_text) {
        entry.insert("identifiers".to_string(), orcid_identifiers(&orcid));
    }
    Value::Object(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;

    const WORK_URL: &str = "https://api.crossref.org/works/10.1000/xyz";

    fn work_body() -> String {
        json!({
            "status": "ok",
            "message": {
                "type": "journal-article",
                "title": ["A study of things"],
                "DOI": "10.1000/xyz",
                "issued": {"date-parts": [[2021, 3, 4]]},
                "container-title": ["Journal of Stuff"],
                "author": [
                    {
                        "given": "Jane",
                        "family": "Doe",
                        "ORCID": "https://orcid.org/0000-0001-2345-6789",
                        "sequence": "first"
                    },
                    {"name": "The Consortium"}
                ]
            }
        })
        .to_string()
    }

    #[test]
    fn test_doi_id() {
        assert_eq!(doi_id("https://doi.org/10.1000/xyz"), "10.1000/xyz");
        assert_eq!(doi_id("DOI:10.1000/xyz"), "10.1000/xyz");
        assert_eq!(doi_id("10.1000/xyz"), "10.1000/xyz");
    }

    #[test]
    fn test_work_url_with_mailto() {
        let fetcher = StaticFetcher::new();
        let client = CrossrefClient::new(
            &fetcher,
            CrossrefConfig {
                mailto: Some("someone@example.org".to_string()),
                ..CrossrefConfig::default()
            },
        );
        assert_eq!(
            client.work_url("doi:10.1000/xyz").unwrap(),
            "https://api.crossref.org/works/10.1000/xyz?mailto=someone%40example.org"
        );

        let tagged = CrossrefClient::new(
            &fetcher,
            CrossrefConfig {
                mailto: Some("a+b&c@example.org".to_string()),
                ..CrossrefConfig::default()
            },
        );
        let url = Url::parse(&tagged.work_url("10.1000/xyz").unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("mailto".to_string(), "a+b&c@example.org".to_string())]);
    }

    #[test]
    fn test_lookup() {
        let fetcher = StaticFetcher::new().with(WORK_URL, 200, &work_body());
        let client = CrossrefClient::new(&fetcher, CrossrefConfig::default());

        let publication = client.lookup("https://doi.org/10.1000/xyz").unwrap();
        assert_eq!(
            publication,
            json!({
                "type": "journal-article",
                "title": "A study of things",
                "doi": "10.1000/xyz",
                "datePublished": 2021,
                "publicationOutlet": "Journal of Stuff",
                "authors": [
                    {
                        "givenName": "Jane",
                        "familyName": "Doe",
                        "identifiers": [{
                            "name": "ORCID",
                            "identifier": "https://orcid.org/0000-0001-2345-6789"
                        }]
                    },
                    {"name": "The Consortium"}
                ]
            })
        );
    }

    #[test]
    fn test_complete_keeps_existing_keys() {
        let fetcher = StaticFetcher::new().with(WORK_URL, 200, &work_body());
        let client = CrossrefClient::new(&fetcher, CrossrefConfig::default());

        let citation_only = json!({
            "title": "Doe J. (2021) A study",
            "authors": [],
            "doi": "10.1000/xyz"
        });
        let completed = client.complete(&citation_only);
        assert_eq!(completed["title"], "Doe J. (2021) A study");
        assert_eq!(completed["publicationOutlet"], "Journal of Stuff");
        assert_eq!(completed["authors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_complete_without_doi_or_on_failure() {
        let fetcher = StaticFetcher::new();
        let client = CrossrefClient::new(&fetcher, CrossrefConfig::default());

        let no_doi = json!({"title": "X"});
        assert_eq!(client.complete(&no_doi), no_doi);
        assert_eq!(fetcher.calls(), 0);

        let unknown = json!({"title": "Y", "doi": "10.1000/unknown"});
        assert_eq!(client.complete(&unknown), unknown);
        assert_eq!(fetcher.calls(), 1);
    }
}
