use std::path::PathBuf;

use serde_json::Value;

use crate::error::CatalogError;

/// Source from which to load a linked-data document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Local JSON file
    File(PathBuf),
    /// Remote URL serving the document
    Url(String),
}

impl DocumentSource {
    /// Interpret a command-line argument as a file path or URL
    pub fn parse(source: &str) -> Self {
        if is_url(source) {
            DocumentSource::Url(source.to_string())
        } else {
            DocumentSource::File(PathBuf::from(source))
        }
    }

    /// Human-readable origin for error messages
    pub fn origin(&self) -> String {
        match self {
            DocumentSource::File(p) => p.display().to_string(),
            DocumentSource::Url(u) => u.clone(),
        }
    }
}

/// Check if a source string is a URL
fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Load and parse a document from any source
pub fn load_document(source: &DocumentSource) -> Result<Value, CatalogError> {
    let content = match source {
        DocumentSource::File(path) => read_file(path)?,
        DocumentSource::Url(url) => fetch_url(url)?,
    };
    parse_document(&content, &source.origin())
}

/// Parse document content
///
/// Accepts a JSON object, or a one-element array holding one.
pub fn parse_document(content: &str, origin: &str) -> Result<Value, CatalogError> {
    let value: Value = serde_json::from_str(content).map_err(|e| CatalogError::LoadError {
        path: origin.to_string(),
        reason: format!("Invalid JSON: {}", e),
    })?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Array(mut items) if items.len() == 1 && items[0].is_object() => Ok(items.remove(0)),
        _ => Err(CatalogError::MalformedInput(format!(
            "{} does not hold a single document object",
            origin
        ))),
    }
}

fn read_file(path: &PathBuf) -> Result<String, CatalogError> {
    if !path.is_file() {
        return Err(CatalogError::InvalidPath(path.clone()));
    }
    std::fs::read_to_string(path).map_err(|e| CatalogError::LoadError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Simple URL fetch
fn fetch_url(url: &str) -> Result<String, CatalogError> {
    let response = reqwest::blocking::get(url).map_err(|e| CatalogError::LoadError {
        path: url.to_string(),
        reason: format!("HTTP request failed: {}", e),
    })?;

    if !response.status().is_success() {
        return Err(CatalogError::LoadError {
            path: url.to_string(),
            reason: format!("Server returned {}", response.status()),
        });
    }

    response.text().map_err(|e| CatalogError::LoadError {
        path: url.to_string(),
        reason: format!("Failed to read response: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_parse() {
        assert_eq!(
            DocumentSource::parse("https://example.org/doc.json"),
            DocumentSource::Url("https://example.org/doc.json".to_string())
        );
        assert_eq!(
            DocumentSource::parse("inputs/doc.json"),
            DocumentSource::File(PathBuf::from("inputs/doc.json"))
        );
    }

    #[test]
    fn test_parse_document_shapes() {
        let obj = parse_document(r#"{"name": "x"}"#, "test").unwrap();
        assert_eq!(obj["name"], "x");

        let single = parse_document(r#"[{"name": "y"}]"#, "test").unwrap();
        assert_eq!(single["name"], "y");

        assert!(matches!(
            parse_document(r#"[{"name": "a"}, {"name": "b"}]"#, "test"),
            Err(CatalogError::MalformedInput(_))
        ));
        assert!(matches!(
            parse_document("not json", "test"),
            Err(CatalogError::LoadError { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        std::fs::write(&path, r#"{"name": "from-file"}"#).unwrap();

        let doc = load_document(&DocumentSource::File(path)).unwrap();
        assert_eq!(doc["name"], "from-file");
    }

    #[test]
    fn test_load_missing_file() {
        let source = DocumentSource::File(PathBuf::from("/nonexistent/dataset.json"));
        assert!(matches!(load_document(&source), Err(CatalogError::InvalidPath(_))));
    }
}
