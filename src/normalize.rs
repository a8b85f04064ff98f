//! Field normalizers
//!
//! Each normalizer projects one loosely-shaped linked-data field onto
//! the catalog schema. Missing or differently-shaped input is never an
//! error; normalizers return `None` when there is nothing to emit.

use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;

use crate::error::CatalogError;
use crate::value::{
    as_list, collapse, field_text, insert_some, scalar_text, strip_nulls, unwrap_typed,
};
use crate::vocab::{ORCID_SCHEME, SCHEMA_PERSON, SCHEMA_THING, SCHEMA_URL};

/// Author keys the catalog schema accepts
const AUTHOR_KEYS: [&str; 6] = [
    "name",
    "email",
    "identifiers",
    "givenName",
    "familyName",
    "honorificSuffix",
];

/// Convert author(s) to a list of catalog authors
///
/// Unknown keys (like `@type`) are dropped and an `orcid` is folded
/// into `identifiers`. A bare scalar is taken as the author's name.
pub fn normalize_authors(raw: Option<&Value>) -> Option<Value> {
    if is_absent(raw) {
        return None;
    }

    let authors = as_list(raw)
        .into_iter()
        .map(|author| match author.as_object() {
            Some(obj) => author_entry(obj),
            None => {
                let mut entry = Map::new();
                insert_some(&mut entry, "name", scalar_text(author).map(Value::String));
                Value::Object(entry)
            }
        })
        .collect();

    Some(Value::Array(authors))
}

/// Project one author object onto the catalog author keys
pub fn author_entry(obj: &Map<String, Value>) -> Value {
    let mut entry = Map::new();
    for key in AUTHOR_KEYS {
        if let Some(value) = obj.get(key) {
            insert_some(&mut entry, key, Some(unwrap_typed(value).clone()));
        }
    }

    if let Some(orcid) = field_text(obj, "orcid").filter(|o| !o.is_empty()) {
        entry.insert("identifiers".to_string(), orcid_identifiers(&orcid));
    }

    Value::Object(entry)
}

/// Identifier list holding a single ORCID
pub fn orcid_identifiers(orcid: &str) -> Value {
    json!([{"name": ORCID_SCHEME, "identifier": orcid}])
}

/// Convert a license to a catalog license object
///
/// The value is expected to be a URL and serves as both name and url;
/// no title lookup is done.
pub fn normalize_license(raw: Option<&Value>) -> Option<Value> {
    let license = as_list(raw).into_iter().find_map(scalar_text)?;

    if Url::parse(&license).is_err() {
        debug!("License '{}' does not look like a URL", license);
    }

    Some(json!({"name": license, "url": license}))
}

/// Ensure keywords are a list
pub fn normalize_keywords(raw: Option<&Value>) -> Option<Value> {
    if is_absent(raw) {
        return None;
    }
    let keywords = as_list(raw)
        .into_iter()
        .map(|k| unwrap_typed(k).clone())
        .collect();
    Some(Value::Array(keywords))
}

/// Ensure funding is a list of funding objects
///
/// A bare scalar is taken as the funder's name.
pub fn normalize_funding(raw: Option<&Value>) -> Option<Value> {
    if is_absent(raw) {
        return None;
    }
    let funding = as_list(raw)
        .into_iter()
        .filter_map(|f| match f {
            Value::Object(obj) => Some(without_nulls(obj)),
            other => scalar_text(other).map(|name| json!({"name": name})),
        })
        .collect();
    Some(Value::Array(funding))
}

/// Convert publication(s) to catalog publications
///
/// A free-text `citation` becomes the `title`, and `authors` is forced
/// to an empty list since nothing structured can be derived from it.
pub fn normalize_publications(raw: Option<&Value>) -> Option<Value> {
    if is_absent(raw) {
        return None;
    }

    let publications = as_list(raw)
        .into_iter()
        .map(|publication| {
            let mut entry = match publication {
                Value::Object(obj) => {
                    let mut entry = obj.clone();
                    strip_nulls(&mut entry);
                    entry
                }
                other => {
                    let mut m = Map::new();
                    m.insert("citation".to_string(), other.clone());
                    m
                }
            };

            if let Some(citation) = entry.remove("citation").filter(|c| !c.is_null()) {
                entry.insert("title".to_string(), unwrap_typed(&citation).clone());
                entry.insert("authors".to_string(), json!([]));
            }
            Value::Object(entry)
        })
        .collect();

    Some(Value::Array(publications))
}

/// Convert the data controller to an access request contact
///
/// Only the first controller is used. Its name is split on the last
/// space: "Jane van Doe" yields givenName "Jane van" and familyName
/// "Doe", a single word ends up entirely in familyName. Downstream
/// consumers rely on this split, so it stays naive.
pub fn normalize_access_request_contact(raw: Option<&Value>) -> Option<Value> {
    let controller = as_list(raw).into_iter().next()?;

    let (name, email) = match controller.as_object() {
        Some(obj) => (
            field_text(obj, "name").unwrap_or_default(),
            field_text(obj, "email").unwrap_or_default(),
        ),
        None => (scalar_text(controller).unwrap_or_default(), String::new()),
    };

    let (given, family) = split_name(&name);
    Some(json!({"givenName": given, "familyName": family, "email": email}))
}

/// Split a full name on its last space
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind(' ') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => ("", name),
    }
}

/// Tag data controller(s) as persons for linked-data consumers
pub fn normalize_data_controller(raw: Option<&Value>) -> Option<Value> {
    let controllers = as_list(raw)
        .into_iter()
        .filter_map(|dc| match dc {
            Value::Object(obj) => {
                let mut tagged = Map::new();
                tagged.insert("@type".to_string(), json!(SCHEMA_PERSON));
                for (key, value) in obj {
                    insert_some(&mut tagged, key, Some(value.clone()));
                }
                Some(Value::Object(tagged))
            }
            Value::Array(_) => normalize_data_controller(Some(dc)),
            other => scalar_text(other).map(|name| json!({"@type": SCHEMA_PERSON, "name": name})),
        })
        .collect();

    collapse(controllers)
}

/// Convert "used for" activities to schema.org Things
///
/// Multi-paragraph descriptions (given as a list) are joined with a
/// blank line.
pub fn normalize_used_for(raw: Option<&Value>) -> Option<Value> {
    let things = as_list(raw)
        .into_iter()
        .filter_map(Value::as_object)
        .map(|activity| {
            let mut thing = Map::new();
            thing.insert("@type".to_string(), json!(SCHEMA_THING));
            thing.insert(
                "name".to_string(),
                json!(field_text(activity, "title").unwrap_or_default()),
            );

            if let Some(url) = field_text(activity, "url").filter(|u| !u.is_empty()) {
                thing.insert("url".to_string(), json!(url));
            }

            let paragraphs: Vec<String> = as_list(activity.get("description"))
                .into_iter()
                .filter_map(scalar_text)
                .collect();
            let description = paragraphs.join("\n\n");
            if !description.is_empty() {
                thing.insert("description".to_string(), json!(description));
            }

            Value::Object(thing)
        })
        .collect();

    collapse(things)
}

/// Convert one file entry to catalog file fields
///
/// Returns `path`, `contentbytesize` and `url` where present; `path`
/// falls back to `name` when the entry was expanded under that key.
/// Several URLs stay a list.
/// The record template fields are not included.
pub fn normalize_file(raw: &Value) -> Result<Map<String, Value>, CatalogError> {
    let mut file = Map::new();
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => {
            insert_some(&mut file, "path", scalar_text(raw).map(Value::String));
            return Ok(file);
        }
    };

    let path = field_text(obj, "path").or_else(|| field_text(obj, "name"));
    insert_some(&mut file, "path", path.map(Value::String));

    if let Some(size) = obj.get("contentbytesize") {
        insert_some(&mut file, "contentbytesize", coerce_bytesize(size)?.map(Value::from));
    }

    let urls = as_list(obj.get("url")).into_iter().filter_map(scalar_text).map(Value::String);
    insert_some(&mut file, "url", collapse(urls.collect()));

    Ok(file)
}

/// 2^64, the first float a byte size can no longer hold
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

/// Coerce a byte size to an integer
fn coerce_bytesize(raw: &Value) -> Result<Option<u64>, CatalogError> {
    let failure = |v: &Value| CatalogError::TypeCoercionFailure {
        field: "contentbytesize".to_string(),
        value: v.to_string(),
    };

    match unwrap_typed(raw) {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_u64() {
            Some(size) => Ok(Some(size)),
            None => match n.as_f64() {
                Some(f) if (0.0..U64_LIMIT).contains(&f) && f.fract() == 0.0 => {
                    Ok(Some(f as u64))
                }
                _ => Err(failure(raw)),
            },
        },
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<u64>().map(Some).map_err(|_| failure(raw)),
        _ => Err(failure(raw)),
    }
}

/// Wrap homepage URL(s) as schema.org URL values
pub fn normalize_homepage(raw: Option<&Value>) -> Option<Value> {
    let pages = as_list(raw)
        .into_iter()
        .filter_map(scalar_text)
        .map(|url| json!({"@type": SCHEMA_URL, "@value": url}))
        .collect();
    collapse(pages)
}

/// Convert subdataset references to the record's `subdatasets` shape
///
/// Always returns a list, empty when there are no subdatasets.
pub fn normalize_subdatasets(raw: Option<&Value>) -> Value {
    let subdatasets = as_list(raw)
        .into_iter()
        .filter_map(Value::as_object)
        .map(|subds| {
            let mut entry = Map::new();
            for (from, to) in [
                ("identifier", "dataset_id"),
                ("version", "dataset_version"),
                ("path_posix", "dataset_path"),
                ("url", "dataset_url"),
            ] {
                insert_some(&mut entry, to, field_text(subds, from).map(Value::String));
            }
            Value::Object(entry)
        })
        .collect();
    Value::Array(subdatasets)
}

fn without_nulls(obj: &Map<String, Value>) -> Value {
    let mut copy = obj.clone();
    strip_nulls(&mut copy);
    Value::Object(copy)
}

fn is_absent(raw: Option<&Value>) -> bool {
    matches!(raw, None | Some(Value::Null))
}
