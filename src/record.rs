//! Catalog record construction
//!
//! Records start from an immutable template holding the keys every
//! record carries, get their item-specific fields applied, and are
//! stripped of absent entries when built.

use serde_json::{Map, Value};

use crate::value::strip_nulls;
use crate::vocab::{ITEM_DATASET, ITEM_FILE};

/// Kind of catalog item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Dataset,
    File,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Dataset => ITEM_DATASET,
            ItemType::File => ITEM_FILE,
        }
    }
}

/// Keys shared by every record of one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTemplate {
    pub item_type: ItemType,
    pub dataset_id: String,
    pub dataset_version: String,
    pub source_name: String,
    pub source_version: String,
}

impl RecordTemplate {
    /// Same dataset and source, different item type
    pub fn for_item(&self, item_type: ItemType) -> Self {
        Self {
            item_type,
            ..self.clone()
        }
    }

    /// Start a record from this template
    pub fn builder(&self) -> RecordBuilder {
        let mut fields = Map::new();
        fields.insert("type".to_string(), Value::from(self.item_type.as_str()));
        fields.insert("dataset_id".to_string(), Value::from(self.dataset_id.as_str()));
        fields.insert(
            "dataset_version".to_string(),
            Value::from(self.dataset_version.as_str()),
        );
        fields.insert("source_name".to_string(), Value::from(self.source_name.as_str()));
        fields.insert(
            "source_version".to_string(),
            Value::from(self.source_version.as_str()),
        );
        RecordBuilder { fields }
    }
}

/// Applies field overrides on top of a template
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    fields: Map<String, Value>,
}

impl RecordBuilder {
    /// Set a field; `None` leaves the record untouched
    pub fn field(mut self, key: &str, value: Option<Value>) -> Self {
        if let Some(v) = value {
            self.fields.insert(key.to_string(), v);
        }
        self
    }

    /// Apply every entry of a map as a field
    pub fn fields(mut self, overrides: Map<String, Value>) -> Self {
        for (key, value) in overrides {
            self.fields.insert(key, value);
        }
        self
    }

    /// Finish the record, dropping null entries
    pub fn build(mut self) -> Value {
        strip_nulls(&mut self.fields);
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> RecordTemplate {
        RecordTemplate {
            item_type: ItemType::Dataset,
            dataset_id: "abc".to_string(),
            dataset_version: "latest".to_string(),
            source_name: "tabby".to_string(),
            source_version: "0.1.0".to_string(),
        }
    }

    #[test]
    fn test_builder_required_keys() {
        let record = template().builder().build();
        assert_eq!(
            record,
            json!({
                "type": "dataset",
                "dataset_id": "abc",
                "dataset_version": "latest",
                "source_name": "tabby",
                "source_version": "0.1.0"
            })
        );
    }

    #[test]
    fn test_builder_skips_absent() {
        let record = template()
            .builder()
            .field("name", Some(json!("Title")))
            .field("license", None)
            .field("doi", Some(Value::Null))
            .build();
        assert_eq!(record["name"], "Title");
        assert!(record.get("license").is_none());
        assert!(record.get("doi").is_none());
    }

    #[test]
    fn test_file_template() {
        let file = template().for_item(ItemType::File);
        let mut overrides = Map::new();
        overrides.insert("path".to_string(), json!("a/b.txt"));
        let record = file.builder().fields(overrides).build();
        assert_eq!(record["type"], "file");
        assert_eq!(record["dataset_id"], "abc");
        assert_eq!(record["path"], "a/b.txt");
    }
}
