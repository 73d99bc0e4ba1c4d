//! Collection-level uniqueness configuration.

use std::collections::BTreeMap;

/// Describes one managed collection: its natural key and the embedded
/// arrays (sub-collections) together with their sibling-scoped keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    name: String,
    natural_key: String,
    sub_collections: BTreeMap<String, String>,
}

impl CollectionSchema {
    /// Creates a schema for collection `name` keyed by `natural_key`.
    pub fn new(name: impl Into<String>, natural_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            natural_key: natural_key.into(),
            sub_collections: BTreeMap::new(),
        }
    }

    /// Registers an embedded array `field` whose items are unique by
    /// `scoped_key` among siblings of the same parent.
    pub fn with_sub_collection(
        mut self,
        field: impl Into<String>,
        scoped_key: impl Into<String>,
    ) -> Self {
        self.sub_collections.insert(field.into(), scoped_key.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn natural_key(&self) -> &str {
        &self.natural_key
    }

    /// Returns the scoped key of a registered sub-collection.
    pub fn scoped_key(&self, field: &str) -> Option<&str> {
        self.sub_collections.get(field).map(String::as_str)
    }

    /// Iterates registered sub-collection array fields.
    pub fn sub_collection_fields(&self) -> impl Iterator<Item = &str> {
        self.sub_collections.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionSchema;

    #[test]
    fn scoped_key_is_only_known_for_registered_fields() {
        let schema =
            CollectionSchema::new("categories", "name").with_sub_collection("products", "name");
        assert_eq!(schema.scoped_key("products"), Some("name"));
        assert_eq!(schema.scoped_key("variants"), None);
        assert_eq!(
            schema.sub_collection_fields().collect::<Vec<_>>(),
            vec!["products"]
        );
    }
}
