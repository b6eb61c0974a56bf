use serde_json::{Map, Value};

use super::{EndpointGroup, keys};
use crate::error::MigrationError;

/// One node's persisted, schema-versioned description.
///
/// The document is held as a mutable JSON tree so that update steps can
/// rewrite legacy shapes that no longer map onto any current struct. A
/// component document can be extracted from a workflow, migrated standalone
/// and re-embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDocument {
    tree: Map<String, Value>,
}

impl ComponentDocument {
    /// Wraps an already-parsed JSON tree. Fails unless the root is an object.
    pub fn from_value(tree: Value) -> Result<Self, MigrationError> {
        match tree {
            Value::Object(tree) => Ok(Self { tree }),
            _ => Err(MigrationError::Parse(
                "component document root must be a JSON object".to_string(),
            )),
        }
    }

    /// Parses a component document from its persisted text form.
    pub fn from_str(text: &str) -> Result<Self, MigrationError> {
        Ok(Self {
            tree: serde_json::from_str(text)?,
        })
    }

    /// Serializes back to the persisted, pretty-printed text form.
    pub fn to_pretty_string(&self) -> Result<String, MigrationError> {
        Ok(serde_json::to_string_pretty(&self.tree)?)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.tree)
    }

    /// The node instance identifier, stable across migration. Used for
    /// connection endpoints and error context; a document missing it is
    /// reported as `?`.
    pub fn node_id(&self) -> String {
        self.tree
            .get(keys::IDENTIFIER)
            .and_then(Value::as_str)
            .unwrap_or("?")
            .to_string()
    }

    /// The component type identifier (`component/identifier`).
    pub fn component_id(&self) -> Option<&str> {
        self.tree
            .get(keys::COMPONENT)?
            .get(keys::IDENTIFIER)?
            .as_str()
    }

    /// The type-local schema version (`component/version`), absent in the
    /// oldest documents.
    pub fn version(&self) -> Option<&str> {
        self.tree.get(keys::COMPONENT)?.get(keys::VERSION)?.as_str()
    }

    /// Stamps a new component version, creating the `component` object if the
    /// document predates it.
    pub fn set_version(&mut self, version: &str) {
        let component = self
            .tree
            .entry(keys::COMPONENT)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(component) = component.as_object_mut() {
            component.insert(keys::VERSION.to_string(), Value::String(version.to_string()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.tree.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.tree.get_mut(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.tree.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.tree.shift_remove(key)
    }

    /// The structured configuration object. Legacy documents store a flat
    /// string array instead; those see `None` here until the document-wide
    /// shape transform has run.
    pub fn configuration(&self) -> Option<&Map<String, Value>> {
        self.tree.get(keys::CONFIGURATION)?.as_object()
    }

    pub fn configuration_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.tree.get_mut(keys::CONFIGURATION)?.as_object_mut()
    }

    /// The endpoint records of one group, if the group is present.
    pub fn group(&self, group: EndpointGroup) -> Option<&Vec<Value>> {
        self.tree.get(group.key())?.as_array()
    }

    pub fn group_mut(&mut self, group: EndpointGroup) -> Option<&mut Vec<Value>> {
        self.tree.get_mut(group.key())?.as_array_mut()
    }

    /// Like [`group_mut`](Self::group_mut), inserting an empty array when the
    /// group is absent.
    pub fn group_mut_or_insert(&mut self, group: EndpointGroup) -> Option<&mut Vec<Value>> {
        self.tree
            .entry(group.key())
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
    }

    /// Collects the `identifier` of every endpoint across all four groups.
    pub fn endpoint_identifiers(&self) -> impl Iterator<Item = &str> {
        EndpointGroup::ALL
            .into_iter()
            .filter_map(|group| self.group(group))
            .flatten()
            .filter_map(|endpoint| endpoint.get(keys::IDENTIFIER)?.as_str())
    }
}

/// Returns an endpoint's `metadata` object, inserting an empty one if absent.
pub(crate) fn metadata_mut(endpoint: &mut Value) -> Option<&mut Map<String, Value>> {
    endpoint
        .as_object_mut()?
        .entry(keys::METADATA)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

/// Reads a string field of an endpoint record.
pub(crate) fn str_field<'a>(endpoint: &'a Value, key: &str) -> Option<&'a str> {
    endpoint.get(key)?.as_str()
}
