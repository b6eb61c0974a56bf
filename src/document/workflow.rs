use ahash::AHashSet;
use serde_json::{Map, Value};

use super::{ComponentDocument, keys};
use crate::error::MigrationError;

/// The root persisted workflow artifact: a version field, the node documents,
/// the connections between node endpoints, and opaque layout metadata
/// (`bendpoints`) that migration passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDocument {
    tree: Map<String, Value>,
}

impl WorkflowDocument {
    /// Parses a workflow document from its persisted text form.
    pub fn from_str(text: &str) -> Result<Self, MigrationError> {
        Ok(Self {
            tree: serde_json::from_str(text)?,
        })
    }

    pub fn from_value(tree: Value) -> Result<Self, MigrationError> {
        match tree {
            Value::Object(tree) => Ok(Self { tree }),
            _ => Err(MigrationError::Parse(
                "workflow document root must be a JSON object".to_string(),
            )),
        }
    }

    /// Serializes back to the persisted, pretty-printed text form.
    pub fn to_pretty_string(&self) -> Result<String, MigrationError> {
        Ok(serde_json::to_string_pretty(&self.tree)?)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.tree)
    }

    /// The declared document format version; absent in the oldest documents.
    pub fn version(&self) -> Option<&str> {
        self.tree.get(keys::WORKFLOW_VERSION)?.as_str()
    }

    pub fn set_version(&mut self, version: &str) {
        self.tree.insert(
            keys::WORKFLOW_VERSION.to_string(),
            Value::String(version.to_string()),
        );
    }

    pub fn nodes(&self) -> Option<&Vec<Value>> {
        self.tree.get(keys::NODES)?.as_array()
    }

    pub fn nodes_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.tree.get_mut(keys::NODES)?.as_array_mut()
    }

    pub fn connections(&self) -> Option<&Vec<Value>> {
        self.tree.get(keys::CONNECTIONS)?.as_array()
    }

    pub fn connections_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.tree.get_mut(keys::CONNECTIONS)?.as_array_mut()
    }

    /// Replaces the node array, keeping the document's other fields in place.
    pub fn set_nodes(&mut self, nodes: Vec<Value>) {
        self.tree.insert(keys::NODES.to_string(), Value::Array(nodes));
    }

    pub fn set_connections(&mut self, connections: Vec<Value>) {
        self.tree
            .insert(keys::CONNECTIONS.to_string(), Value::Array(connections));
    }

    /// Extracts every node as a standalone [`ComponentDocument`], leaving an
    /// empty node array behind. Re-embed with [`set_nodes`](Self::set_nodes).
    pub fn take_components(&mut self) -> Result<Vec<ComponentDocument>, MigrationError> {
        let nodes = match self.tree.get_mut(keys::NODES).and_then(Value::as_array_mut) {
            Some(nodes) => std::mem::take(nodes),
            None => return Ok(Vec::new()),
        };
        nodes.into_iter().map(ComponentDocument::from_value).collect()
    }

    /// The set of all endpoint identifiers declared across all nodes.
    ///
    /// Endpoints of legacy flat declarations carry no identifier yet and do
    /// not contribute.
    pub fn endpoint_identifiers(&self) -> AHashSet<String> {
        let mut identifiers = AHashSet::new();
        for node in self.nodes().into_iter().flatten() {
            for group in super::EndpointGroup::ALL {
                let endpoints = node.get(group.key()).and_then(Value::as_array);
                for endpoint in endpoints.into_iter().flatten() {
                    if let Some(id) = endpoint.get(keys::IDENTIFIER).and_then(Value::as_str) {
                        identifiers.insert(id.to_string());
                    }
                }
            }
        }
        identifiers
    }
}
