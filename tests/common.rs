//! Common test utilities for building workflow and component documents.
use serde_json::{Value, json};

/// Creates a structured node document for a registered or unregistered
/// component type at the given schema version.
#[allow(dead_code)]
pub fn structured_node(node_id: &str, component_id: &str, version: &str) -> Value {
    json!({
        "identifier": node_id,
        "name": node_id,
        "location": "10:20",
        "component": { "identifier": component_id, "version": version, "name": component_id },
        "configuration": {}
    })
}

/// Adds an endpoint record to one of a node's endpoint groups.
#[allow(dead_code)]
pub fn push_endpoint(node: &mut Value, group: &str, endpoint: Value) {
    let groups = node.as_object_mut().expect("node is an object");
    groups
        .entry(group)
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .expect("endpoint group is an array")
        .push(endpoint);
}

/// A static endpoint record with a fixed identifier.
#[allow(dead_code)]
pub fn static_endpoint(identifier: &str, name: &str, datatype: &str) -> Value {
    json!({
        "name": name,
        "datatype": datatype,
        "metadata": {},
        "identifier": identifier
    })
}

/// A dynamic endpoint record with a fixed identifier and category.
#[allow(dead_code)]
pub fn dynamic_endpoint(identifier: &str, name: &str, datatype: &str, category: &str) -> Value {
    json!({
        "name": name,
        "datatype": datatype,
        "metadata": {},
        "identifier": identifier,
        "epIdentifier": category
    })
}

/// Wraps nodes and connections into a workflow document at a given format
/// version.
#[allow(dead_code)]
pub fn workflow(version: &str, nodes: Vec<Value>, connections: Vec<Value>) -> String {
    json!({
        "workflowVersion": version,
        "name": "test workflow",
        "nodes": nodes,
        "connections": connections
    })
    .to_string()
}

/// A fully current workflow: one converger node at its newest schema version,
/// one unregistered node, one identifier-based connection between them.
#[allow(dead_code)]
pub fn current_workflow() -> String {
    let mut converger = structured_node("node-a", "converger", "6");
    push_endpoint(
        &mut converger,
        "staticOutputs",
        static_endpoint("ep-converged", "Converged", "Boolean"),
    );
    let mut sink = structured_node("node-b", "script", "1.0");
    push_endpoint(
        &mut sink,
        "staticInputs",
        static_endpoint("ep-x", "x", "Boolean"),
    );
    workflow(
        "5",
        vec![converger, sink],
        vec![json!({
            "source": "node-a",
            "output": "ep-converged",
            "target": "node-b",
            "input": "ep-x"
        })],
    )
}

/// Looks up a node by its instance identifier in a migrated document.
#[allow(dead_code)]
pub fn find_node<'a>(doc: &'a Value, node_id: &str) -> &'a Value {
    doc["nodes"]
        .as_array()
        .expect("document has nodes")
        .iter()
        .find(|node| node["identifier"] == node_id)
        .expect("node exists")
}

/// All endpoints of one group of a node, or an empty slice if absent.
#[allow(dead_code)]
pub fn endpoints<'a>(node: &'a Value, group: &str) -> Vec<&'a Value> {
    node[group]
        .as_array()
        .map(|endpoints| endpoints.iter().collect())
        .unwrap_or_default()
}

/// Finds an endpoint by name within one group of a node.
#[allow(dead_code)]
pub fn endpoint_named<'a>(node: &'a Value, group: &str, name: &str) -> Option<&'a Value> {
    endpoints(node, group)
        .into_iter()
        .find(|endpoint| endpoint["name"] == name)
}

/// Collects every endpoint identifier declared anywhere in the document.
#[allow(dead_code)]
pub fn all_endpoint_identifiers(doc: &Value) -> Vec<String> {
    let mut identifiers = Vec::new();
    for node in doc["nodes"].as_array().into_iter().flatten() {
        for group in [
            "staticInputs",
            "staticOutputs",
            "dynamicInputs",
            "dynamicOutputs",
        ] {
            for endpoint in node[group].as_array().into_iter().flatten() {
                if let Some(id) = endpoint["identifier"].as_str() {
                    identifiers.push(id.to_string());
                }
            }
        }
    }
    identifiers
}
