//! The two document-wide shape transforms bridging the flat legacy encoding
//! and the structured encoding introduced with format version 3.

use serde_json::{Map, Value};
use tracing::warn;

use super::RepairPolicy;
use crate::document::{Connection, EndpointGroup, WorkflowDocument, escape, keys};
use crate::error::MigrationError;
use crate::update::transforms::fresh_identifier;
use crate::version::STRUCTURED_FORMAT_VERSION;

/// Translates a legacy endpoint/configuration type name to its canonical
/// datatype tag.
fn canonical_datatype(legacy: &str) -> Option<&'static str> {
    match legacy {
        "java.lang.String" => Some("ShortText"),
        "java.lang.Double" | "java.lang.Float" => Some("Float"),
        "java.lang.Integer" | "java.lang.Long" => Some("Integer"),
        "java.lang.Boolean" => Some("Boolean"),
        "commons.channel.DataManagementFileReference" => Some("FileReference"),
        "commons.channel.VariantArray" => Some("SmallTable"),
        _ => None,
    }
}

/// Shape transform A: rewrites every node's flat `addOutput`/`addInput`
/// string declarations and flat `key:type:value` configuration entries into
/// the structured endpoint arrays and configuration object, then advances the
/// document to the structured format version.
pub(super) fn structure_nodes(doc: &mut WorkflowDocument) -> Result<(), MigrationError> {
    for node in doc.nodes_mut().into_iter().flatten() {
        structure_endpoints(node, "Output")?;
        structure_endpoints(node, "Input")?;
        structure_configuration(node)?;
    }
    doc.set_version(STRUCTURED_FORMAT_VERSION);
    Ok(())
}

/// One direction of the flat-to-structured endpoint rewrite. `direction` is
/// `"Output"` or `"Input"`, matching the legacy `addOutput`/`outputMetaData`
/// field naming.
fn structure_endpoints(node: &mut Value, direction: &str) -> Result<(), MigrationError> {
    let Some(fields) = node.as_object_mut() else {
        return Err(MigrationError::Parse(
            "workflow node must be a JSON object".to_string(),
        ));
    };
    let declarations_key = format!("add{direction}");
    let metadata_key = format!("{}MetaData", direction.to_lowercase());
    let target_key = format!("dynamic{direction}s");

    let declarations = fields.shift_remove(&declarations_key);
    let metadata_by_name = fields.shift_remove(&metadata_key);

    let mut endpoints: Vec<Value> = Vec::new();
    for declaration in declarations.as_ref().and_then(Value::as_array).into_iter().flatten() {
        let Some(raw) = declaration.as_str() else {
            continue;
        };
        let segments = escape::split_unescape(raw);
        let name = segments.first().cloned().unwrap_or_default();
        let legacy_type = segments.get(1).ok_or_else(|| {
            MigrationError::schema(
                node_id_of(fields),
                format!("flat endpoint declaration '{raw}' has no type"),
            )
        })?;
        let datatype = canonical_datatype(legacy_type).ok_or_else(|| {
            MigrationError::schema(
                node_id_of(fields),
                format!("unknown legacy endpoint type '{legacy_type}'"),
            )
        })?;

        let mut endpoint = Map::new();
        endpoint.insert(
            keys::IDENTIFIER.to_string(),
            Value::String(fresh_identifier()),
        );
        endpoint.insert(keys::EP_IDENTIFIER.to_string(), Value::Null);
        endpoint.insert(keys::NAME.to_string(), Value::String(name.clone()));
        endpoint.insert(
            keys::DATATYPE.to_string(),
            Value::String(datatype.to_string()),
        );
        endpoint.insert(
            keys::VALUE.to_string(),
            Value::String(segments.get(2).cloned().unwrap_or_default()),
        );
        if let Some(entries) = metadata_by_name
            .as_ref()
            .and_then(|m| m.get(name.as_str()))
            .and_then(Value::as_array)
        {
            endpoint.insert(
                keys::METADATA.to_string(),
                Value::Object(structure_endpoint_metadata(entries)),
            );
        }
        endpoints.push(Value::Object(endpoint));
    }

    fields.insert(target_key, Value::Array(endpoints));
    Ok(())
}

fn node_id_of(fields: &Map<String, Value>) -> String {
    fields
        .get(keys::IDENTIFIER)
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_string()
}

/// Rewrites one endpoint's flat metadata entries, normalizing the historical
/// `usage` spellings on the way.
fn structure_endpoint_metadata(entries: &[Value]) -> Map<String, Value> {
    let mut metadata = Map::new();
    for entry in entries {
        let Some(raw) = entry.as_str() else { continue };
        let segments = escape::split_unescape(raw);
        let Some(key) = segments.first() else { continue };
        let mut value = segments.get(2).cloned().unwrap_or_default();
        if key == keys::USAGE {
            value = match value.as_str() {
                "init" => "initial".to_string(),
                "Required" => "required".to_string(),
                "Optional" => "optional".to_string(),
                other => other.to_string(),
            };
        }
        metadata.insert(key.clone(), Value::String(value));
    }
    metadata
}

/// Rewrites the flat configuration string array into the structured
/// configuration object.
fn structure_configuration(node: &mut Value) -> Result<(), MigrationError> {
    let Some(fields) = node.as_object_mut() else {
        return Ok(());
    };
    let entries = match fields.get(keys::CONFIGURATION) {
        Some(Value::Array(entries)) => entries.clone(),
        // Already structured, or absent: both are left alone.
        _ => {
            if fields.get(keys::CONFIGURATION).is_none() {
                fields.insert(keys::CONFIGURATION.to_string(), Value::Object(Map::new()));
            }
            return Ok(());
        }
    };
    let mut config = Map::new();
    for entry in &entries {
        let Some(raw) = entry.as_str() else { continue };
        let segments = escape::split_unescape(raw);
        let Some(key) = segments.first() else { continue };
        config.insert(
            key.clone(),
            Value::String(segments.get(2).cloned().unwrap_or_default()),
        );
    }
    fields.insert(keys::CONFIGURATION.to_string(), Value::Object(config));
    Ok(())
}

/// Shape transform B: rewrites connections from name-based endpoint
/// references to identifier-based references.
///
/// A connection naming an endpoint that no longer exists on its node is
/// repaired according to `policy`: under
/// [`RepairPolicy::SynthesizeMissingEndpoint`] a static `ShortText` endpoint
/// with a fresh identifier is attached to the node so the connection
/// survives; under [`RepairPolicy::Strict`] migration fails. A connection
/// naming a node that does not exist at all cannot be repaired and is
/// dropped (permissive) or fails (strict).
pub(super) fn rewire_connections(
    doc: &mut WorkflowDocument,
    policy: RepairPolicy,
) -> Result<(), MigrationError> {
    let Some(connections) = doc.connections().cloned() else {
        return Ok(());
    };
    let Some(nodes) = doc.nodes_mut() else {
        return Ok(());
    };

    let mut rewired: Vec<Value> = Vec::with_capacity(connections.len());
    for connection in connections {
        let named: Connection = serde_json::from_value(connection)?;

        let Some(output_id) = resolve_endpoint(nodes, &named.source, &named.output, false, policy)?
        else {
            warn!(
                source = %named.source,
                target = %named.target,
                "dropping connection from unknown node"
            );
            continue;
        };
        let Some(input_id) = resolve_endpoint(nodes, &named.target, &named.input, true, policy)?
        else {
            warn!(
                source = %named.source,
                target = %named.target,
                "dropping connection to unknown node"
            );
            continue;
        };

        let rewired_connection = Connection {
            source: named.source,
            output: output_id,
            target: named.target,
            input: input_id,
        };
        rewired.push(serde_json::to_value(rewired_connection)?);
    }
    doc.set_connections(rewired);
    Ok(())
}

/// Looks up an endpoint by name on the given node, searching the dynamic
/// group before the static one. Returns the endpoint identifier, `Ok(None)`
/// when the node itself is unknown and the policy is permissive, or an error
/// under [`RepairPolicy::Strict`].
fn resolve_endpoint(
    nodes: &mut [Value],
    node_id: &str,
    endpoint_name: &str,
    input_side: bool,
    policy: RepairPolicy,
) -> Result<Option<String>, MigrationError> {
    let (dynamic_group, static_group) = if input_side {
        (EndpointGroup::DynamicInputs, EndpointGroup::StaticInputs)
    } else {
        (EndpointGroup::DynamicOutputs, EndpointGroup::StaticOutputs)
    };

    let Some(node) = nodes
        .iter_mut()
        .find(|node| node.get(keys::IDENTIFIER).and_then(Value::as_str) == Some(node_id))
    else {
        return match policy {
            RepairPolicy::SynthesizeMissingEndpoint => Ok(None),
            RepairPolicy::Strict => Err(MigrationError::schema(
                node_id,
                format!("connection references unknown node for endpoint '{endpoint_name}'"),
            )),
        };
    };

    for group in [dynamic_group, static_group] {
        let endpoints = node.get(group.key()).and_then(Value::as_array);
        for endpoint in endpoints.into_iter().flatten() {
            if endpoint.get(keys::NAME).and_then(Value::as_str) == Some(endpoint_name)
                && let Some(identifier) = endpoint.get(keys::IDENTIFIER).and_then(Value::as_str)
            {
                return Ok(Some(identifier.to_string()));
            }
        }
    }

    match policy {
        RepairPolicy::SynthesizeMissingEndpoint => {
            // The named endpoint was dropped or renamed during node
            // migration; attach a placeholder so the connection survives.
            let identifier = fresh_identifier();
            let mut endpoint = Map::new();
            endpoint.insert(
                keys::NAME.to_string(),
                Value::String(endpoint_name.to_string()),
            );
            endpoint.insert(
                keys::IDENTIFIER.to_string(),
                Value::String(identifier.clone()),
            );
            endpoint.insert(
                keys::DATATYPE.to_string(),
                Value::String(keys::SHORT_TEXT.to_string()),
            );
            if let Some(fields) = node.as_object_mut() {
                let endpoints = fields
                    .entry(static_group.key())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Some(endpoints) = endpoints.as_array_mut() {
                    endpoints.push(Value::Object(endpoint));
                }
            }
            warn!(
                node = node_id,
                endpoint = endpoint_name,
                "synthesized placeholder endpoint for unresolved connection"
            );
            Ok(Some(identifier))
        }
        RepairPolicy::Strict => Err(MigrationError::schema(
            node_id,
            format!("connection references unknown endpoint '{endpoint_name}'"),
        )),
    }
}
