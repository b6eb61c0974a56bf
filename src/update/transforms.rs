//! Reusable transform primitives shared across component migration units.
//!
//! Every primitive is a total function over a mutable [`ComponentDocument`]:
//! a group or key that is absent leaves the document untouched. Only a
//! structurally malformed required field raises a schema error, and that is
//! the calling step's responsibility.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::document::component::{metadata_mut, str_field};
use crate::document::{ComponentDocument, EndpointGroup, keys};

/// Per-endpoint metadata key carrying the loop role of feedback-driven
/// endpoints.
pub const LOOP_ENDPOINT_TYPE: &str = "loopEndpointType";

pub const INNER_LOOP_ENDPOINT: &str = "InnerLoopEndpoint";

pub const OUTER_LOOP_ENDPOINT: &str = "OuterLoopEndpoint";

pub const SELF_LOOP_ENDPOINT: &str = "SelfLoopEndpoint";

/// Input metadata keys replacing the legacy `usage` tag.
pub const INPUT_HANDLING: &str = "inputHandling";

pub const INPUT_EXECUTION_CONSTRAINT: &str = "inputExecutionConstraint";

/// A fresh universally-unique endpoint identifier.
pub fn fresh_identifier() -> String {
    Uuid::new_v4().to_string()
}

/// Retags every endpoint of `group` whose category equals `category` and
/// whose name carries `name_suffix` with the category `new_category`.
///
/// Used when a format generation splits one dynamic-endpoint role into
/// phase-specific roles (e.g. the start value versus the converged value of a
/// loop variable), after the names have already been suffixed.
pub fn reassign_endpoint_category(
    doc: &mut ComponentDocument,
    group: EndpointGroup,
    category: &str,
    new_category: &str,
    name_suffix: &str,
) {
    for endpoint in doc.group_mut(group).into_iter().flatten() {
        let matches = str_field(endpoint, keys::EP_IDENTIFIER) == Some(category)
            && str_field(endpoint, keys::NAME).is_some_and(|name| name.ends_with(name_suffix));
        if matches
            && let Some(endpoint) = endpoint.as_object_mut()
        {
            endpoint.insert(
                keys::EP_IDENTIFIER.to_string(),
                Value::String(new_category.to_string()),
            );
        }
    }
}

/// Removes a metadata key with no current-format equivalent from every
/// endpoint of every group.
pub fn strip_endpoint_metadata_key(doc: &mut ComponentDocument, key: &str) {
    for group in EndpointGroup::ALL {
        for endpoint in doc.group_mut(group).into_iter().flatten() {
            if let Some(metadata) = endpoint
                .get_mut(keys::METADATA)
                .and_then(Value::as_object_mut)
            {
                metadata.shift_remove(key);
            }
        }
    }
}

/// Removes the first endpoint of `group` whose `field` equals `value`.
/// Returns whether an endpoint was removed.
pub fn remove_endpoint_where(
    doc: &mut ComponentDocument,
    group: EndpointGroup,
    field: &str,
    value: &str,
) -> bool {
    let Some(endpoints) = doc.group_mut(group) else {
        return false;
    };
    let position = endpoints
        .iter()
        .position(|endpoint| str_field(endpoint, field) == Some(value));
    match position {
        Some(index) => {
            endpoints.remove(index);
            true
        }
        None => false,
    }
}

/// Assigns `category` to every endpoint of `group` that has no category yet
/// (missing, JSON null, or the literal string "null" written by the oldest
/// editors).
pub fn backfill_dynamic_endpoint_category(
    doc: &mut ComponentDocument,
    group: EndpointGroup,
    category: &str,
) {
    for endpoint in doc.group_mut(group).into_iter().flatten() {
        let unset = match endpoint.get(keys::EP_IDENTIFIER) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text == "null",
            _ => false,
        };
        if unset && let Some(endpoint) = endpoint.as_object_mut() {
            endpoint.insert(
                keys::EP_IDENTIFIER.to_string(),
                Value::String(category.to_string()),
            );
        }
    }
}

/// Rewrites a loop driver's fault-tolerance configuration block to the
/// current key/value shape.
pub fn normalize_loop_fault_tolerance(doc: &mut ComponentDocument) {
    let Some(config) = doc.configuration_mut() else {
        return;
    };
    if let Some(not_a_value) = config.get("loopFaultTolerance").cloned() {
        config.insert(
            "loopFaultTolerance".to_string(),
            Value::String("Fail".to_string()),
        );
        config.insert("faultToleranceNAV".to_string(), not_a_value);
    }
    for (old, new) in [
        ("loopRerunAndFail", "maxRerunBeforeFailNAV"),
        ("loopRerunAndDiscard", "maxRerunBeforeDiscardNAV"),
        ("failLoop", "failLoopOnlyNAV"),
        ("finallyFail", "finallyFailIfDiscardedNAV"),
    ] {
        if let Some(value) = config.shift_remove(old) {
            config.insert(new.to_string(), value);
        }
    }
}

/// Replaces the legacy `usage` metadata tag on every input endpoint with the
/// explicit input-handling and execution-constraint pair.
pub fn rewrite_usage_as_scheduling(doc: &mut ComponentDocument) {
    for group in [EndpointGroup::DynamicInputs, EndpointGroup::StaticInputs] {
        for endpoint in doc.group_mut(group).into_iter().flatten() {
            let Some(metadata) = endpoint
                .get_mut(keys::METADATA)
                .and_then(Value::as_object_mut)
            else {
                continue;
            };
            let Some(usage) = metadata.get(keys::USAGE).and_then(Value::as_str) else {
                continue;
            };
            let replacement = match usage {
                "required" => Some(("Single", "Required")),
                "initial" => Some(("Constant", "Required")),
                "optional" => Some(("Single", "NotRequired")),
                _ => None,
            };
            if let Some((handling, constraint)) = replacement {
                metadata.insert(
                    INPUT_HANDLING.to_string(),
                    Value::String(handling.to_string()),
                );
                metadata.insert(
                    INPUT_EXECUTION_CONSTRAINT.to_string(),
                    Value::String(constraint.to_string()),
                );
            }
            metadata.shift_remove(keys::USAGE);
        }
    }
}

/// Renames the nested-loop flag to its current configuration key, coercing
/// the persisted string to a boolean.
pub fn rename_nested_loop_config(doc: &mut ComponentDocument) {
    let Some(config) = doc.configuration_mut() else {
        return;
    };
    if let Some(value) = config.shift_remove("isNestedLoop") {
        let nested = match value {
            Value::Bool(nested) => nested,
            Value::String(text) => text == "true",
            _ => false,
        };
        config.insert("nestedLoop".to_string(), Value::Bool(nested));
    }
}

/// Moves a configuration value from `old` to `new`, returning whether the
/// old key existed.
pub fn rename_configuration_key(doc: &mut ComponentDocument, old: &str, new: &str) -> bool {
    let Some(config) = doc.configuration_mut() else {
        return false;
    };
    match config.shift_remove(old) {
        Some(value) => {
            config.insert(new.to_string(), value);
            true
        }
        None => false,
    }
}

/// Appends a static endpoint with a fresh identifier, returning the
/// identifier. The group is created if absent.
pub fn add_static_endpoint(
    doc: &mut ComponentDocument,
    group: EndpointGroup,
    name: &str,
    datatype: &str,
) -> String {
    let identifier = fresh_identifier();
    let mut endpoint = Map::new();
    endpoint.insert(keys::NAME.to_string(), Value::String(name.to_string()));
    endpoint.insert(
        keys::DATATYPE.to_string(),
        Value::String(datatype.to_string()),
    );
    endpoint.insert(
        keys::METADATA.to_string(),
        Value::Object(Map::new()),
    );
    endpoint.insert(
        keys::IDENTIFIER.to_string(),
        Value::String(identifier.clone()),
    );
    if let Some(endpoints) = doc.group_mut_or_insert(group) {
        endpoints.push(Value::Object(endpoint));
    }
    identifier
}

/// Appends a dynamic endpoint with a fresh identifier, returning the
/// identifier.
pub fn add_dynamic_endpoint(
    doc: &mut ComponentDocument,
    group: EndpointGroup,
    name: &str,
    datatype: &str,
    category: &str,
    metadata: Map<String, Value>,
) -> String {
    let identifier = fresh_identifier();
    let mut endpoint = Map::new();
    endpoint.insert(keys::NAME.to_string(), Value::String(name.to_string()));
    endpoint.insert(
        keys::DATATYPE.to_string(),
        Value::String(datatype.to_string()),
    );
    endpoint.insert(keys::METADATA.to_string(), Value::Object(metadata));
    endpoint.insert(
        keys::IDENTIFIER.to_string(),
        Value::String(identifier.clone()),
    );
    endpoint.insert(
        keys::EP_IDENTIFIER.to_string(),
        Value::String(category.to_string()),
    );
    if let Some(endpoints) = doc.group_mut_or_insert(group) {
        endpoints.push(Value::Object(endpoint));
    }
    identifier
}

/// Sets the loop-role metadata tag on an endpoint record.
pub fn tag_loop_role(endpoint: &mut Value, role: &str) {
    if let Some(metadata) = metadata_mut(endpoint) {
        metadata.insert(
            LOOP_ENDPOINT_TYPE.to_string(),
            Value::String(role.to_string()),
        );
    }
}
