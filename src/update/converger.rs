//! Migration unit for the converger component, the loop driver that feeds
//! values back into a nested loop until they settle.
//!
//! This is the richest transform chain in the format history and doubles as
//! the reference for writing further units: a legacy-bucket rewrite of the
//! flat encoding, a version-3 category backfill, and an eight-rung ladder to
//! the current schema.

use serde_json::{Map, Value};

use super::{
    ComponentUpdater, MigrationContext, VersionLadder, VersionStep,
    transforms::{
        self, INPUT_EXECUTION_CONSTRAINT, LOOP_ENDPOINT_TYPE, OUTER_LOOP_ENDPOINT,
        SELF_LOOP_ENDPOINT, fresh_identifier,
    },
};
use crate::document::component::str_field;
use crate::document::{ComponentDocument, EndpointGroup, escape, keys};
use crate::error::MigrationError;
use crate::version::{BucketSet, FormatBucket, older_than};

const COMPONENT_IDS: &[&str] = &["converger", "components.converger.Converger"];

const CURRENT_VERSION: &str = "6";

/// Dynamic-endpoint category of loop values under convergence.
const VALUE_TO_CONVERGE: &str = "valueToConverge";

/// Dynamic-endpoint category of values forwarded through the loop unchanged.
const TO_FORWARD: &str = "toForward";

const OUTER_LOOP_DONE: &str = "outerLoopDone";

const AUXILIARY: &str = "auxiliary";

const START_SUFFIX: &str = "_start";

const CONVERGED_SUFFIX: &str = "_converged";

const IS_CONVERGED_SUFFIX: &str = "_is_converged";

const BOOLEAN: &str = "Boolean";

pub struct ConvergerUpdater {
    ladder: VersionLadder,
}

impl ConvergerUpdater {
    pub fn new() -> Self {
        Self {
            ladder: VersionLadder::new(vec![
                VersionStep {
                    source: "3.0",
                    target: "3.1",
                    apply: add_iterations_to_consider,
                },
                VersionStep {
                    source: "3.1",
                    target: "3.2",
                    apply: fold_start_values,
                },
                VersionStep {
                    source: "3.2",
                    target: "4.0",
                    apply: rename_max_iterations,
                },
                VersionStep {
                    source: "4.0",
                    target: "4.1",
                    apply: retag_converged_value_outputs,
                },
                VersionStep {
                    source: "4.1",
                    target: "5",
                    apply: tag_loop_roles,
                },
                VersionStep {
                    source: "5",
                    target: "5.1",
                    apply: add_auxiliary_converged_outputs,
                },
                VersionStep {
                    source: "5.1",
                    target: "5.1.1",
                    apply: normalize_fault_tolerance,
                },
                VersionStep {
                    source: "5.1.1",
                    target: "6",
                    apply: split_loop_value_categories,
                },
            ]),
        }
    }
}

impl Default for ConvergerUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentUpdater for ConvergerUpdater {
    fn component_ids(&self) -> &[&'static str] {
        COMPONENT_IDS
    }

    fn current_version(&self) -> &'static str {
        CURRENT_VERSION
    }

    fn affected_buckets(&self, version: Option<&str>, interactive: bool) -> BucketSet {
        let mut buckets = BucketSet::NONE;
        if interactive {
            if version.is_none_or(|v| older_than(v, "1.0")) {
                buckets.insert(FormatBucket::BeforeVersion3);
            }
            if version.is_some_and(|v| older_than(v, "3.0")) {
                buckets.insert(FormatBucket::ForVersion3);
            }
            if version.is_some_and(|v| older_than(v, CURRENT_VERSION)) {
                buckets.insert(FormatBucket::AfterVersion3);
            }
        } else if version.is_some_and(|v| !older_than(v, "5") && older_than(v, "5.1.1")) {
            buckets.insert(FormatBucket::AfterVersion3);
        }
        buckets
    }

    fn apply(
        &self,
        bucket: FormatBucket,
        interactive: bool,
        doc: &mut ComponentDocument,
        ctx: &MigrationContext,
    ) -> Result<(), MigrationError> {
        match bucket {
            FormatBucket::BeforeVersion3 if interactive => {
                legacy_update(doc)?;
                doc.set_version("1.0");
                Ok(())
            }
            FormatBucket::ForVersion3 if interactive => {
                structured_update(doc)?;
                doc.set_version("3.0");
                Ok(())
            }
            FormatBucket::AfterVersion3 => {
                if interactive {
                    self.ladder.run(doc, ctx)
                } else {
                    // The silent pass only covers the span that needs no
                    // confirmation; the interactive pass finishes the chain.
                    self.ladder.run_until(doc, ctx, Some("5.1.1"))
                }
            }
            _ => Ok(()),
        }
    }
}

/// Pre-1.0 documents: the epsilon thresholds were typed as floating-point
/// configuration entries and there was no converged twin for loop outputs.
/// Operates on the flat `key:type:value` encoding.
fn legacy_update(doc: &mut ComponentDocument) -> Result<(), MigrationError> {
    for eps in ["epsR", "epsA"] {
        retype_flat_config_entry(doc, eps)?;
    }
    duplicate_converged_outputs(doc)
}

fn retype_flat_config_entry(doc: &mut ComponentDocument, key: &str) -> Result<(), MigrationError> {
    let Some(entries) = doc
        .get_mut(keys::CONFIGURATION)
        .and_then(Value::as_array_mut)
    else {
        return Ok(());
    };
    for entry in entries {
        let Some(text) = entry.as_str() else { continue };
        let segments = escape::split_unescape(text);
        if segments.first().map(String::as_str) == Some(key)
            && segments.get(1).map(String::as_str) == Some("java.lang.Double")
        {
            let value = segments.get(2).cloned().unwrap_or_default();
            *entry = Value::String(escape::join_escaped([key, "java.lang.String", &value]));
        }
    }
    Ok(())
}

fn duplicate_converged_outputs(doc: &mut ComponentDocument) -> Result<(), MigrationError> {
    let node_id = doc.node_id();
    let Some(outputs) = doc.get_mut(keys::ADD_OUTPUT).and_then(Value::as_array_mut) else {
        return Err(MigrationError::schema(
            node_id,
            "legacy document without flat output declarations",
        ));
    };
    let declared: Vec<(String, String)> = outputs
        .iter()
        .filter_map(Value::as_str)
        .map(escape::split_unescape)
        .filter(|segments| segments.len() >= 2)
        .map(|segments| (segments[0].clone(), segments[1].clone()))
        .collect();
    for (name, datatype) in &declared {
        let twin = format!("{name}{CONVERGED_SUFFIX}");
        let twin_exists = declared.iter().any(|(existing, _)| *existing == twin);
        if !name.ends_with(CONVERGED_SUFFIX) && !twin_exists {
            outputs.push(Value::String(escape::join_escaped([
                twin.as_str(),
                datatype.as_str(),
            ])));
        }
    }
    Ok(())
}

/// Documents between 1.0 and 3.0: dynamic endpoints predate category tags,
/// and the static convergence endpoints did not exist yet.
fn structured_update(doc: &mut ComponentDocument) -> Result<(), MigrationError> {
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicInputs)
        .into_iter()
        .flatten()
    {
        let unset = matches!(endpoint.get(keys::EP_IDENTIFIER), None | Some(Value::Null));
        if unset && let Some(fields) = endpoint.as_object_mut() {
            let category = if fields.get(keys::DATATYPE).and_then(Value::as_str) == Some("Float") {
                VALUE_TO_CONVERGE
            } else {
                OUTER_LOOP_DONE
            };
            fields.insert(
                keys::EP_IDENTIFIER.to_string(),
                Value::String(category.to_string()),
            );
        }
    }

    // Outputs carried no meaningful category at all before version 3.
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicOutputs)
        .into_iter()
        .flatten()
    {
        if let Some(fields) = endpoint.as_object_mut() {
            fields.insert(
                keys::EP_IDENTIFIER.to_string(),
                Value::String(VALUE_TO_CONVERGE.to_string()),
            );
        }
    }

    if doc.group(EndpointGroup::StaticOutputs).is_none() {
        for name in ["Converged", "Converged absolute", "Converged relative"] {
            transforms::add_static_endpoint(doc, EndpointGroup::StaticOutputs, name, BOOLEAN);
        }
    }
    if doc.group(EndpointGroup::StaticInputs).is_none() {
        let mut metadata = Map::new();
        metadata.insert(
            keys::USAGE.to_string(),
            Value::String("optional".to_string()),
        );
        let mut endpoint = Map::new();
        endpoint.insert(
            keys::NAME.to_string(),
            Value::String(OUTER_LOOP_DONE.to_string()),
        );
        endpoint.insert(
            keys::DATATYPE.to_string(),
            Value::String(BOOLEAN.to_string()),
        );
        endpoint.insert(
            keys::IDENTIFIER.to_string(),
            Value::String(fresh_identifier()),
        );
        endpoint.insert("readonly".to_string(), Value::String("true".to_string()));
        endpoint.insert(keys::METADATA.to_string(), Value::Object(metadata));
        if let Some(inputs) = doc.group_mut_or_insert(EndpointGroup::StaticInputs) {
            inputs.push(Value::Object(endpoint));
        }
    }
    Ok(())
}

/// 3.0 -> 3.1: the convergence window became configurable; historical
/// documents behave as if it were one iteration.
fn add_iterations_to_consider(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    let node_id = doc.node_id();
    let Some(config) = doc.configuration_mut() else {
        return Err(MigrationError::schema(node_id, "missing configuration object"));
    };
    config.insert(
        "iterationsToConsider".to_string(),
        Value::String("1".to_string()),
    );
    Ok(())
}

/// 3.1 -> 3.2: the nested-loop flag moved to its current key, and the plain
/// numeric start value was folded into a serialized typed value.
fn fold_start_values(
    doc: &mut ComponentDocument,
    ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    transforms::rename_nested_loop_config(doc);
    let node_id = doc.node_id();
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicInputs)
        .into_iter()
        .flatten()
    {
        let Some(metadata) = endpoint
            .get_mut(keys::METADATA)
            .and_then(Value::as_object_mut)
        else {
            continue;
        };
        if metadata.get("hasStartValue").and_then(Value::as_str) != Some("true") {
            continue;
        }
        let raw = metadata
            .get("startValue")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                MigrationError::schema(node_id.clone(), "hasStartValue without startValue")
            })?;
        let value: f64 = raw.parse().map_err(|_| {
            MigrationError::schema(node_id.clone(), format!("non-numeric startValue '{raw}'"))
        })?;
        metadata.insert(
            "initValue".to_string(),
            Value::String(ctx.codec().encode_float(value)),
        );
    }
    Ok(())
}

/// 3.2 -> 4.0: the iteration limit was renamed to reflect that it counts
/// convergence checks.
fn rename_max_iterations(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    transforms::rename_configuration_key(doc, "maxIterations", "maxConvChecks");
    Ok(())
}

/// 4.0 -> 4.1: the output category was unified with the input category.
fn retag_converged_value_outputs(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicOutputs)
        .into_iter()
        .flatten()
    {
        if str_field(endpoint, keys::EP_IDENTIFIER) == Some("convergedValue")
            && let Some(fields) = endpoint.as_object_mut()
        {
            fields.insert(
                keys::EP_IDENTIFIER.to_string(),
                Value::String(VALUE_TO_CONVERGE.to_string()),
            );
        }
    }
    Ok(())
}

/// 4.1 -> 5: loop-role metadata was introduced, and loop values without a
/// start value got an explicit outer-loop start input.
fn tag_loop_roles(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    for endpoint in doc
        .group_mut(EndpointGroup::StaticOutputs)
        .into_iter()
        .flatten()
    {
        let role = match str_field(endpoint, keys::NAME) {
            Some("Outer loop done") => Some("InnerLoopEndpoint"),
            Some("Converged") | Some("Converged absolute") | Some("Converged relative") => {
                Some(OUTER_LOOP_ENDPOINT)
            }
            _ => None,
        };
        if let Some(role) = role {
            transforms::tag_loop_role(endpoint, role);
        }
    }

    for endpoint in doc
        .group_mut(EndpointGroup::DynamicOutputs)
        .into_iter()
        .flatten()
    {
        // Heuristic carried over from the format history: a converged twin is
        // recognized by its name suffix.
        let role = if str_field(endpoint, keys::NAME).is_some_and(|n| n.ends_with(CONVERGED_SUFFIX))
        {
            OUTER_LOOP_ENDPOINT
        } else {
            SELF_LOOP_ENDPOINT
        };
        transforms::tag_loop_role(endpoint, role);
    }

    let mut start_inputs: Vec<Value> = Vec::new();
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicInputs)
        .into_iter()
        .flatten()
    {
        match str_field(endpoint, keys::EP_IDENTIFIER) {
            Some(VALUE_TO_CONVERGE) => {
                transforms::tag_loop_role(endpoint, SELF_LOOP_ENDPOINT);
                let has_start_value = endpoint
                    .get(keys::METADATA)
                    .and_then(|m| m.get("hasStartValue"))
                    .and_then(Value::as_str)
                    == Some("true");
                if has_start_value {
                    continue;
                }
                let name = str_field(endpoint, keys::NAME).unwrap_or_default().to_string();
                let datatype = str_field(endpoint, keys::DATATYPE)
                    .unwrap_or_default()
                    .to_string();
                let mut metadata = endpoint
                    .get(keys::METADATA)
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                metadata.insert(
                    LOOP_ENDPOINT_TYPE.to_string(),
                    Value::String(OUTER_LOOP_ENDPOINT.to_string()),
                );
                metadata.insert(
                    INPUT_EXECUTION_CONSTRAINT.to_string(),
                    Value::String("Required".to_string()),
                );
                let mut start_input = Map::new();
                start_input.insert(
                    keys::IDENTIFIER.to_string(),
                    Value::String(fresh_identifier()),
                );
                start_input.insert(
                    keys::NAME.to_string(),
                    Value::String(format!("{name}{START_SUFFIX}")),
                );
                start_input.insert(
                    keys::EP_IDENTIFIER.to_string(),
                    Value::String(VALUE_TO_CONVERGE.to_string()),
                );
                start_input.insert(
                    keys::GROUP.to_string(),
                    Value::String("startValues".to_string()),
                );
                start_input.insert(keys::DATATYPE.to_string(), Value::String(datatype));
                start_input.insert(keys::METADATA.to_string(), Value::Object(metadata));
                start_inputs.push(Value::Object(start_input));
            }
            Some(OUTER_LOOP_DONE) => {
                transforms::tag_loop_role(endpoint, OUTER_LOOP_ENDPOINT);
                if let Some(metadata) = endpoint
                    .get_mut(keys::METADATA)
                    .and_then(Value::as_object_mut)
                {
                    metadata.insert(
                        INPUT_EXECUTION_CONSTRAINT.to_string(),
                        Value::String("Required".to_string()),
                    );
                }
            }
            _ => {}
        }
    }
    if !start_inputs.is_empty()
        && let Some(inputs) = doc.group_mut(EndpointGroup::DynamicInputs)
    {
        inputs.extend(start_inputs);
    }
    Ok(())
}

/// 5 -> 5.1: the not-converged behavior became configurable, and every loop
/// value gained a boolean twin reporting its convergence state.
fn add_auxiliary_converged_outputs(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    let node_id = doc.node_id();
    {
        let Some(config) = doc.configuration_mut() else {
            return Err(MigrationError::schema(node_id, "missing configuration object"));
        };
        config.insert("notConvergedIgnore".to_string(), Value::Bool(true));
        config.insert("notConvergedFail".to_string(), Value::Bool(false));
        config.insert("notConvergedNotAValue".to_string(), Value::Bool(false));
    }

    let mut auxiliary: Vec<(String, Map<String, Value>)> = Vec::new();
    for endpoint in doc.group(EndpointGroup::DynamicOutputs).into_iter().flatten() {
        let Some(name) = str_field(endpoint, keys::NAME) else {
            continue;
        };
        if str_field(endpoint, keys::EP_IDENTIFIER) == Some(VALUE_TO_CONVERGE)
            && !name.ends_with(CONVERGED_SUFFIX)
        {
            let mut metadata = Map::new();
            metadata.insert(
                LOOP_ENDPOINT_TYPE.to_string(),
                Value::String(SELF_LOOP_ENDPOINT.to_string()),
            );
            auxiliary.push((format!("{name}{IS_CONVERGED_SUFFIX}"), metadata));
        }
    }
    for (name, metadata) in auxiliary {
        transforms::add_dynamic_endpoint(
            doc,
            EndpointGroup::DynamicOutputs,
            &name,
            BOOLEAN,
            AUXILIARY,
            metadata,
        );
    }
    Ok(())
}

/// 5.1 -> 5.1.1: fault-tolerance settings moved to the shared loop-driver
/// keys.
fn normalize_fault_tolerance(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    transforms::normalize_loop_fault_tolerance(doc);
    Ok(())
}

/// 5.1.1 -> 6: the outer-loop-done plumbing disappeared, loop-role metadata
/// moved out of the persisted format, and the start/final phases of loop
/// values became distinct categories.
fn split_loop_value_categories(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    transforms::remove_endpoint_where(
        doc,
        EndpointGroup::StaticOutputs,
        keys::NAME,
        "Outer loop done",
    );
    transforms::remove_endpoint_where(
        doc,
        EndpointGroup::DynamicInputs,
        keys::EP_IDENTIFIER,
        OUTER_LOOP_DONE,
    );
    transforms::strip_endpoint_metadata_key(doc, LOOP_ENDPOINT_TYPE);
    transforms::reassign_endpoint_category(
        doc,
        EndpointGroup::DynamicInputs,
        TO_FORWARD,
        "startToForward",
        START_SUFFIX,
    );
    transforms::reassign_endpoint_category(
        doc,
        EndpointGroup::DynamicOutputs,
        TO_FORWARD,
        "finalToForward",
        CONVERGED_SUFFIX,
    );
    transforms::reassign_endpoint_category(
        doc,
        EndpointGroup::DynamicInputs,
        VALUE_TO_CONVERGE,
        "startToConverge",
        START_SUFFIX,
    );
    transforms::reassign_endpoint_category(
        doc,
        EndpointGroup::DynamicOutputs,
        VALUE_TO_CONVERGE,
        "finalToConverge",
        CONVERGED_SUFFIX,
    );
    Ok(())
}
