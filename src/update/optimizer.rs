//! Migration unit for the optimizer component, the loop driver searching a
//! design space for optimal values.
//!
//! Method-specific solver settings (the algorithm catalogs embedded in the
//! configuration) are component business logic and are not touched here;
//! the unit migrates the endpoint and scheduling schema only.

use serde_json::{Map, Value};

use super::{
    ComponentUpdater, MigrationContext, VersionLadder, VersionStep,
    transforms::{self, OUTER_LOOP_ENDPOINT, SELF_LOOP_ENDPOINT, fresh_identifier},
};
use crate::document::component::str_field;
use crate::document::{ComponentDocument, EndpointGroup, keys};
use crate::error::MigrationError;
use crate::version::{BucketSet, FormatBucket, older_than};

const COMPONENT_IDS: &[&str] = &["optimizer", "components.optimizer.Optimizer"];

const CURRENT_VERSION: &str = "7.0";

/// Dynamic-endpoint categories of the optimizer.
const DESIGN: &str = "Design";

const OBJECTIVE: &str = "Objective";

const CONSTRAINT: &str = "Constraint";

const OPTIMA: &str = "optima";

const GRADIENTS: &str = "gradients";

/// Marker embedded in the names of gradient endpoints (`∂f.x`).
const GRADIENT_DELTA: &str = "∂";

const OPTIMAL_SUFFIX: &str = "_optimal";

pub struct OptimizerUpdater {
    ladder: VersionLadder,
}

impl OptimizerUpdater {
    pub fn new() -> Self {
        Self {
            ladder: VersionLadder::new(vec![
                VersionStep {
                    source: "3.0",
                    target: "5.0",
                    apply: synthesize_optimal_outputs,
                },
                VersionStep {
                    source: "5.0",
                    target: "5.1",
                    apply: retag_gradient_inputs,
                },
                VersionStep {
                    source: "5.1",
                    target: "6.0",
                    apply: rewrite_scheduling_and_request_output,
                },
                VersionStep {
                    source: "6.0",
                    target: "6.1",
                    apply: drop_solve_for_goal,
                },
                VersionStep {
                    source: "6.1",
                    target: "6.2",
                    apply: drop_static_output_categories,
                },
                VersionStep {
                    source: "6.2",
                    target: "7.0",
                    apply: tag_loop_roles,
                },
            ]),
        }
    }
}

impl Default for OptimizerUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentUpdater for OptimizerUpdater {
    fn component_ids(&self) -> &[&'static str] {
        COMPONENT_IDS
    }

    fn current_version(&self) -> &'static str {
        CURRENT_VERSION
    }

    fn affected_buckets(&self, version: Option<&str>, interactive: bool) -> BucketSet {
        let mut buckets = BucketSet::NONE;
        if interactive {
            if version.is_some_and(|v| older_than(v, "3.0")) {
                buckets.insert(FormatBucket::ForVersion3);
            }
            if version.is_some_and(|v| older_than(v, CURRENT_VERSION)) {
                buckets.insert(FormatBucket::AfterVersion3);
            }
        } else if version.is_some_and(|v| older_than(v, "6.2")) {
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
            FormatBucket::ForVersion3 if interactive => {
                structured_update(doc)?;
                doc.set_version("3.0");
                Ok(())
            }
            FormatBucket::AfterVersion3 => {
                if interactive {
                    self.ladder.run(doc, ctx)
                } else {
                    self.ladder.run_until(doc, ctx, Some("6.2"))
                }
            }
            _ => Ok(()),
        }
    }
}

/// Documents between 1.0 and 3.0: dynamic endpoints predate category tags.
/// Outputs are design variables; inputs are classified as objectives or
/// constraints from their weight metadata, with goal codes rewritten to the
/// current labels.
fn structured_update(doc: &mut ComponentDocument) -> Result<(), MigrationError> {
    transforms::backfill_dynamic_endpoint_category(doc, EndpointGroup::DynamicOutputs, DESIGN);

    let input_names: Vec<String> = doc
        .group(EndpointGroup::DynamicInputs)
        .into_iter()
        .flatten()
        .filter_map(|endpoint| str_field(endpoint, keys::NAME))
        .map(str::to_string)
        .collect();

    for endpoint in doc
        .group_mut(EndpointGroup::DynamicInputs)
        .into_iter()
        .flatten()
    {
        let unset = match endpoint.get(keys::EP_IDENTIFIER) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text == "null",
            _ => false,
        };
        if !unset {
            continue;
        }
        let name = str_field(endpoint, keys::NAME).unwrap_or_default().to_string();
        let Some(fields) = endpoint.as_object_mut() else {
            continue;
        };
        let category = match fields.get_mut(keys::METADATA).and_then(Value::as_object_mut) {
            Some(metadata) => {
                let weighted = metadata.get("weight").and_then(Value::as_str) != Some("NaN");
                normalize_goal(metadata);
                let gradient_requested = input_names
                    .iter()
                    .any(|other| other.contains(&format!("{GRADIENT_DELTA}{name}.")));
                metadata.insert("hasGradient".to_string(), Value::Bool(gradient_requested));
                if weighted { OBJECTIVE } else { CONSTRAINT }
            }
            // Gradient inputs carry no weight metadata of their own; they
            // follow their function in a later generation.
            None => CONSTRAINT,
        };
        fields.insert(
            keys::EP_IDENTIFIER.to_string(),
            Value::String(category.to_string()),
        );
    }
    Ok(())
}

fn normalize_goal(metadata: &mut Map<String, Value>) {
    let label = match metadata.get("goal").and_then(Value::as_str) {
        Some("0") => "Minimize",
        Some("1") => "Maximize",
        Some(_) => "Solve for",
        None => return,
    };
    metadata.insert("goal".to_string(), Value::String(label.to_string()));
}

/// 3.0 -> 5.0: every design variable gained an `_optimal` twin reporting the
/// optimum found, and loop values start from their declared start value.
fn synthesize_optimal_outputs(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    let existing: Vec<String> = doc
        .group(EndpointGroup::DynamicOutputs)
        .into_iter()
        .flatten()
        .filter_map(|endpoint| str_field(endpoint, keys::NAME))
        .map(str::to_string)
        .collect();

    let mut twins: Vec<Value> = Vec::new();
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicOutputs)
        .into_iter()
        .flatten()
    {
        let Some(name) = str_field(endpoint, keys::NAME).map(str::to_string) else {
            continue;
        };
        let twin_name = format!("{name}{OPTIMAL_SUFFIX}");
        if !existing.contains(&twin_name) {
            let mut twin = endpoint.as_object().cloned().unwrap_or_default();
            twin.insert(
                keys::IDENTIFIER.to_string(),
                Value::String(fresh_identifier()),
            );
            twin.insert(keys::NAME.to_string(), Value::String(twin_name));
            twin.insert(
                keys::EP_IDENTIFIER.to_string(),
                Value::String(OPTIMA.to_string()),
            );
            twins.push(Value::Object(twin));
        }
        if let Some(metadata) = endpoint
            .get_mut(keys::METADATA)
            .and_then(Value::as_object_mut)
        {
            metadata.insert("hasStartValue".to_string(), Value::Bool(true));
        }
    }
    if !twins.is_empty()
        && let Some(outputs) = doc.group_mut(EndpointGroup::DynamicOutputs)
    {
        outputs.extend(twins);
    }
    Ok(())
}

/// 5.0 -> 5.1: gradient inputs became their own category.
fn retag_gradient_inputs(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicInputs)
        .into_iter()
        .flatten()
    {
        if str_field(endpoint, keys::NAME).is_some_and(|name| name.contains(GRADIENT_DELTA))
            && let Some(fields) = endpoint.as_object_mut()
        {
            fields.insert(
                keys::EP_IDENTIFIER.to_string(),
                Value::String(GRADIENTS.to_string()),
            );
        }
    }
    Ok(())
}

/// 5.1 -> 6.0: the legacy `usage` tag was replaced by explicit scheduling
/// metadata, the nested-loop flag moved, and the solver's gradient request
/// became a visible static output.
fn rewrite_scheduling_and_request_output(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    transforms::rewrite_usage_as_scheduling(doc);
    transforms::rename_nested_loop_config(doc);

    if let Some(outputs) = doc.group_mut(EndpointGroup::StaticOutputs) {
        let mut request = Map::new();
        request.insert(
            keys::IDENTIFIER.to_string(),
            Value::String(fresh_identifier()),
        );
        request.insert(
            keys::NAME.to_string(),
            Value::String("Gradient request".to_string()),
        );
        request.insert(keys::EP_IDENTIFIER.to_string(), Value::Null);
        request.insert(
            keys::DATATYPE.to_string(),
            Value::String("Boolean".to_string()),
        );
        outputs.push(Value::Object(request));

        for endpoint in outputs {
            if str_field(endpoint, keys::NAME) == Some("Iteration count")
                && let Some(fields) = endpoint.as_object_mut()
            {
                fields.insert(
                    keys::NAME.to_string(),
                    Value::String("Iteration".to_string()),
                );
            }
        }
    }
    Ok(())
}

/// 6.0 -> 6.1: the "Solve for" goal was retired; affected inputs become
/// plain minimization objectives.
fn drop_solve_for_goal(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicInputs)
        .into_iter()
        .flatten()
    {
        if let Some(metadata) = endpoint
            .get_mut(keys::METADATA)
            .and_then(Value::as_object_mut)
            && metadata.get("goal").and_then(Value::as_str) == Some("Solve for")
        {
            metadata.insert("goal".to_string(), Value::String("Minimize".to_string()));
            metadata.shift_remove("solve");
        }
    }
    Ok(())
}

/// 6.1 -> 6.2: static outputs never had meaningful categories; the loop-done
/// output got its shared name.
fn drop_static_output_categories(
    doc: &mut ComponentDocument,
    _ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    for endpoint in doc
        .group_mut(EndpointGroup::StaticOutputs)
        .into_iter()
        .flatten()
    {
        if let Some(fields) = endpoint.as_object_mut() {
            fields.shift_remove(keys::EP_IDENTIFIER);
            if fields.get(keys::NAME).and_then(Value::as_str) == Some("Optimizer is finished") {
                fields.insert(keys::NAME.to_string(), Value::String("Done".to_string()));
            }
        }
    }
    Ok(())
}

/// 6.2 -> 7.0: loop-role metadata for every endpoint the loop driver shares
/// with its surrounding loop.
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
            Some("Iteration") | Some("Gradient request") => Some(SELF_LOOP_ENDPOINT),
            Some("Done") => Some(OUTER_LOOP_ENDPOINT),
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
        let role = match str_field(endpoint, keys::EP_IDENTIFIER) {
            Some(DESIGN) => Some(SELF_LOOP_ENDPOINT),
            Some(OPTIMA) => Some(OUTER_LOOP_ENDPOINT),
            _ => None,
        };
        if let Some(role) = role {
            transforms::tag_loop_role(endpoint, role);
        }
    }
    for endpoint in doc
        .group_mut(EndpointGroup::DynamicInputs)
        .into_iter()
        .flatten()
    {
        let role = match str_field(endpoint, keys::EP_IDENTIFIER) {
            Some(OBJECTIVE) | Some(CONSTRAINT) | Some(GRADIENTS) => Some(SELF_LOOP_ENDPOINT),
            Some("startvalues") | Some("outerLoopDone") => Some(OUTER_LOOP_ENDPOINT),
            _ => None,
        };
        if let Some(role) = role {
            transforms::tag_loop_role(endpoint, role);
        }
    }
    Ok(())
}
