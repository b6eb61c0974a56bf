//! Tests for the built-in component migration units and the ladder contract.
mod common;
use common::*;
use kaitei::document::ComponentDocument;
use kaitei::prelude::*;
use serde_json::json;

fn component(tree: serde_json::Value) -> ComponentDocument {
    ComponentDocument::from_value(tree).expect("valid component document")
}

fn converger_at(version: &str) -> serde_json::Value {
    let mut node = structured_node("n1", "converger", version);
    push_endpoint(
        &mut node,
        "dynamicOutputs",
        dynamic_endpoint("out-y", "y", "Float", "valueToConverge"),
    );
    push_endpoint(
        &mut node,
        "dynamicOutputs",
        dynamic_endpoint("out-yc", "y_converged", "Float", "valueToConverge"),
    );
    push_endpoint(
        &mut node,
        "dynamicInputs",
        dynamic_endpoint("in-y", "y", "Float", "valueToConverge"),
    );
    node
}

#[test]
fn test_converger_buckets_by_version() {
    let updater = ConvergerUpdater::new();

    let none = updater.affected_buckets(None, true);
    assert!(none.contains(FormatBucket::BeforeVersion3));
    assert!(!none.contains(FormatBucket::ForVersion3));

    let legacy = updater.affected_buckets(Some("0.0"), true);
    assert!(legacy.contains(FormatBucket::BeforeVersion3));
    assert!(legacy.contains(FormatBucket::ForVersion3));
    assert!(legacy.contains(FormatBucket::AfterVersion3));

    let structured = updater.affected_buckets(Some("3.2"), true);
    assert!(!structured.contains(FormatBucket::BeforeVersion3));
    assert!(!structured.contains(FormatBucket::ForVersion3));
    assert!(structured.contains(FormatBucket::AfterVersion3));

    assert!(updater.affected_buckets(Some("6"), true).is_empty());

    // The silent pass only covers the confirmation-free span.
    assert!(updater.affected_buckets(Some("4.1"), false).is_empty());
    assert!(
        updater
            .affected_buckets(Some("5"), false)
            .contains(FormatBucket::AfterVersion3)
    );
    assert!(updater.affected_buckets(Some("5.1.1"), false).is_empty());
}

#[test]
fn test_converger_ladder_reaches_current_version() {
    let updater = ConvergerUpdater::new();
    let ctx = MigrationContext::default();
    let mut doc = component(converger_at("3.0"));
    updater
        .apply(FormatBucket::AfterVersion3, true, &mut doc, &ctx)
        .expect("ladder applies");
    assert_eq!(doc.version(), Some("6"));
}

#[test]
fn test_converger_silent_pass_stops_at_confirmation_boundary() {
    let updater = ConvergerUpdater::new();
    let ctx = MigrationContext::default();
    let mut doc = component(converger_at("5"));
    updater
        .apply(FormatBucket::AfterVersion3, false, &mut doc, &ctx)
        .expect("silent span applies");
    assert_eq!(doc.version(), Some("5.1.1"));

    // The interactive pass finishes the chain.
    updater
        .apply(FormatBucket::AfterVersion3, true, &mut doc, &ctx)
        .expect("interactive pass applies");
    assert_eq!(doc.version(), Some("6"));
}

#[test]
fn test_converger_ladder_is_noop_at_current_version() {
    let updater = ConvergerUpdater::new();
    let ctx = MigrationContext::default();
    let mut doc = component(converger_at("6"));
    let before = doc.clone();
    updater
        .apply(FormatBucket::AfterVersion3, true, &mut doc, &ctx)
        .expect("no step fires");
    assert_eq!(doc, before);
}

#[test]
fn test_converger_ladder_from_41_synthesizes_phase_endpoints() {
    let updater = ConvergerUpdater::new();
    let ctx = MigrationContext::default();
    let mut doc = component(converger_at("4.1"));
    updater
        .apply(FormatBucket::AfterVersion3, true, &mut doc, &ctx)
        .expect("ladder applies");
    let node = doc.into_value();

    // 4.1 -> 5 adds an outer-loop start input for the loop value.
    let start = endpoint_named(&node, "dynamicInputs", "y_start").expect("start input exists");
    assert_eq!(start["epIdentifier"], "startToConverge");
    assert_eq!(start["group"], "startValues");
    assert_eq!(start["datatype"], "Float");

    // 5 -> 5.1 adds the boolean convergence twin.
    let twin =
        endpoint_named(&node, "dynamicOutputs", "y_is_converged").expect("auxiliary output exists");
    assert_eq!(twin["epIdentifier"], "auxiliary");
    assert_eq!(twin["datatype"], "Boolean");

    // 5.1.1 -> 6 splits the loop-value phases into their own categories.
    let converged = endpoint_named(&node, "dynamicOutputs", "y_converged").expect("twin exists");
    assert_eq!(converged["epIdentifier"], "finalToConverge");
    let plain = endpoint_named(&node, "dynamicOutputs", "y").expect("output exists");
    assert_eq!(plain["epIdentifier"], "valueToConverge");

    // Loop-role metadata was introduced at 4.1 -> 5 and retired at 5.1.1 -> 6.
    assert!(plain["metadata"].get("loopEndpointType").is_none());

    assert_eq!(node["component"]["version"], "6");
}

#[test]
fn test_converger_start_value_fold_uses_injected_codec() {
    struct MarkerCodec;
    impl TypedValueCodec for MarkerCodec {
        fn encode_float(&self, value: f64) -> String {
            format!("typed<{value}>")
        }
    }

    let updater = ConvergerUpdater::new();
    let ctx = MigrationContext::new(Box::new(MarkerCodec));
    let mut node = structured_node("n1", "converger", "3.1");
    push_endpoint(
        &mut node,
        "dynamicInputs",
        json!({
            "name": "y",
            "datatype": "Float",
            "identifier": "in-y",
            "epIdentifier": "valueToConverge",
            "metadata": { "hasStartValue": "true", "startValue": "4.5" }
        }),
    );
    let mut doc = component(node);
    updater
        .apply(FormatBucket::AfterVersion3, true, &mut doc, &ctx)
        .expect("ladder applies");
    let node = doc.into_value();
    let input = endpoint_named(&node, "dynamicInputs", "y").expect("input exists");
    assert_eq!(input["metadata"]["initValue"], "typed<4.5>");
}

#[test]
fn test_converger_schema_error_carries_step_context() {
    let updater = ConvergerUpdater::new();
    let ctx = MigrationContext::default();
    // No configuration object: the 3.0 -> 3.1 step cannot apply.
    let mut node = structured_node("n1", "converger", "3.0");
    node.as_object_mut().unwrap().remove("configuration");
    let mut doc = component(node);
    let err = updater
        .apply(FormatBucket::AfterVersion3, true, &mut doc, &ctx)
        .expect_err("missing configuration fails");
    match err {
        MigrationError::Schema { node_id, step, .. } => {
            assert_eq!(node_id, "n1");
            assert_eq!(step, "3.0 -> 3.1");
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn test_converger_version3_bucket_backfills_categories() {
    let updater = ConvergerUpdater::new();
    let ctx = MigrationContext::default();
    let mut node = structured_node("n1", "converger", "1.0");
    push_endpoint(
        &mut node,
        "dynamicInputs",
        json!({ "name": "v", "datatype": "Float", "identifier": "in-v", "epIdentifier": null }),
    );
    push_endpoint(
        &mut node,
        "dynamicInputs",
        json!({ "name": "done", "datatype": "Boolean", "identifier": "in-d", "epIdentifier": null }),
    );
    push_endpoint(
        &mut node,
        "dynamicOutputs",
        json!({ "name": "v", "datatype": "Float", "identifier": "out-v" }),
    );
    let mut doc = component(node);
    updater
        .apply(FormatBucket::ForVersion3, true, &mut doc, &ctx)
        .expect("update applies");
    assert_eq!(doc.version(), Some("3.0"));
    let node = doc.into_value();

    // Categories are derived from the datatype for inputs; outputs all carry
    // the loop-value category.
    assert_eq!(
        endpoint_named(&node, "dynamicInputs", "v").unwrap()["epIdentifier"],
        "valueToConverge"
    );
    assert_eq!(
        endpoint_named(&node, "dynamicInputs", "done").unwrap()["epIdentifier"],
        "outerLoopDone"
    );
    assert_eq!(
        endpoint_named(&node, "dynamicOutputs", "v").unwrap()["epIdentifier"],
        "valueToConverge"
    );

    // The static convergence endpoints appear exactly once.
    for name in ["Converged", "Converged absolute", "Converged relative"] {
        assert!(endpoint_named(&node, "staticOutputs", name).is_some());
    }
    assert!(endpoint_named(&node, "staticInputs", "outerLoopDone").is_some());
}

#[test]
fn test_optimizer_ladder_reaches_current_version() {
    let updater = OptimizerUpdater::new();
    let ctx = MigrationContext::default();
    let mut node = structured_node("n1", "optimizer", "3.0");
    push_endpoint(
        &mut node,
        "dynamicOutputs",
        dynamic_endpoint("out-x", "x", "Float", "Design"),
    );
    push_endpoint(
        &mut node,
        "staticOutputs",
        static_endpoint("out-it", "Iteration count", "Integer"),
    );
    push_endpoint(
        &mut node,
        "staticOutputs",
        static_endpoint("out-fin", "Optimizer is finished", "Boolean"),
    );
    let mut doc = component(node);
    updater
        .apply(FormatBucket::AfterVersion3, true, &mut doc, &ctx)
        .expect("ladder applies");
    assert_eq!(doc.version(), Some("7.0"));
    let node = doc.into_value();

    // 3.0 -> 5.0 synthesizes the optimum twin.
    let twin = endpoint_named(&node, "dynamicOutputs", "x_optimal").expect("twin exists");
    assert_eq!(twin["epIdentifier"], "optima");
    assert_eq!(twin["metadata"]["loopEndpointType"], "OuterLoopEndpoint");

    // 5.1 -> 6.0 renames and extends the static outputs.
    assert!(endpoint_named(&node, "staticOutputs", "Iteration").is_some());
    assert!(endpoint_named(&node, "staticOutputs", "Gradient request").is_some());
    // 6.1 -> 6.2 renames the loop-done output.
    assert!(endpoint_named(&node, "staticOutputs", "Done").is_some());
    assert!(endpoint_named(&node, "staticOutputs", "Optimizer is finished").is_none());

    // 6.2 -> 7.0 tags loop roles.
    let design = endpoint_named(&node, "dynamicOutputs", "x").unwrap();
    assert_eq!(design["metadata"]["loopEndpointType"], "SelfLoopEndpoint");
}

#[test]
fn test_optimizer_silent_pass_stops_before_loop_role_tagging() {
    let updater = OptimizerUpdater::new();
    let ctx = MigrationContext::default();
    let mut doc = component(structured_node("n1", "optimizer", "5.0"));
    updater
        .apply(FormatBucket::AfterVersion3, false, &mut doc, &ctx)
        .expect("silent span applies");
    assert_eq!(doc.version(), Some("6.2"));
}

#[test]
fn test_optimizer_version3_bucket_classifies_inputs() {
    let updater = OptimizerUpdater::new();
    let ctx = MigrationContext::default();
    let mut node = structured_node("n1", "optimizer", "1.0");
    push_endpoint(
        &mut node,
        "dynamicInputs",
        json!({
            "name": "f",
            "datatype": "Float",
            "identifier": "in-f",
            "metadata": { "weight": "1.0", "goal": "0" }
        }),
    );
    push_endpoint(
        &mut node,
        "dynamicInputs",
        json!({
            "name": "g",
            "datatype": "Float",
            "identifier": "in-g",
            "metadata": { "weight": "NaN", "goal": "1" }
        }),
    );
    push_endpoint(
        &mut node,
        "dynamicOutputs",
        json!({ "name": "x", "datatype": "Float", "identifier": "out-x" }),
    );
    let mut doc = component(node);
    updater
        .apply(FormatBucket::ForVersion3, true, &mut doc, &ctx)
        .expect("update applies");
    assert_eq!(doc.version(), Some("3.0"));
    let node = doc.into_value();

    let objective = endpoint_named(&node, "dynamicInputs", "f").unwrap();
    assert_eq!(objective["epIdentifier"], "Objective");
    assert_eq!(objective["metadata"]["goal"], "Minimize");

    let constraint = endpoint_named(&node, "dynamicInputs", "g").unwrap();
    assert_eq!(constraint["epIdentifier"], "Constraint");
    assert_eq!(constraint["metadata"]["goal"], "Maximize");

    assert_eq!(
        endpoint_named(&node, "dynamicOutputs", "x").unwrap()["epIdentifier"],
        "Design"
    );
}

#[test]
fn test_custom_updater_registration_overrides_builtin() {
    struct PinningUpdater;
    impl ComponentUpdater for PinningUpdater {
        fn component_ids(&self) -> &[&'static str] {
            &["converger"]
        }
        fn current_version(&self) -> &'static str {
            "6"
        }
        fn affected_buckets(&self, _version: Option<&str>, _interactive: bool) -> BucketSet {
            BucketSet::NONE
        }
        fn apply(
            &self,
            _bucket: FormatBucket,
            _interactive: bool,
            _doc: &mut ComponentDocument,
            _ctx: &MigrationContext,
        ) -> std::result::Result<(), MigrationError> {
            Ok(())
        }
    }

    let mut registry = UpdaterRegistry::with_defaults();
    registry.register(std::sync::Arc::new(PinningUpdater));
    let unit = registry.lookup("converger").expect("registered");
    assert!(unit.affected_buckets(Some("3.0"), true).is_empty());

    // The historical alias still resolves to the built-in unit.
    assert!(registry.lookup("components.converger.Converger").is_some());
}
