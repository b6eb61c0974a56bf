use std::sync::Arc;

use ahash::AHashMap;
use tracing::debug;

use crate::document::ComponentDocument;
use crate::error::MigrationError;
use crate::version::{BucketSet, FormatBucket, same_version};

pub mod converger;
pub mod optimizer;
pub mod transforms;

pub use converger::ConvergerUpdater;
pub use optimizer::OptimizerUpdater;

/// A single-step transform between two adjacent schema versions of one
/// component type.
pub type StepFn = fn(&mut ComponentDocument, &MigrationContext) -> Result<(), MigrationError>;

/// Contract of one component migration unit: which component types it
/// applies to, which format buckets still require work for a given document
/// version, and the transform chain itself.
///
/// Units must be pure with respect to cross-call state and must not consult
/// or mutate sibling nodes; everything document-wide belongs to the
/// orchestrator.
pub trait ComponentUpdater: Send + Sync {
    /// All component type identifiers this unit applies to, including
    /// historical aliases.
    fn component_ids(&self) -> &[&'static str];

    /// The newest schema version this unit migrates to.
    fn current_version(&self) -> &'static str;

    /// The buckets in which [`apply`](Self::apply) has work left for a
    /// document at `version`. Pure.
    fn affected_buckets(&self, version: Option<&str>, interactive: bool) -> BucketSet;

    /// Runs this unit's transform chain for one bucket on one node document.
    fn apply(
        &self,
        bucket: FormatBucket,
        interactive: bool,
        doc: &mut ComponentDocument,
        ctx: &MigrationContext,
    ) -> Result<(), MigrationError>;
}

/// One rung of a [`VersionLadder`].
pub struct VersionStep {
    pub source: &'static str,
    pub target: &'static str,
    pub apply: StepFn,
}

/// An ordered chain of single-step transforms.
///
/// `run` locates the first step whose source version equals the document's
/// current version and then applies every later step unconditionally, so a
/// single invocation always advances the document to the chain's newest
/// version. The ladder, not the individual step, stamps the new component
/// version after each step; versions therefore only ever increase.
pub struct VersionLadder {
    steps: Vec<VersionStep>,
}

impl VersionLadder {
    pub fn new(steps: Vec<VersionStep>) -> Self {
        debug_assert!(
            steps
                .windows(2)
                .all(|pair| same_version(pair[0].target, pair[1].source)),
            "ladder steps must be contiguous"
        );
        Self { steps }
    }

    /// The version the full ladder lands on, or `None` for an empty ladder.
    pub fn newest_version(&self) -> Option<&'static str> {
        self.steps.last().map(|step| step.target)
    }

    /// Runs the full fall-through chain from the document's current version.
    pub fn run(
        &self,
        doc: &mut ComponentDocument,
        ctx: &MigrationContext,
    ) -> Result<(), MigrationError> {
        self.run_until(doc, ctx, None)
    }

    /// Like [`run`](Self::run), but stops once `stop_after` has been reached.
    /// Used for silent passes that only cover a span of the chain.
    pub fn run_until(
        &self,
        doc: &mut ComponentDocument,
        ctx: &MigrationContext,
        stop_after: Option<&str>,
    ) -> Result<(), MigrationError> {
        let Some(version) = doc.version().map(str::to_string) else {
            return Ok(());
        };
        let Some(start) = self
            .steps
            .iter()
            .position(|step| same_version(step.source, &version))
        else {
            // Already at (or beyond) the newest version, or at an
            // intermediate spelling no step starts from.
            return Ok(());
        };
        for step in &self.steps[start..] {
            (step.apply)(doc, ctx).map_err(|err| annotate(err, step, doc))?;
            doc.set_version(step.target);
            debug!(
                node = %doc.node_id(),
                from = step.source,
                to = step.target,
                "applied component update step"
            );
            if stop_after.is_some_and(|stop| same_version(step.target, stop)) {
                break;
            }
        }
        Ok(())
    }
}

/// Fills ladder step context into schema errors raised by a step function.
fn annotate(err: MigrationError, step: &VersionStep, doc: &ComponentDocument) -> MigrationError {
    match err {
        MigrationError::Schema {
            node_id,
            step: raised_in,
            message,
        } => MigrationError::Schema {
            node_id: if node_id == "?" { doc.node_id() } else { node_id },
            step: if raised_in == "-" {
                format!("{} -> {}", step.source, step.target)
            } else {
                raised_in
            },
            message,
        },
        other => other,
    }
}

/// Serializes raw literals into the current typed-value representation.
///
/// The real codec lives outside this crate; it is injected so that legacy
/// transforms folding deprecated plain literals into serialized values never
/// reach for global state.
pub trait TypedValueCodec: Send + Sync {
    fn encode_float(&self, value: f64) -> String;
}

/// Default codec encoding values as compact tagged JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonValueCodec;

impl TypedValueCodec for JsonValueCodec {
    fn encode_float(&self, value: f64) -> String {
        serde_json::json!({ "t": "Float", "v": value }).to_string()
    }
}

/// Per-migration dependencies threaded through to every update step.
pub struct MigrationContext {
    codec: Box<dyn TypedValueCodec>,
}

impl MigrationContext {
    pub fn new(codec: Box<dyn TypedValueCodec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &dyn TypedValueCodec {
        self.codec.as_ref()
    }
}

impl Default for MigrationContext {
    fn default() -> Self {
        Self::new(Box::new(JsonValueCodec))
    }
}

/// Lookup table from component type identifier to its migration unit.
#[derive(Default)]
pub struct UpdaterRegistry {
    updaters: AHashMap<String, Arc<dyn ComponentUpdater>>,
}

impl UpdaterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in component migration units.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ConvergerUpdater::new()));
        registry.register(Arc::new(OptimizerUpdater::new()));
        registry
    }

    /// Registers a unit under every component id it declares. A later
    /// registration for the same id wins, which is how callers override a
    /// built-in unit.
    pub fn register(&mut self, updater: Arc<dyn ComponentUpdater>) {
        for id in updater.component_ids() {
            self.updaters.insert((*id).to_string(), Arc::clone(&updater));
        }
    }

    pub fn lookup(&self, component_id: &str) -> Option<&Arc<dyn ComponentUpdater>> {
        self.updaters.get(component_id)
    }

    pub fn is_empty(&self) -> bool {
        self.updaters.is_empty()
    }
}
