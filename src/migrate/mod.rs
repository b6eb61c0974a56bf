//! The workflow migration orchestrator: the end-to-end sequence that takes a
//! persisted workflow document of any historical format generation to the
//! current one while keeping nodes and connections consistent.

use std::sync::Arc;

use ahash::AHashSet;
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::{ComponentDocument, WorkflowDocument, keys};
use crate::error::MigrationError;
use crate::update::{
    ComponentUpdater, JsonValueCodec, MigrationContext, TypedValueCodec, UpdaterRegistry,
};
use crate::version::{
    BucketSet, CURRENT_WORKFLOW_VERSION, FormatBucket, FormatVersion, classify, older_than,
};

mod shape;

/// Strategy for connections whose endpoint cannot be resolved during the
/// name-to-identifier rewrite.
///
/// The permissive default keeps legacy documents loadable: a connection whose
/// endpoint was dropped or renamed during node migration gets a synthesized
/// placeholder endpoint instead of aborting the whole document. Strict mode
/// is for validation harnesses that must prove no document needs repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairPolicy {
    #[default]
    SynthesizeMissingEndpoint,
    Strict,
}

/// Migrates persisted workflow documents to the current format generation.
///
/// Migration of one document is a synchronous pipeline; the migrator holds no
/// mutable state between calls, so one instance can serve concurrent callers.
/// Either the fully migrated document is returned or the original input
/// remains the system of record; no partially migrated document ever escapes.
pub struct WorkflowMigrator {
    registry: UpdaterRegistry,
    ctx: MigrationContext,
    repair: RepairPolicy,
}

pub struct WorkflowMigratorBuilder {
    registry: UpdaterRegistry,
    codec: Box<dyn TypedValueCodec>,
    repair: RepairPolicy,
}

impl WorkflowMigratorBuilder {
    pub fn new() -> Self {
        Self {
            registry: UpdaterRegistry::with_defaults(),
            codec: Box::new(JsonValueCodec),
            repair: RepairPolicy::default(),
        }
    }

    /// Registers an additional component migration unit, overriding any
    /// built-in unit claiming the same component ids.
    pub fn with_updater(mut self, updater: Arc<dyn ComponentUpdater>) -> Self {
        self.registry.register(updater);
        self
    }

    /// Starts from an empty registry instead of the built-in units.
    pub fn without_default_updaters(mut self) -> Self {
        self.registry = UpdaterRegistry::new();
        self
    }

    pub fn with_repair_policy(mut self, repair: RepairPolicy) -> Self {
        self.repair = repair;
        self
    }

    /// Injects the typed-value serializer used by legacy transforms that fold
    /// plain literals into serialized values.
    pub fn with_value_codec(mut self, codec: Box<dyn TypedValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn build(self) -> WorkflowMigrator {
        WorkflowMigrator {
            registry: self.registry,
            ctx: MigrationContext::new(self.codec),
            repair: self.repair,
        }
    }
}

impl Default for WorkflowMigratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for WorkflowMigrator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl WorkflowMigrator {
    pub fn builder() -> WorkflowMigratorBuilder {
        WorkflowMigratorBuilder::new()
    }

    /// Migrates a persisted workflow document to the current format
    /// generation and returns its pretty-printed text form.
    ///
    /// Re-running on an already-current document is a no-op apart from
    /// re-serialization.
    pub fn migrate(&self, text: &str) -> Result<String, MigrationError> {
        let mut doc = WorkflowDocument::from_str(text)?;
        let version = self.validate(&doc)?;
        let pre_structured = classify(version.as_ref(), true).contains(FormatBucket::ForVersion3);

        // "Before" snapshot; endpoints removed by any update step are joined
        // against this set when reconciling connections at the end.
        let before = doc.endpoint_identifiers();

        self.component_pass(&mut doc, FormatBucket::BeforeVersion3, false)?;
        self.component_pass(&mut doc, FormatBucket::BeforeVersion3, true)?;

        if pre_structured {
            shape::structure_nodes(&mut doc)?;
        }

        self.component_pass(&mut doc, FormatBucket::ForVersion3, false)?;
        self.component_pass(&mut doc, FormatBucket::ForVersion3, true)?;

        if pre_structured {
            shape::rewire_connections(&mut doc, self.repair)?;
        }

        self.component_pass(&mut doc, FormatBucket::AfterVersion3, false)?;
        self.component_pass(&mut doc, FormatBucket::AfterVersion3, true)?;

        let after = doc.endpoint_identifiers();
        let removed: AHashSet<String> = before.difference(&after).cloned().collect();
        remove_dangling_connections(&mut doc, &removed);

        doc.set_version(CURRENT_WORKFLOW_VERSION);
        doc.to_pretty_string()
    }

    /// Whether a migration pass would change this document.
    ///
    /// The silent flavor (`interactive == false`) is what a loader consults
    /// before migrating automatically; the interactive flavor is what a
    /// frontend consults before prompting the user and writing a backup —
    /// both of which happen outside this crate.
    pub fn needs_migration(&self, text: &str, interactive: bool) -> Result<bool, MigrationError> {
        let doc = WorkflowDocument::from_str(text)?;
        let version = self.validate(&doc)?;
        if !classify(version.as_ref(), interactive).is_empty() {
            return Ok(true);
        }
        if !interactive && version.as_ref().is_none_or(|v| {
            FormatVersion::parse(CURRENT_WORKFLOW_VERSION).is_some_and(|current| *v < current)
        }) {
            return Ok(true);
        }
        for node in doc.nodes().into_iter().flatten() {
            let component = ComponentDocument::from_value(node.clone())?;
            let Some(unit) = component
                .component_id()
                .and_then(|id| self.registry.lookup(id))
            else {
                continue;
            };
            if !unit
                .affected_buckets(component.version(), interactive)
                .is_empty()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rejects documents this engine cannot migrate: unparseable version
    /// strings and versions newer than the current format generation, on the
    /// workflow itself and on every node with a registered unit.
    fn validate(&self, doc: &WorkflowDocument) -> Result<Option<FormatVersion>, MigrationError> {
        let version = match doc.version() {
            Some(raw) => Some(parse_known_version(raw, CURRENT_WORKFLOW_VERSION)?),
            None => None,
        };

        for node in doc.nodes().into_iter().flatten() {
            let component = ComponentDocument::from_value(node.clone())?;
            let Some(unit) = component
                .component_id()
                .and_then(|id| self.registry.lookup(id))
            else {
                continue;
            };
            if let Some(raw) = component.version() {
                parse_known_version(raw, unit.current_version())?;
            }
        }
        Ok(version)
    }

    /// Runs one `(bucket, mode)` stage over every node. Nodes without a
    /// registered unit, and nodes whose unit reports no work for this bucket
    /// and mode, pass through untouched.
    fn component_pass(
        &self,
        doc: &mut WorkflowDocument,
        bucket: FormatBucket,
        interactive: bool,
    ) -> Result<(), MigrationError> {
        let components = doc.take_components()?;
        if components.is_empty() {
            return Ok(());
        }
        let mut migrated: Vec<Value> = Vec::with_capacity(components.len());
        for mut component in components {
            let unit = component
                .component_id()
                .and_then(|id| self.registry.lookup(id))
                .cloned();
            if let Some(unit) = unit {
                let buckets: BucketSet = unit.affected_buckets(component.version(), interactive);
                if buckets.contains(bucket) {
                    unit.apply(bucket, interactive, &mut component, &self.ctx)?;
                }
            }
            migrated.push(component.into_value());
        }
        doc.set_nodes(migrated);
        Ok(())
    }
}

fn parse_known_version(raw: &str, current: &str) -> Result<FormatVersion, MigrationError> {
    let unknown = || MigrationError::UnknownVersion {
        version: raw.to_string(),
        current: current.to_string(),
    };
    let version = FormatVersion::parse(raw).ok_or_else(unknown)?;
    if older_than(current, raw) {
        return Err(unknown());
    }
    Ok(version)
}

/// Deletes every connection referencing an endpoint identifier that update
/// steps removed. An expected, non-fatal repair: it is logged, not raised.
fn remove_dangling_connections(doc: &mut WorkflowDocument, removed: &AHashSet<String>) {
    if removed.is_empty() {
        return;
    }
    debug!(
        removed = %removed.iter().sorted().join(", "),
        "reconciling connections against removed endpoints"
    );
    let Some(connections) = doc.connections_mut() else {
        return;
    };
    connections.retain(|connection| {
        let references_removed = [keys::INPUT, keys::OUTPUT].iter().any(|key| {
            connection
                .get(*key)
                .and_then(Value::as_str)
                .is_some_and(|id| removed.contains(id))
        });
        if references_removed {
            warn!(
                source = connection.get(keys::SOURCE).and_then(|v| v.as_str()),
                target = connection.get(keys::TARGET).and_then(|v| v.as_str()),
                "dropping connection to endpoint removed during migration"
            );
        }
        !references_removed
    });
}
