//! # Kaitei - Workflow Document Migration Engine
//!
//! **Kaitei** upgrades persisted, graph-structured workflow definitions —
//! typed node documents connected by typed links — through an ordered chain
//! of schema transformations, one per historical format generation, while
//! preserving referential integrity between nodes and connections.
//!
//! ## Core Workflow
//!
//! The engine operates on the JSON tree of a persisted workflow document.
//! The primary workflow is:
//!
//! 1.  **Load Your Document**: Read the persisted workflow text (the engine
//!     does no file I/O itself).
//! 2.  **Check**: Ask [`WorkflowMigrator::needs_migration`] whether a silent
//!     (automatic) or interactive (user-confirmed) pass would change the
//!     document. Prompting and backup files are the caller's concern.
//! 3.  **Migrate**: [`WorkflowMigrator::migrate`] classifies the document
//!     version into format buckets, dispatches every node to its component
//!     migration unit per bucket, performs the two document-wide shape
//!     transforms bridging the flat legacy encoding and the structured one,
//!     and reconciles connections whose endpoints were removed on the way.
//! 4.  **Persist**: The migrated document comes back as pretty-printed text
//!     with its version stamped to the current generation.
//!
//! Component types not covered by the built-in units are served by
//! implementing [`update::ComponentUpdater`] — typically as a
//! [`update::VersionLadder`] of single-step transforms — and registering it
//! through [`WorkflowMigratorBuilder::with_updater`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kaitei::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let raw = std::fs::read_to_string("path/to/workflow.wf")?;
//!
//!     let migrator = WorkflowMigrator::builder().build();
//!
//!     // The silent check is what a loader consults before migrating
//!     // automatically; pass `true` to ask about the full interactive pass.
//!     if migrator.needs_migration(&raw, true)? {
//!         let migrated = migrator.migrate(&raw)?;
//!         std::fs::write("path/to/workflow.wf", migrated)?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod migrate;
pub mod prelude;
pub mod update;
pub mod version;

pub use migrate::{RepairPolicy, WorkflowMigrator, WorkflowMigratorBuilder};
