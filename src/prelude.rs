//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the
//! kaitei crate. Import this module to get access to the core functionality
//! without having to import each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! // Use the prelude to get easy access to all the core types.
//! use kaitei::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let raw = std::fs::read_to_string("path/to/workflow.wf")?;
//! let migrator = WorkflowMigrator::builder()
//!     .with_repair_policy(RepairPolicy::Strict)
//!     .build();
//! let migrated = migrator.migrate(&raw)?;
//!
//! println!("{migrated}");
//! # Ok(())
//! # }
//! ```

// Core migration entry points
pub use crate::migrate::{RepairPolicy, WorkflowMigrator, WorkflowMigratorBuilder};

// Document model
pub use crate::document::{Connection, ComponentDocument, EndpointGroup, WorkflowDocument};

// Component migration units and their building blocks
pub use crate::update::{
    ComponentUpdater, ConvergerUpdater, JsonValueCodec, MigrationContext, OptimizerUpdater,
    TypedValueCodec, UpdaterRegistry, VersionLadder, VersionStep,
};

// Version history and bucket classification
pub use crate::version::{
    BucketSet, CURRENT_WORKFLOW_VERSION, FormatBucket, FormatVersion, classify,
};

// Error types
pub use crate::error::MigrationError;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
