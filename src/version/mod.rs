pub mod bucket;
pub mod format;

pub use bucket::*;
pub use format::*;

/// The format version written into every migrated workflow document.
pub const CURRENT_WORKFLOW_VERSION: &str = "5";

/// The document generation at which the flat legacy encoding was replaced by
/// the structured endpoint/configuration encoding.
pub const STRUCTURED_FORMAT_VERSION: &str = "3";
