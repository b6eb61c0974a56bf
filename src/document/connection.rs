use serde::{Deserialize, Serialize};

/// A link between two node endpoints.
///
/// In the current format `output` and `input` hold endpoint identifiers;
/// documents older than version 3 stored endpoint names instead and are
/// rewritten during migration. Unknown extra fields on persisted connection
/// records are dropped by the version-3 rewrite, as the legacy format never
/// defined any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub output: String,
    pub target: String,
    pub input: String,
}
