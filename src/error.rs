use thiserror::Error;

/// Errors that can occur while migrating a persisted workflow document.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Failed to parse document JSON: {0}")]
    Parse(String),

    #[error("Update step {step} failed for node '{node_id}': {message}")]
    Schema {
        node_id: String,
        step: String,
        message: String,
    },

    #[error(
        "Declared version '{version}' matches no known format generation (current is '{current}')"
    )]
    UnknownVersion { version: String, current: String },
}

impl MigrationError {
    /// Shorthand for a [`MigrationError::Schema`] raised outside a version
    /// ladder, where no source/target step applies.
    pub(crate) fn schema(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        MigrationError::Schema {
            node_id: node_id.into(),
            step: "-".to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Parse(err.to_string())
    }
}
