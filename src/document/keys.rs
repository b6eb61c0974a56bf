//! Persisted field names shared by the workflow and component documents.

pub const WORKFLOW_VERSION: &str = "workflowVersion";

pub const NODES: &str = "nodes";

pub const CONNECTIONS: &str = "connections";

pub const BENDPOINTS: &str = "bendpoints";

pub const COMPONENT: &str = "component";

pub const VERSION: &str = "version";

pub const IDENTIFIER: &str = "identifier";

pub const NAME: &str = "name";

pub const DATATYPE: &str = "datatype";

pub const METADATA: &str = "metadata";

pub const CONFIGURATION: &str = "configuration";

pub const EP_IDENTIFIER: &str = "epIdentifier";

pub const STATIC_INPUTS: &str = "staticInputs";

pub const STATIC_OUTPUTS: &str = "staticOutputs";

pub const DYNAMIC_INPUTS: &str = "dynamicInputs";

pub const DYNAMIC_OUTPUTS: &str = "dynamicOutputs";

pub const SOURCE: &str = "source";

pub const TARGET: &str = "target";

pub const OUTPUT: &str = "output";

pub const INPUT: &str = "input";

pub const USAGE: &str = "usage";

pub const GROUP: &str = "group";

pub const VALUE: &str = "value";

/// Legacy (pre-version-3) flat endpoint declarations.
pub const ADD_INPUT: &str = "addInput";

pub const ADD_OUTPUT: &str = "addOutput";

pub const INPUT_META_DATA: &str = "inputMetaData";

pub const OUTPUT_META_DATA: &str = "outputMetaData";

/// Canonical datatype assigned to endpoints synthesized during connection
/// repair.
pub const SHORT_TEXT: &str = "ShortText";
