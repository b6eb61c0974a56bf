pub mod component;
pub mod connection;
pub mod escape;
pub mod keys;
pub mod workflow;

pub use component::*;
pub use connection::*;
pub use workflow::*;

/// The four persisted endpoint arrays of a component document.
///
/// Static endpoints are fixed by the component type; dynamic endpoints are
/// authored per node and carry a category tag (`epIdentifier`) grouping them
/// into semantic roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointGroup {
    StaticInputs,
    StaticOutputs,
    DynamicInputs,
    DynamicOutputs,
}

impl EndpointGroup {
    pub const ALL: [EndpointGroup; 4] = [
        EndpointGroup::StaticInputs,
        EndpointGroup::StaticOutputs,
        EndpointGroup::DynamicInputs,
        EndpointGroup::DynamicOutputs,
    ];

    /// The persisted field name of this group.
    pub fn key(&self) -> &'static str {
        match self {
            EndpointGroup::StaticInputs => keys::STATIC_INPUTS,
            EndpointGroup::StaticOutputs => keys::STATIC_OUTPUTS,
            EndpointGroup::DynamicInputs => keys::DYNAMIC_INPUTS,
            EndpointGroup::DynamicOutputs => keys::DYNAMIC_OUTPUTS,
        }
    }

    pub fn is_input(&self) -> bool {
        matches!(
            self,
            EndpointGroup::StaticInputs | EndpointGroup::DynamicInputs
        )
    }

    pub fn is_static(&self) -> bool {
        matches!(
            self,
            EndpointGroup::StaticInputs | EndpointGroup::StaticOutputs
        )
    }
}
