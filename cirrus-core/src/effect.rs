//! Effect - Side effects represented as values
//!
//! An Effect describes an operation to perform against the infrastructure.
//! Nothing happens until the Interpreter executes it.

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create a new resource
    Create(Resource),
    /// Update an existing resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete the existing resource and create it again
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource
    Delete { id: ResourceId, identifier: String },
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(r) => &r.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } | Effect::Delete { id, .. } => {
                id
            }
        }
    }

    /// Marker used when displaying plans
    pub fn symbol(&self) -> &'static str {
        match self {
            Effect::Create(_) => "+",
            Effect::Update { .. } => "~",
            Effect::Replace { .. } => "-/+",
            Effect::Delete { .. } => "-",
        }
    }
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.symbol(), self.resource_id())
    }
}
