//! Live domain objects and their wire descriptors.
//!
//! A [`Machine`] is the target a capability operates on; a [`Project`] is the
//! environment owning it. On the wire they travel as small descriptors; the
//! [`DomainResolver`] collaborator turns a descriptor back into a live object.
//! Resolution is owned by the host application - this crate only defines the
//! seam and invokes it from registered mapper conversions.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wire descriptor for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Stable identifier for the project.
    pub resource_id: String,
    /// Project root directory.
    pub path: String,
}

/// Wire descriptor for a target machine, including its owning project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDescriptor {
    /// Stable identifier for the machine.
    pub resource_id: String,
    /// Machine name within its project.
    pub name: String,
    /// Owning project.
    pub project: ProjectDescriptor,
}

/// A live project (environment) reconstructed by the resolver.
#[derive(Debug)]
pub struct Project {
    /// Stable identifier.
    pub resource_id: String,
    /// Project root directory.
    pub path: PathBuf,
}

impl Project {
    /// Wire descriptor for this project.
    pub fn descriptor(&self) -> ProjectDescriptor {
        ProjectDescriptor {
            resource_id: self.resource_id.clone(),
            path: self.path.to_string_lossy().into_owned(),
        }
    }
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.resource_id == other.resource_id
    }
}

/// A live target machine reconstructed by the resolver.
#[derive(Debug)]
pub struct Machine {
    /// Stable identifier.
    pub resource_id: String,
    /// Machine name within its project.
    pub name: String,
    /// Owning project.
    pub project: Arc<Project>,
}

impl Machine {
    /// Wire descriptor for this machine (includes the owning project).
    pub fn descriptor(&self) -> MachineDescriptor {
        MachineDescriptor {
            resource_id: self.resource_id.clone(),
            name: self.name.clone(),
            project: self.project.descriptor(),
        }
    }
}

impl PartialEq for Machine {
    fn eq(&self, other: &Self) -> bool {
        self.resource_id == other.resource_id
    }
}

/// Converts wire descriptors into live domain objects.
///
/// Registered with the [`Mapper`](crate::mapper::Mapper) at startup. Resolvers
/// are invoked from arbitrary RPC worker threads and must be safe under
/// concurrent use.
pub trait DomainResolver: Send + Sync {
    /// Resolve a machine descriptor into a live machine.
    fn resolve_machine(&self, desc: &MachineDescriptor) -> Result<Arc<Machine>>;

    /// Resolve a project descriptor into a live project.
    fn resolve_project(&self, desc: &ProjectDescriptor) -> Result<Arc<Project>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> Machine {
        Machine {
            resource_id: "m-01".to_string(),
            name: "default".to_string(),
            project: Arc::new(Project {
                resource_id: "p-01".to_string(),
                path: PathBuf::from("/work/site"),
            }),
        }
    }

    #[test]
    fn test_machine_descriptor_carries_project() {
        let desc = machine().descriptor();
        assert_eq!(desc.resource_id, "m-01");
        assert_eq!(desc.project.resource_id, "p-01");
        assert_eq!(desc.project.path, "/work/site");
    }

    #[test]
    fn test_equality_by_resource_id() {
        let a = machine();
        let mut b = machine();
        b.name = "renamed".to_string();
        assert_eq!(a, b);
    }
}
