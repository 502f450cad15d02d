//! Controllers for the Infrastructure operator
//!
//! Each controller watches its CRD and reconciles the actual state of the
//! external system with the desired state in the custom resources.

mod infrastructure;

pub use infrastructure::InfrastructureController;
