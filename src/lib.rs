//! Infrastructure Kubernetes Operator
//!
//! A Kubernetes operator driving the lifecycle of externally-provisioned
//! infrastructure through provider actuators.
//!
//! ## Custom Resources
//!
//! - `Infrastructure`: desired state of provider infrastructure (networks,
//!   routing, security groups) for one environment
//! - `Cluster`: read-only context describing the owning environment
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: extensions.provisioning.dev/v1alpha1
//! kind: Infrastructure
//! metadata:
//!   name: my-infra
//!   namespace: shoot--dev--my-env
//! spec:
//!   type: aws
//!   region: eu-west-1
//! ```

pub mod actuator;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod events;
pub mod finalizer;
pub mod operation;
pub mod retry;
pub mod status;
pub mod store;

pub use actuator::{Actuator, NoopActuator};
pub use controllers::InfrastructureController;
pub use crd::{
    Cluster, ClusterSpec, Infrastructure, InfrastructureSpec, InfrastructureStatus, LastError,
    LastOperation, OperationState, OperationType,
};
pub use error::{ErrorCode, OperatorError, Result};
