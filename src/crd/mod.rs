//! Custom Resource Definitions for the Infrastructure operator
//!
//! Defines the resources the operator works with:
//! - Infrastructure: desired state of externally-provisioned infrastructure
//! - Cluster: read-only context describing the owning environment

mod cluster;
mod infrastructure;

pub use cluster::{Cluster, ClusterSpec};
pub use infrastructure::{
    has_finalizer, operation_annotation, Infrastructure, InfrastructureSpec, InfrastructureStatus,
    LastError, LastOperation, OperationState, OperationType, CONFIRMATION_ANNOTATION,
    FINALIZER_NAME, OPERATION_ANNOTATION, OPERATION_MIGRATE, OPERATION_RECONCILE,
    OPERATION_RESTORE,
};
