//! Operation dispatch for Infrastructure objects.
//!
//! Classification is pure: it looks only at the object's metadata and status
//! and decides which lifecycle handler a pass runs. Precedence is fixed so
//! that a single object state always maps to exactly one handler.

use crate::crd::{
    operation_annotation, Infrastructure, OperationState, OperationType, OPERATION_MIGRATE,
    OPERATION_RESTORE,
};

/// The handler a reconciliation pass dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Control was handed off; leave the object untouched
    Skip,
    /// Hand control of the external resources to another control plane
    Migrate,
    /// Tear down the external resources
    Delete,
    /// Re-adopt control after a migration
    Restore,
    /// Converge external resources to the spec (Create on first pass)
    Reconcile(OperationType),
}

/// Whether control of this object was already handed off to another control
/// plane.
///
/// A succeeded Migrate in `lastOperation` is the durable marker; such objects
/// are never acted on again, including during deletion.
pub fn is_migrated(infra: &Infrastructure) -> bool {
    matches!(
        infra
            .status
            .as_ref()
            .and_then(|s| s.last_operation.as_ref()),
        Some(op) if op.r#type == OperationType::Migrate && op.state == OperationState::Succeeded
    )
}

/// Derive the operation type a pass reports in status.
///
/// One-shot annotation requests win over everything, deletion wins over
/// restore, and unfinished Create or Migrate operations resume under their
/// original type.
pub fn compute_operation_type(infra: &Infrastructure) -> OperationType {
    let annotation = operation_annotation(infra);
    let last_operation = infra
        .status
        .as_ref()
        .and_then(|s| s.last_operation.as_ref());

    if annotation == Some(OPERATION_MIGRATE) {
        return OperationType::Migrate;
    }
    if infra.metadata.deletion_timestamp.is_some() {
        return OperationType::Delete;
    }
    if annotation == Some(OPERATION_RESTORE) {
        return OperationType::Restore;
    }
    match last_operation {
        None => OperationType::Create,
        Some(op) if op.r#type == OperationType::Create && op.state != OperationState::Succeeded => {
            OperationType::Create
        }
        Some(op) if op.r#type == OperationType::Migrate && op.state != OperationState::Succeeded => {
            OperationType::Migrate
        }
        Some(_) => OperationType::Reconcile,
    }
}

/// Classify an object into the handler its pass runs.
pub fn classify(infra: &Infrastructure) -> Operation {
    if is_migrated(infra) {
        return Operation::Skip;
    }

    let operation_type = compute_operation_type(infra);
    if operation_type == OperationType::Migrate {
        return Operation::Migrate;
    }
    if infra.metadata.deletion_timestamp.is_some() {
        return Operation::Delete;
    }
    if operation_annotation(infra) == Some(OPERATION_RESTORE) {
        return Operation::Restore;
    }
    Operation::Reconcile(operation_type)
}
