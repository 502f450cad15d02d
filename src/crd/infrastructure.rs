//! Infrastructure Custom Resource Definition
//!
//! Defines the desired-state object for externally-provisioned infrastructure.
//! The spec is owned by the caller and never mutated by the operator; the
//! operator only writes status, finalizers, and the operation annotation.

use chrono::Utc;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Finalizer placed on Infrastructure objects while provisioned resources exist.
pub const FINALIZER_NAME: &str = "extensions.provisioning.dev/infrastructure";

/// Annotation requesting a one-shot special operation on the next pass.
pub const OPERATION_ANNOTATION: &str = "provisioning.dev/operation";

/// Operation annotation value requesting a control-plane migration.
pub const OPERATION_MIGRATE: &str = "migrate";
/// Operation annotation value requesting a restore after migration.
pub const OPERATION_RESTORE: &str = "restore";
/// Operation annotation value requesting an ordinary reconciliation.
pub const OPERATION_RECONCILE: &str = "reconcile";

/// Annotation read by the external deletion wrapper; never interpreted here.
pub const CONFIRMATION_ANNOTATION: &str = "provisioning.dev/confirmation-deletion";

/// Infrastructure is the Schema for the infrastructures API
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "extensions.provisioning.dev",
    version = "v1alpha1",
    kind = "Infrastructure",
    namespaced,
    status = "InfrastructureStatus",
    shortname = "infra",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Operation","type":"string","jsonPath":".status.lastOperation.type"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.lastOperation.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {
    /// Provider type responsible for this infrastructure (e.g. "aws", "gcp")
    pub r#type: String,

    /// Region the infrastructure lives in
    pub region: String,

    /// SSH public key injected into provisioned machines
    #[serde(default)]
    pub ssh_public_key: Option<String>,

    /// Provider-specific configuration, passed to the actuator verbatim
    #[serde(default)]
    pub provider_config: Option<serde_json::Value>,
}

/// Status of the Infrastructure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// Most recent operation driven by the operator
    #[serde(default)]
    pub last_operation: Option<LastOperation>,

    /// Details of the last failure, if any
    #[serde(default)]
    pub last_error: Option<LastError>,

    /// Last spec generation for which a terminal state was recorded
    #[serde(default)]
    pub observed_generation: Option<i64>,

    /// Provider-specific status written by the actuator
    #[serde(default)]
    pub provider_status: Option<serde_json::Value>,
}

/// The operation most recently driven against the infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    /// Type of the operation
    pub r#type: OperationType,
    /// State of the operation
    pub state: OperationState,
    /// Completion progress in percent
    pub progress: i32,
    /// Human-readable description of the current step
    pub description: String,
    /// When this entry was last written
    #[serde(default)]
    pub last_update_time: Option<String>,
}

impl LastOperation {
    /// A freshly started operation.
    pub fn processing(r#type: OperationType, description: &str) -> Self {
        Self::new(r#type, OperationState::Processing, 1, description)
    }

    /// A completed operation.
    pub fn succeeded(r#type: OperationType, description: &str) -> Self {
        Self::new(r#type, OperationState::Succeeded, 100, description)
    }

    /// A failed operation.
    pub fn error(r#type: OperationType, description: &str) -> Self {
        Self::new(r#type, OperationState::Error, 50, description)
    }

    fn new(r#type: OperationType, state: OperationState, progress: i32, description: &str) -> Self {
        Self {
            r#type,
            state,
            progress,
            description: description.to_string(),
            last_update_time: Some(Utc::now().to_rfc3339()),
        }
    }
}

/// Type of a lifecycle operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum OperationType {
    /// First-time provisioning of a new object
    Create,
    /// Regular reconciliation of an existing object
    Reconcile,
    /// Teardown of the provisioned infrastructure
    Delete,
    /// Handoff of control to another control plane
    Migrate,
    /// Re-adoption of control after a migration
    Restore,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationType::Create => "Create",
            OperationType::Reconcile => "Reconcile",
            OperationType::Delete => "Delete",
            OperationType::Migrate => "Migrate",
            OperationType::Restore => "Restore",
        };
        write!(f, "{}", s)
    }
}

/// State of a lifecycle operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum OperationState {
    /// The operation is currently running
    Processing,
    /// The operation completed successfully
    Succeeded,
    /// The operation failed
    Error,
}

/// Details of the last failure observed on the infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    /// Human-readable failure description
    pub description: String,
    /// Stable machine-readable error codes classified from the cause
    #[serde(default)]
    pub codes: Vec<ErrorCode>,
}

/// Read the operation annotation, if present.
pub fn operation_annotation(infra: &Infrastructure) -> Option<&str> {
    infra
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(OPERATION_ANNOTATION))
        .map(String::as_str)
}

/// Check whether the operator's finalizer is present.
pub fn has_finalizer(infra: &Infrastructure) -> bool {
    infra
        .metadata
        .finalizers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .any(|f| f == FINALIZER_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn infra_with_annotations(annotations: &[(&str, &str)]) -> Infrastructure {
        let mut infra = Infrastructure::new(
            "test",
            InfrastructureSpec {
                r#type: "aws".to_string(),
                region: "eu-west-1".to_string(),
                ssh_public_key: None,
                provider_config: None,
            },
        );
        infra.metadata = ObjectMeta {
            name: Some("test".to_string()),
            annotations: Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        };
        infra
    }

    #[test]
    fn test_operation_annotation_read() {
        let infra = infra_with_annotations(&[(OPERATION_ANNOTATION, OPERATION_MIGRATE)]);
        assert_eq!(operation_annotation(&infra), Some("migrate"));

        let infra = infra_with_annotations(&[]);
        assert_eq!(operation_annotation(&infra), None);
    }

    #[test]
    fn test_has_finalizer() {
        let mut infra = infra_with_annotations(&[]);
        assert!(!has_finalizer(&infra));

        infra.metadata.finalizers = Some(vec![FINALIZER_NAME.to_string()]);
        assert!(has_finalizer(&infra));
    }

    #[test]
    fn test_last_operation_builders() {
        let op = LastOperation::processing(OperationType::Reconcile, "Reconciling");
        assert_eq!(op.state, OperationState::Processing);
        assert_eq!(op.progress, 1);
        assert!(op.last_update_time.is_some());

        let op = LastOperation::succeeded(OperationType::Delete, "Deleted");
        assert_eq!(op.progress, 100);

        let op = LastOperation::error(OperationType::Migrate, "Failed");
        assert_eq!(op.progress, 50);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = InfrastructureStatus {
            last_operation: Some(LastOperation::succeeded(OperationType::Create, "done")),
            observed_generation: Some(3),
            ..Default::default()
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["observedGeneration"], 3);
        assert_eq!(json["lastOperation"]["type"], "Create");
        assert_eq!(json["lastOperation"]["state"], "Succeeded");
    }
}
