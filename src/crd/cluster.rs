//! Cluster context Custom Resource Definition
//!
//! A cluster-scoped, read-only bundle describing the environment that owns an
//! Infrastructure object. One Cluster exists per Infrastructure namespace and
//! shares its name. The operator only ever reads it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster is the Schema for the clusters API
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "extensions.provisioning.dev",
    version = "v1alpha1",
    kind = "Cluster",
    printcolumn = r#"{"name":"Failed","type":"boolean","jsonPath":".spec.failed"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Descriptor of the owning shoot-equivalent environment, opaque to the operator
    #[serde(default)]
    pub shoot: Option<serde_json::Value>,

    /// Descriptor of the hosting seed-equivalent environment, opaque to the operator
    #[serde(default)]
    pub seed: Option<serde_json::Value>,

    /// Set by the operator of the owning environment when the cluster is
    /// declared failed; suppresses all further reconciliation in its namespace
    #[serde(default)]
    pub failed: bool,
}

impl Cluster {
    /// Whether the owning cluster has been declared failed by its operator.
    pub fn is_failed(&self) -> bool {
        self.spec.failed
    }
}
