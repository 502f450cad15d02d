//! Access to the declarative resource store.
//!
//! [`InfraStore`] is the seam between the reconciler and the Kubernetes API:
//! get-by-key, compare-and-swap updates of the object and of its status
//! subresource, and the read-only Cluster context lookup. Handlers never talk
//! to `kube::Api` directly, which keeps the state machine testable without a
//! cluster.

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};

use crate::crd::{Cluster, Infrastructure};
use crate::error::{OperatorError, Result};
use crate::retry::{retry_on_conflict, RetryConfig};

/// Store operations used by the reconciler.
///
/// `update` and `update_status` carry compare-and-swap semantics: the write
/// fails with a conflict when the object's resource version moved since the
/// enclosed read.
#[async_trait]
pub trait InfraStore: Send + Sync {
    /// Get an Infrastructure by key, or `None` if it no longer exists.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Infrastructure>>;

    /// Resolve the Cluster context owning the given namespace.
    ///
    /// A missing or unreadable context is a hard failure for the pass.
    async fn get_cluster(&self, namespace: &str) -> Result<Cluster>;

    /// Replace the object (metadata, annotations, finalizers) via CAS.
    async fn update(&self, infra: &Infrastructure) -> Result<Infrastructure>;

    /// Replace the status subresource via CAS.
    async fn update_status(&self, infra: &Infrastructure) -> Result<Infrastructure>;
}

/// Production store backed by the Kubernetes API.
pub struct KubeInfraStore {
    client: Client,
}

impl KubeInfraStore {
    /// Create a new store wrapping the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Infrastructure> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl InfraStore for KubeInfraStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Infrastructure>> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn get_cluster(&self, namespace: &str) -> Result<Cluster> {
        // The Cluster object is cluster-scoped and named after the namespace
        let clusters: Api<Cluster> = Api::all(self.client.clone());
        clusters
            .get(namespace)
            .await
            .map_err(|e| OperatorError::ClusterContext {
                namespace: namespace.to_string(),
                message: e.to_string(),
            })
    }

    async fn update(&self, infra: &Infrastructure) -> Result<Infrastructure> {
        let namespace = infra.namespace().unwrap_or_default();
        Ok(self
            .api(&namespace)
            .replace(&infra.name_any(), &PostParams::default(), infra)
            .await?)
    }

    async fn update_status(&self, infra: &Infrastructure) -> Result<Infrastructure> {
        let namespace = infra.namespace().unwrap_or_default();
        let data = serde_json::to_vec(infra)?;
        Ok(self
            .api(&namespace)
            .replace_status(&infra.name_any(), &PostParams::default(), data)
            .await?)
    }
}

/// Read-modify-write the object under the conflict retry budget.
///
/// The mutation runs against freshly read state on every attempt. An object
/// that vanished is treated as a completed no-op (`Ok(None)`): a concurrent
/// deletion means there is nothing left to converge.
pub async fn try_update<F>(
    store: &dyn InfraStore,
    retry: &RetryConfig,
    namespace: &str,
    name: &str,
    mutate: F,
) -> Result<Option<Infrastructure>>
where
    F: Fn(&mut Infrastructure) + Send + Sync,
{
    let key = format!("{}/{}", namespace, name);
    retry_on_conflict(retry, &key, || async {
        let Some(mut infra) = store.get(namespace, name).await? else {
            return Ok(None);
        };
        mutate(&mut infra);
        store.update(&infra).await.map(Some)
    })
    .await
}

/// Read-modify-write the status subresource under the conflict retry budget.
pub async fn try_update_status<F>(
    store: &dyn InfraStore,
    retry: &RetryConfig,
    namespace: &str,
    name: &str,
    mutate: F,
) -> Result<Option<Infrastructure>>
where
    F: Fn(&mut Infrastructure) + Send + Sync,
{
    let key = format!("{}/{}", namespace, name);
    retry_on_conflict(retry, &key, || async {
        let Some(mut infra) = store.get(namespace, name).await? else {
            return Ok(None);
        };
        mutate(&mut infra);
        store.update_status(&infra).await.map(Some)
    })
    .await
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory store with fault injection for state-machine tests.

    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::crd::{has_finalizer, operation_annotation, ClusterSpec};

    /// Build an HTTP 409 the way the API server reports stale writes.
    pub fn conflict_error() -> OperatorError {
        OperatorError::Kube {
            source: kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "the object has been modified".to_string(),
                reason: "Conflict".to_string(),
                code: 409,
            }),
        }
    }

    /// Single-object in-memory store.
    ///
    /// Fault injection knobs:
    /// - `fail_finalizer_removal`: reject writes that drop the finalizer
    /// - `fail_annotation_removal`: reject writes that drop the operation annotation
    /// - `fail_cluster_lookup`: make the Cluster context unresolvable
    /// - `update_conflicts` / `status_conflicts`: inject N conflicts before accepting
    pub struct FakeStore {
        infra: Mutex<Option<Infrastructure>>,
        cluster: Mutex<Cluster>,
        pub fail_finalizer_removal: AtomicBool,
        pub fail_annotation_removal: AtomicBool,
        pub fail_cluster_lookup: AtomicBool,
        pub update_conflicts: AtomicU32,
        pub status_conflicts: AtomicU32,
    }

    impl FakeStore {
        pub fn new(infra: Infrastructure) -> Self {
            Self::with_cluster(infra, healthy_cluster())
        }

        pub fn with_cluster(infra: Infrastructure, cluster: Cluster) -> Self {
            Self {
                infra: Mutex::new(Some(infra)),
                cluster: Mutex::new(cluster),
                fail_finalizer_removal: AtomicBool::new(false),
                fail_annotation_removal: AtomicBool::new(false),
                fail_cluster_lookup: AtomicBool::new(false),
                update_conflicts: AtomicU32::new(0),
                status_conflicts: AtomicU32::new(0),
            }
        }

        /// Snapshot of the stored object.
        pub fn stored(&self) -> Option<Infrastructure> {
            self.infra.lock().unwrap().clone()
        }

        /// Remove the stored object, simulating a concurrent deletion.
        pub fn clear(&self) {
            *self.infra.lock().unwrap() = None;
        }

        fn take_conflict(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    pub fn healthy_cluster() -> Cluster {
        Cluster::new(
            "test-namespace",
            ClusterSpec {
                shoot: None,
                seed: None,
                failed: false,
            },
        )
    }

    pub fn failed_cluster() -> Cluster {
        Cluster::new(
            "test-namespace",
            ClusterSpec {
                shoot: None,
                seed: None,
                failed: true,
            },
        )
    }

    #[async_trait]
    impl InfraStore for FakeStore {
        async fn get(&self, _namespace: &str, _name: &str) -> Result<Option<Infrastructure>> {
            Ok(self.infra.lock().unwrap().clone())
        }

        async fn get_cluster(&self, namespace: &str) -> Result<Cluster> {
            if self.fail_cluster_lookup.load(Ordering::SeqCst) {
                return Err(OperatorError::ClusterContext {
                    namespace: namespace.to_string(),
                    message: "cluster object not found".to_string(),
                });
            }
            Ok(self.cluster.lock().unwrap().clone())
        }

        async fn update(&self, infra: &Infrastructure) -> Result<Infrastructure> {
            if Self::take_conflict(&self.update_conflicts) {
                return Err(conflict_error());
            }

            let mut stored = self.infra.lock().unwrap();
            if let Some(current) = stored.as_ref() {
                if self.fail_finalizer_removal.load(Ordering::SeqCst)
                    && has_finalizer(current)
                    && !has_finalizer(infra)
                {
                    return Err(OperatorError::internal("fake", "finalizer removal rejected"));
                }
                if self.fail_annotation_removal.load(Ordering::SeqCst)
                    && operation_annotation(current).is_some()
                    && operation_annotation(infra).is_none()
                {
                    return Err(OperatorError::internal(
                        "fake",
                        "annotation removal rejected",
                    ));
                }
            }
            *stored = Some(infra.clone());
            Ok(infra.clone())
        }

        async fn update_status(&self, infra: &Infrastructure) -> Result<Infrastructure> {
            if Self::take_conflict(&self.status_conflicts) {
                return Err(conflict_error());
            }
            let mut stored = self.infra.lock().unwrap();
            if let Some(current) = stored.as_mut() {
                current.status = infra.status.clone();
            }
            Ok(infra.clone())
        }
    }
}
