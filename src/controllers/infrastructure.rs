//! Infrastructure controller
//!
//! Watches Infrastructure custom resources and drives their lifecycle through
//! four handlers: reconcile, delete, migrate, and restore. The controller owns
//! sequencing, finalizers, the operation annotation, and status; the actual
//! work against the external system is delegated to the [`Actuator`].

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info};

use crate::actuator::Actuator;
use crate::crd::{has_finalizer, Cluster, Infrastructure, OperationType};
use crate::error::{OperatorError, Result};
use crate::events::{reasons, EventPublisher, KubeEventPublisher};
use crate::finalizer::{ensure_finalizer, remove_finalizer, remove_operation_annotation};
use crate::operation::{classify, Operation};
use crate::retry::RetryConfig;
use crate::status::StatusUpdater;
use crate::store::{InfraStore, KubeInfraStore};

/// How long to wait before re-checking a settled object.
const RESYNC_INTERVAL: Duration = Duration::from_secs(60);
/// Requeue delay after a retryable failure.
const RETRY_INTERVAL: Duration = Duration::from_secs(30);
/// Requeue delay after a failure that needs a spec or environment fix.
const STALL_INTERVAL: Duration = Duration::from_secs(300);

/// Context for the infrastructure controller
pub struct InfrastructureController {
    client: Option<Client>,
    namespace: Option<String>,
    store: Arc<dyn InfraStore>,
    actuator: Arc<dyn Actuator>,
    events: Arc<dyn EventPublisher>,
    status: StatusUpdater,
    retry: RetryConfig,
}

impl InfrastructureController {
    /// Create a new controller backed by the Kubernetes API.
    pub fn new(client: Client, actuator: Arc<dyn Actuator>) -> Self {
        let store: Arc<dyn InfraStore> = Arc::new(KubeInfraStore::new(client.clone()));
        let events: Arc<dyn EventPublisher> = Arc::new(KubeEventPublisher::new(client.clone()));
        let retry = RetryConfig::default();
        Self {
            client: Some(client),
            namespace: None,
            status: StatusUpdater::new(store.clone(), events.clone(), retry.clone()),
            store,
            actuator,
            events,
            retry,
        }
    }

    /// Restrict the watch to a single namespace instead of all namespaces.
    pub fn within_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn for_test(
        store: Arc<dyn InfraStore>,
        actuator: Arc<dyn Actuator>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        let retry = RetryConfig::fast();
        Self {
            client: None,
            namespace: None,
            status: StatusUpdater::new(store.clone(), events.clone(), retry.clone()),
            store,
            actuator,
            events,
            retry,
        }
    }

    /// Run the infrastructure controller until shutdown.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| OperatorError::internal("controller", "no client configured"))?;
        let infrastructures: Api<Infrastructure> = match &self.namespace {
            Some(namespace) => Api::namespaced(client, namespace),
            None => Api::all(client),
        };

        info!("Starting Infrastructure controller");

        Controller::new(infrastructures, Config::default())
            .shutdown_on_signal()
            .run(
                |infra, ctx| async move { ctx.reconcile_request(infra).await },
                |_infra, error, _ctx| Self::error_policy(error),
                Arc::clone(&self),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!("Reconciled infrastructure: {}", obj.name);
                    }
                    Err(e) => {
                        error!("Reconciliation failed: {:?}", e);
                    }
                }
            })
            .await;

        Ok(())
    }

    fn error_policy(error: &OperatorError) -> Action {
        if error.is_retryable() {
            error!("Reconciliation error (will retry): {:?}", error);
            Action::requeue(RETRY_INTERVAL)
        } else {
            error!("Reconciliation error (needs intervention): {:?}", error);
            Action::requeue(STALL_INTERVAL)
        }
    }

    /// Entry point for a single reconciliation pass.
    ///
    /// Re-reads the object so every pass starts from fresh state, resolves the
    /// Cluster context, and dispatches to the handler the classification picks.
    pub(crate) async fn reconcile_request(
        &self,
        infra: Arc<Infrastructure>,
    ) -> std::result::Result<Action, OperatorError> {
        let name = infra.name_any();
        let namespace = infra.namespace().unwrap_or_else(|| "default".to_string());

        let Some(infra) = self.store.get(&namespace, &name).await? else {
            debug!("Infrastructure {}/{} is gone, nothing to do", namespace, name);
            return Ok(Action::await_change());
        };

        let cluster = self.store.get_cluster(&namespace).await?;
        if cluster.is_failed() {
            info!(
                "Skipping infrastructure {}/{}: owning cluster is marked failed",
                namespace, name
            );
            return Ok(Action::await_change());
        }

        match classify(&infra) {
            Operation::Skip => {
                debug!(
                    "Skipping infrastructure {}/{}: control was handed off",
                    namespace, name
                );
                Ok(Action::await_change())
            }
            Operation::Migrate => self.migrate(&infra, &cluster).await,
            Operation::Delete => self.delete(&infra, &cluster).await,
            Operation::Restore => self.restore(&infra, &cluster).await,
            Operation::Reconcile(operation_type) => {
                self.reconcile(&infra, &cluster, operation_type).await
            }
        }
    }

    /// Record a failed pass in status, best-effort.
    ///
    /// The actuator error is what propagates; a failed status write must not
    /// replace it.
    async fn report_error(
        &self,
        infra: &Infrastructure,
        operation_type: OperationType,
        cause: &OperatorError,
    ) {
        if let Err(status_err) = self.status.set_error(infra, operation_type, cause).await {
            error!("Failed to record error status: {:?}", status_err);
        }
    }

    /// Converge external resources to the spec.
    ///
    /// Runs for both first-time creation and ordinary reconciliation; the
    /// operation type only affects what status reports.
    async fn reconcile(
        &self,
        infra: &Infrastructure,
        cluster: &Cluster,
        operation_type: OperationType,
    ) -> std::result::Result<Action, OperatorError> {
        ensure_finalizer(self.store.as_ref(), &self.retry, infra).await?;

        self.status
            .set_processing(infra, operation_type, "Reconciling the infrastructure")
            .await?;
        self.events
            .normal(
                &infra.object_ref(&()),
                reasons::RECONCILIATION,
                "Reconciling the infrastructure",
            )
            .await;

        if let Err(e) = self.actuator.reconcile(infra, cluster).await {
            self.report_error(infra, operation_type, &e).await;
            return Err(e);
        }

        self.status
            .set_succeeded(infra, operation_type, "Successfully reconciled infrastructure")
            .await?;
        self.events
            .normal(
                &infra.object_ref(&()),
                reasons::RECONCILIATION,
                "Successfully reconciled infrastructure",
            )
            .await;

        Ok(Action::requeue(RESYNC_INTERVAL))
    }

    /// Tear down external resources and release the object.
    async fn delete(
        &self,
        infra: &Infrastructure,
        cluster: &Cluster,
    ) -> std::result::Result<Action, OperatorError> {
        if !has_finalizer(infra) {
            debug!(
                "Deleting infrastructure {}/{} causes a no-op as there is no finalizer",
                infra.namespace().unwrap_or_default(),
                infra.name_any()
            );
            return Ok(Action::await_change());
        }

        self.status
            .set_processing(infra, OperationType::Delete, "Deleting the infrastructure")
            .await?;
        self.events
            .normal(
                &infra.object_ref(&()),
                reasons::DELETION,
                "Deleting the infrastructure",
            )
            .await;

        if let Err(e) = self.actuator.delete(infra, cluster).await {
            self.report_error(infra, OperationType::Delete, &e).await;
            return Err(e);
        }

        self.status
            .set_succeeded(
                infra,
                OperationType::Delete,
                "Successfully deleted infrastructure",
            )
            .await?;
        self.events
            .normal(
                &infra.object_ref(&()),
                reasons::DELETION,
                "Successfully deleted infrastructure",
            )
            .await;

        if let Err(e) = remove_finalizer(self.store.as_ref(), &self.retry, infra).await {
            self.events
                .warning(
                    &infra.object_ref(&()),
                    reasons::DELETION,
                    &format!("Error removing finalizer: {}", e),
                )
                .await;
            return Err(e);
        }

        Ok(Action::await_change())
    }

    /// Hand control of the external resources to another control plane.
    ///
    /// The annotation is cleared only after the finalizer is gone: a crash in
    /// between must resume as a migration, never as a reconciliation.
    async fn migrate(
        &self,
        infra: &Infrastructure,
        cluster: &Cluster,
    ) -> std::result::Result<Action, OperatorError> {
        self.status
            .set_processing(
                infra,
                OperationType::Migrate,
                "Starting migration of the infrastructure",
            )
            .await?;
        self.events
            .normal(
                &infra.object_ref(&()),
                reasons::MIGRATION,
                "Starting migration of the infrastructure",
            )
            .await;

        if let Err(e) = self.actuator.migrate(infra, cluster).await {
            self.report_error(infra, OperationType::Migrate, &e).await;
            return Err(e);
        }

        self.status
            .set_succeeded(
                infra,
                OperationType::Migrate,
                "Successfully migrated infrastructure",
            )
            .await?;
        self.events
            .normal(
                &infra.object_ref(&()),
                reasons::MIGRATION,
                "Successfully migrated infrastructure",
            )
            .await;

        if let Err(e) = remove_finalizer(self.store.as_ref(), &self.retry, infra).await {
            self.events
                .warning(
                    &infra.object_ref(&()),
                    reasons::MIGRATION,
                    &format!("Error removing finalizer: {}", e),
                )
                .await;
            return Err(e);
        }
        if let Err(e) = remove_operation_annotation(self.store.as_ref(), &self.retry, infra).await {
            self.events
                .warning(
                    &infra.object_ref(&()),
                    reasons::MIGRATION,
                    &format!("Error removing operation annotation: {}", e),
                )
                .await;
            return Err(e);
        }

        Ok(Action::await_change())
    }

    /// Re-adopt external resources after a migration.
    ///
    /// The annotation is cleared before the final success status: a crash in
    /// between re-runs the restore, which is idempotent, while the reverse
    /// order could leave a succeeded restore whose annotation re-triggers it
    /// forever.
    async fn restore(
        &self,
        infra: &Infrastructure,
        cluster: &Cluster,
    ) -> std::result::Result<Action, OperatorError> {
        ensure_finalizer(self.store.as_ref(), &self.retry, infra).await?;

        self.status
            .set_processing(infra, OperationType::Restore, "Restoring the infrastructure")
            .await?;
        self.events
            .normal(
                &infra.object_ref(&()),
                reasons::RESTORATION,
                "Restoring the infrastructure",
            )
            .await;

        if let Err(e) = self.actuator.restore(infra, cluster).await {
            self.report_error(infra, OperationType::Restore, &e).await;
            return Err(e);
        }

        if let Err(e) = remove_operation_annotation(self.store.as_ref(), &self.retry, infra).await {
            self.events
                .warning(
                    &infra.object_ref(&()),
                    reasons::RESTORATION,
                    &format!("Error removing operation annotation: {}", e),
                )
                .await;
            return Err(e);
        }

        self.status
            .set_succeeded(
                infra,
                OperationType::Restore,
                "Successfully restored infrastructure",
            )
            .await?;
        self.events
            .normal(
                &infra.object_ref(&()),
                reasons::RESTORATION,
                "Successfully restored infrastructure",
            )
            .await;

        Ok(Action::requeue(RESYNC_INTERVAL))
    }
}
