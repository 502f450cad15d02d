//! Status reporting for Infrastructure objects.
//!
//! Every lifecycle pass brackets its work with status writes: a Processing
//! entry when the pass starts and a Succeeded or Error entry when it ends.
//! Writes go through the optimistic conflict-retry budget so that concurrent
//! writers never wedge a pass, and terminal writes advance the observed
//! generation so callers can tell which spec revision the outcome refers to.

use std::sync::Arc;

use kube::{Resource, ResourceExt};
use tracing::{error, info};

use crate::crd::{
    Infrastructure, LastError, LastOperation, OperationType,
};
use crate::error::{ErrorCode, OperatorError, Result};
use crate::events::{reasons, EventPublisher};
use crate::retry::RetryConfig;
use crate::store::{try_update_status, InfraStore};

/// Map a lifecycle operation to its event reason.
pub fn reason_for(operation: OperationType) -> &'static str {
    match operation {
        OperationType::Create | OperationType::Reconcile => reasons::RECONCILIATION,
        OperationType::Delete => reasons::DELETION,
        OperationType::Migrate => reasons::MIGRATION,
        OperationType::Restore => reasons::RESTORATION,
    }
}

/// Writes lastOperation, lastError, and observedGeneration on Infrastructure
/// objects.
pub struct StatusUpdater {
    store: Arc<dyn InfraStore>,
    events: Arc<dyn EventPublisher>,
    retry: RetryConfig,
}

impl StatusUpdater {
    /// Create a new updater.
    pub fn new(
        store: Arc<dyn InfraStore>,
        events: Arc<dyn EventPublisher>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            events,
            retry,
        }
    }

    /// Record that an operation has started.
    pub async fn set_processing(
        &self,
        infra: &Infrastructure,
        operation: OperationType,
        description: &str,
    ) -> Result<()> {
        let (namespace, name) = object_key(infra);
        info!(namespace = %namespace, name = %name, operation = %operation, "{}", description);

        let entry = LastOperation::processing(operation, description);
        try_update_status(self.store.as_ref(), &self.retry, &namespace, &name, |i| {
            let status = i.status.get_or_insert_with(Default::default);
            status.last_operation = Some(entry.clone());
        })
        .await?;

        Ok(())
    }

    /// Record that an operation completed.
    ///
    /// Clears any previous error and advances the observed generation to the
    /// object's current spec generation.
    pub async fn set_succeeded(
        &self,
        infra: &Infrastructure,
        operation: OperationType,
        description: &str,
    ) -> Result<()> {
        let (namespace, name) = object_key(infra);
        info!(namespace = %namespace, name = %name, operation = %operation, "{}", description);

        let entry = LastOperation::succeeded(operation, description);
        try_update_status(self.store.as_ref(), &self.retry, &namespace, &name, |i| {
            let generation = i.metadata.generation;
            let status = i.status.get_or_insert_with(Default::default);
            status.observed_generation = generation;
            status.last_error = None;
            status.last_operation = Some(entry.clone());
        })
        .await?;

        Ok(())
    }

    /// Record that an operation failed.
    ///
    /// Emits a Warning event before the status write so the failure is visible
    /// even when the write itself fails, classifies the cause into stable
    /// error codes, and advances the observed generation.
    pub async fn set_error(
        &self,
        infra: &Infrastructure,
        operation: OperationType,
        cause: &OperatorError,
    ) -> Result<()> {
        let (namespace, name) = object_key(infra);
        let description = format!("{} failed: {}", operation, cause);
        error!(namespace = %namespace, name = %name, operation = %operation, "{}", description);

        self.events
            .warning(&infra.object_ref(&()), reason_for(operation), &description)
            .await;

        let codes = ErrorCode::classify(&cause.to_string());
        let entry = LastOperation::error(operation, &description);
        try_update_status(self.store.as_ref(), &self.retry, &namespace, &name, |i| {
            let generation = i.metadata.generation;
            let status = i.status.get_or_insert_with(Default::default);
            status.observed_generation = generation;
            status.last_error = Some(LastError {
                description: description.clone(),
                codes: codes.clone(),
            });
            status.last_operation = Some(entry.clone());
        })
        .await?;

        Ok(())
    }
}

fn object_key(infra: &Infrastructure) -> (String, String) {
    (infra.namespace().unwrap_or_default(), infra.name_any())
}
