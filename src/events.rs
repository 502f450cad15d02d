//! Kubernetes Event recording for the Infrastructure operator.
//!
//! Events are fire-and-forget: failures are logged and never propagate. A
//! failed event must never change the outcome of a reconciliation pass.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Controller name reported on emitted events.
pub const CONTROLLER_NAME: &str = "infrastructure-controller";

/// Well-known event reasons, one per lifecycle operation.
pub mod reasons {
    /// Infrastructure is being reconciled
    pub const RECONCILIATION: &str = "InfrastructureReconciliation";
    /// Infrastructure is being deleted
    pub const DELETION: &str = "InfrastructureDeletion";
    /// Infrastructure is being migrated to another control plane
    pub const MIGRATION: &str = "InfrastructureMigration";
    /// Infrastructure is being restored after a migration
    pub const RESTORATION: &str = "InfrastructureRestoration";
}

/// Trait for publishing Kubernetes Events.
///
/// Implementations log failures and return nothing; callers never branch on
/// event delivery.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event on the given object.
    async fn publish(
        &self,
        reference: &ObjectReference,
        type_: EventType,
        reason: &str,
        message: &str,
    );

    /// Publish a Normal event.
    async fn normal(&self, reference: &ObjectReference, reason: &str, message: &str) {
        self.publish(reference, EventType::Normal, reason, message)
            .await;
    }

    /// Publish a Warning event.
    async fn warning(&self, reference: &ObjectReference, reason: &str, message: &str) {
        self.publish(reference, EventType::Warning, reason, message)
            .await;
    }
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a new publisher reporting as [`CONTROLLER_NAME`].
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        reference: &ObjectReference,
        type_: EventType,
        reason: &str,
        message: &str,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: reason.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, reference).await {
            warn!(reason, error = %e, "failed to publish event");
        }
    }
}

/// No-op implementation for tests.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _reference: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _message: &str,
    ) {
    }
}
