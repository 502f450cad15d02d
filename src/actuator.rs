//! Provider actuator interface.
//!
//! The actuator performs the actual work against the external system. The
//! operator owns sequencing, status, finalizers, and annotations; the actuator
//! owns nothing but the side effects.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::crd::{Cluster, Infrastructure};
use crate::error::Result;

/// Provider-specific lifecycle operations.
///
/// Every method must be idempotent: a pass can be retried at any point and
/// the handler will call into the actuator again with the same object.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Converge external resources to the desired spec.
    ///
    /// Also used for first-time creation; the actuator cannot distinguish the
    /// two and must not need to.
    async fn reconcile(&self, infra: &Infrastructure, cluster: &Cluster) -> Result<()>;

    /// Tear down all external resources for the object.
    ///
    /// Resources that are already gone are not an error.
    async fn delete(&self, infra: &Infrastructure, cluster: &Cluster) -> Result<()>;

    /// Prepare external resources for handoff to another control plane.
    ///
    /// Must not destroy resources; control, not existence, is what changes.
    async fn migrate(&self, infra: &Infrastructure, cluster: &Cluster) -> Result<()>;

    /// Re-adopt external resources after a migration.
    async fn restore(&self, infra: &Infrastructure, cluster: &Cluster) -> Result<()>;
}

/// Actuator that performs no external work.
///
/// Useful for wiring tests and for running the control loop against a
/// provider that manages resources out of band.
pub struct NoopActuator;

#[async_trait]
impl Actuator for NoopActuator {
    async fn reconcile(&self, _infra: &Infrastructure, _cluster: &Cluster) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _infra: &Infrastructure, _cluster: &Cluster) -> Result<()> {
        Ok(())
    }

    async fn migrate(&self, _infra: &Infrastructure, _cluster: &Cluster) -> Result<()> {
        Ok(())
    }

    async fn restore(&self, _infra: &Infrastructure, _cluster: &Cluster) -> Result<()> {
        Ok(())
    }
}
