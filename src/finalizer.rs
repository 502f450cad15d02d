//! Finalizer and operation-annotation management.
//!
//! All three operations here are idempotent: ensuring a finalizer that is
//! already present, removing one that is already gone, or clearing an
//! annotation that does not exist all succeed without a write.

use tracing::debug;

use crate::crd::{has_finalizer, operation_annotation, Infrastructure, FINALIZER_NAME, OPERATION_ANNOTATION};
use crate::error::Result;
use crate::retry::RetryConfig;
use crate::store::{try_update, InfraStore};

/// Ensure the lifecycle finalizer is present on the object.
///
/// The finalizer blocks physical deletion until external resources have been
/// torn down or handed over.
pub async fn ensure_finalizer(
    store: &dyn InfraStore,
    retry: &RetryConfig,
    infra: &Infrastructure,
) -> Result<()> {
    if has_finalizer(infra) {
        return Ok(());
    }

    let (namespace, name) = object_key(infra);
    debug!(namespace = %namespace, name = %name, "adding finalizer");

    try_update(store, retry, &namespace, &name, |i| {
        let finalizers = i.metadata.finalizers.get_or_insert_with(Vec::new);
        if !finalizers.iter().any(|f| f == FINALIZER_NAME) {
            finalizers.push(FINALIZER_NAME.to_string());
        }
    })
    .await?;

    Ok(())
}

/// Remove the lifecycle finalizer, releasing the object for deletion.
///
/// An object that vanished in the meantime counts as removed.
pub async fn remove_finalizer(
    store: &dyn InfraStore,
    retry: &RetryConfig,
    infra: &Infrastructure,
) -> Result<()> {
    let (namespace, name) = object_key(infra);
    debug!(namespace = %namespace, name = %name, "removing finalizer");

    try_update(store, retry, &namespace, &name, |i| {
        if let Some(finalizers) = i.metadata.finalizers.as_mut() {
            finalizers.retain(|f| f != FINALIZER_NAME);
            if finalizers.is_empty() {
                i.metadata.finalizers = None;
            }
        }
    })
    .await?;

    Ok(())
}

/// Clear the operation annotation once its one-shot request has been served.
pub async fn remove_operation_annotation(
    store: &dyn InfraStore,
    retry: &RetryConfig,
    infra: &Infrastructure,
) -> Result<()> {
    if operation_annotation(infra).is_none() {
        return Ok(());
    }

    let (namespace, name) = object_key(infra);
    debug!(namespace = %namespace, name = %name, "clearing operation annotation");

    try_update(store, retry, &namespace, &name, |i| {
        if let Some(annotations) = i.metadata.annotations.as_mut() {
            annotations.remove(OPERATION_ANNOTATION);
            if annotations.is_empty() {
                i.metadata.annotations = None;
            }
        }
    })
    .await?;

    Ok(())
}

fn object_key(infra: &Infrastructure) -> (String, String) {
    use kube::ResourceExt;
    (infra.namespace().unwrap_or_default(), infra.name_any())
}
