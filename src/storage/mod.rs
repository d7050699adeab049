//! File attachment storage
//!
//! Attachments hang off requests and submissions. The store is a trait
//! collaborator so deployments can plug in object storage; the default
//! implementation keeps nothing.

use crate::domain::StringUuid;
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Remove everything stored for an entity. Called on delete paths;
    /// failures are logged by callers, never propagated, since the owning
    /// row is already gone.
    async fn delete_for_entity(&self, entity_id: StringUuid) -> Result<()>;
}

/// Store that holds no attachments.
#[derive(Debug, Clone, Default)]
pub struct NoopAttachmentStore;

#[async_trait]
impl AttachmentStore for NoopAttachmentStore {
    async fn delete_for_entity(&self, entity_id: StringUuid) -> Result<()> {
        debug!(%entity_id, "no attachment store configured, nothing to delete");
        Ok(())
    }
}
