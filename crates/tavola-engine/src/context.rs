//! Identity of the caller, as established by the transport layer.

use tavola_core::{Actor, Capability};

use crate::error::{EngineError, EngineResult};

/// Tenant and actor of one request. Trusted as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: String,
    pub actor: Actor,
}

impl RequestContext {
    pub fn new(tenant_id: impl Into<String>, actor: Actor) -> Self {
        RequestContext {
            tenant_id: tenant_id.into(),
            actor,
        }
    }

    /// Anonymous QR guest of a tenant.
    pub fn guest(tenant_id: impl Into<String>) -> Self {
        Self::new(tenant_id, Actor::Guest)
    }

    pub fn tenant(&self) -> &str {
        &self.tenant_id
    }

    /// Staff id for `created_by`-style columns.
    pub fn actor_id(&self) -> Option<String> {
        self.actor.id().map(str::to_string)
    }

    /// Fails with `PermissionDenied` unless the actor holds `capability`.
    pub fn require(&self, capability: Capability) -> EngineResult<()> {
        if self.actor.allows(capability) {
            Ok(())
        } else {
            tracing::warn!(
                tenant_id = %self.tenant_id,
                actor = %self.actor.label(),
                ?capability,
                "Permission denied"
            );
            Err(EngineError::PermissionDenied {
                actor: self.actor.label(),
                capability,
            })
        }
    }
}
