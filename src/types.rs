//! Shared identifier types.

use uuid::Uuid;

/// Identifier for a tenant (a signed-up business account).
pub type TenantId = Uuid;

/// Identifier for a client record owned by a tenant.
pub type RecordId = Uuid;
