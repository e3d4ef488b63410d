//! Names derived from a tenant identity.
//!
//! Identities never contain `-` (see [`TenantIdentity`]), so replacing
//! `.` with `-` is injective, and the fixed prefixes keep derived names
//! apart from independently named resources.

use pws_core::TenantIdentity;

pub const PERSONAL_WORKSPACE_PREFIX: &str = "personal-";
pub const TENANT_NAMESPACE_PREFIX: &str = "tenant-";

fn sanitize(identity: &TenantIdentity) -> String {
    identity.as_str().replace('.', "-")
}

/// Name of the tenant's personal workspace, e.g. `a.b@c` → `personal-a-b@c`.
pub fn personal_workspace_name(identity: &TenantIdentity) -> String {
    format!("{PERSONAL_WORKSPACE_PREFIX}{}", sanitize(identity))
}

/// Conventional name of the tenant's private namespace, used when the
/// tenant record no longer says where it is.
pub fn tenant_namespace_name(identity: &TenantIdentity) -> String {
    format!("{TENANT_NAMESPACE_PREFIX}{}", sanitize(identity))
}
